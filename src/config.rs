//! Process configuration, read from the environment (after `.env`).

use std::env;
use std::path::PathBuf;

use crate::blockchain::GenesisReward;
use crate::error::ConfigError;

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    /// Block/checkpoint directory; `None` keeps the chain in memory.
    pub data_dir: Option<PathBuf>,
    /// Hex secret key of the node wallet; created on first start.
    pub wallet_path: PathBuf,
    pub genesis_reward: GenesisReward,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            data_dir: None,
            wallet_path: PathBuf::from("node.wallet"),
            genesis_reward: GenesisReward::Miner,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(host) = lookup("HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("PORT") {
            config.port = port.parse().map_err(|_| ConfigError::Invalid {
                key: "PORT",
                value: port.clone(),
            })?;
        }
        config.data_dir = lookup("DATA_DIR")
            .filter(|d| !d.trim().is_empty())
            .map(PathBuf::from);
        if let Some(path) = lookup("WALLET_PATH") {
            config.wallet_path = PathBuf::from(path);
        }
        if let Some(policy) = lookup("GENESIS_REWARD") {
            config.genesis_reward = match policy.to_ascii_lowercase().as_str() {
                "miner" => GenesisReward::Miner,
                "none" => GenesisReward::NoReward,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "GENESIS_REWARD",
                        value: policy,
                    });
                }
            };
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert!(config.data_dir.is_none());
        assert_eq!(config.genesis_reward, GenesisReward::Miner);
    }

    #[test]
    fn reads_overrides() {
        let config = Config::from_lookup(lookup(&[
            ("PORT", "4000"),
            ("DATA_DIR", "/tmp/chain"),
            ("GENESIS_REWARD", "None"),
        ]))
        .unwrap();
        assert_eq!(config.port, 4000);
        assert_eq!(config.data_dir, Some(PathBuf::from("/tmp/chain")));
        assert_eq!(config.genesis_reward, GenesisReward::NoReward);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            Config::from_lookup(lookup(&[("PORT", "eighty")])),
            Err(ConfigError::Invalid { key: "PORT", .. })
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("GENESIS_REWARD", "sometimes")])),
            Err(ConfigError::Invalid {
                key: "GENESIS_REWARD",
                ..
            })
        ));
    }
}
