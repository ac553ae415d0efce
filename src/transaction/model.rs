use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Owner recorded on the sentinel input of a reward transaction.
pub const COINBASE_OWNER: &str = "COINBASE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxIn {
    /// Id of the transaction whose output is spent ("" for coinbase)
    pub tx_id: String,
    /// Output index in that transaction (-1 for coinbase)
    pub index: i64,
    /// Address spending the output
    pub owner: String,
    /// Hex compact ECDSA signature over the tx sighash
    #[serde(default)]
    pub signature: String,
}

impl TxIn {
    pub fn new(tx_id: impl Into<String>, index: i64, owner: impl Into<String>) -> Self {
        Self {
            tx_id: tx_id.into(),
            index,
            owner: owner.into(),
            signature: String::new(),
        }
    }

    /// The sentinel input of a reward transaction.
    pub fn coinbase() -> Self {
        Self::new("", -1, COINBASE_OWNER)
    }

    pub fn is_coinbase(&self) -> bool {
        self.tx_id.is_empty() && self.index == -1 && self.owner == COINBASE_OWNER
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    pub owner: String,
    pub amount: u64,
}

impl TxOut {
    pub fn new(owner: impl Into<String>, amount: u64) -> Self {
        Self {
            owner: owner.into(),
            amount,
        }
    }
}

/// An output not consumed by committed history nor by a pending input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UTxOut {
    pub tx_id: String,
    pub index: usize,
    pub amount: u64,
}

impl UTxOut {
    /// True if `input` spends this output.
    pub fn is_spent_by(&self, input: &TxIn) -> bool {
        input.tx_id == self.tx_id && input.index == self.index as i64
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tx {
    /// Hex SHA-256 of the signing payload; fixed at construction.
    pub id: String,
    pub timestamp: i64,
    pub tx_ins: Vec<TxIn>,
    pub tx_outs: Vec<TxOut>,
    /// Height of the block a reward transaction pays for.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coinbase_height: Option<u64>,
}

/// What the id commits to: everything but the signatures.
#[derive(Serialize)]
struct SigningPayload<'a> {
    timestamp: i64,
    tx_ins: Vec<(&'a str, i64, &'a str)>,
    tx_outs: &'a [TxOut],
    coinbase_height: Option<u64>,
}

impl Tx {
    /// Build a transfer stamped with the current time and compute its id.
    pub fn new(tx_ins: Vec<TxIn>, tx_outs: Vec<TxOut>) -> Self {
        Self::with_timestamp(tx_ins, tx_outs, Utc::now().timestamp())
    }

    pub fn with_timestamp(tx_ins: Vec<TxIn>, tx_outs: Vec<TxOut>, timestamp: i64) -> Self {
        let mut tx = Self {
            id: String::new(),
            timestamp,
            tx_ins,
            tx_outs,
            coinbase_height: None,
        };
        tx.id = hex::encode(tx.sighash());
        tx
    }

    /// Reward transaction minting `amount` to `address` for the block at `height`.
    pub fn coinbase(address: &str, amount: u64, height: u64) -> Self {
        let mut tx = Self {
            id: String::new(),
            timestamp: Utc::now().timestamp(),
            tx_ins: vec![TxIn::coinbase()],
            tx_outs: vec![TxOut::new(address, amount)],
            coinbase_height: Some(height),
        };
        tx.id = hex::encode(tx.sighash());
        tx
    }

    pub fn is_coinbase(&self) -> bool {
        self.tx_ins.len() == 1 && self.tx_ins[0].is_coinbase()
    }

    pub fn total_output_amount(&self) -> u64 {
        self.tx_outs.iter().map(|o| o.amount).sum()
    }

    /// SHA-256 of the canonical payload. Inputs contribute their outpoint and
    /// owner only, so signing an input never changes the id.
    pub fn sighash(&self) -> [u8; 32] {
        let payload = SigningPayload {
            timestamp: self.timestamp,
            tx_ins: self
                .tx_ins
                .iter()
                .map(|i| (i.tx_id.as_str(), i.index, i.owner.as_str()))
                .collect(),
            tx_outs: &self.tx_outs,
            coinbase_height: self.coinbase_height,
        };
        let mut hasher = Sha256::new();
        hasher.update(serde_json::to_vec(&payload).expect("serialize signing payload"));
        let digest = hasher.finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest[..]);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_ignores_signatures() {
        let mut tx = Tx::with_timestamp(
            vec![TxIn::new("abc", 0, "alice")],
            vec![TxOut::new("bob", 5)],
            1_700_000_000,
        );
        let id = tx.id.clone();
        tx.tx_ins[0].signature = "deadbeef".into();
        assert_eq!(id, hex::encode(tx.sighash()));
    }

    #[test]
    fn id_depends_on_timestamp_and_outputs() {
        let a = Tx::with_timestamp(vec![], vec![TxOut::new("bob", 5)], 1);
        let b = Tx::with_timestamp(vec![], vec![TxOut::new("bob", 5)], 2);
        let c = Tx::with_timestamp(vec![], vec![TxOut::new("bob", 6)], 1);
        assert_ne!(a.id, b.id);
        assert_ne!(a.id, c.id);
    }

    #[test]
    fn coinbase_uses_sentinel_input() {
        let tx = Tx::coinbase("miner", 50, 7);
        assert!(tx.is_coinbase());
        assert_eq!(tx.tx_ins[0].tx_id, "");
        assert_eq!(tx.tx_ins[0].index, -1);
        assert_eq!(tx.tx_ins[0].owner, COINBASE_OWNER);
        assert_eq!(tx.total_output_amount(), 50);
    }

    #[test]
    fn rewards_for_different_heights_have_distinct_ids() {
        let a = Tx::coinbase("miner", 50, 1);
        let b = Tx::coinbase("miner", 50, 2);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn transfer_json_omits_coinbase_height() {
        let tx = Tx::new(vec![TxIn::new("abc", 1, "alice")], vec![TxOut::new("bob", 1)]);
        let json = serde_json::to_value(&tx).unwrap();
        assert!(json.get("coinbase_height").is_none());
        assert!(!tx.is_coinbase());
    }
}
