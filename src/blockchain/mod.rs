pub mod block;
pub mod ledger;

pub use block::Block;
pub use ledger::{ChainState, GenesisReward, Ledger};

/// Default Proof-of-Work difficulty (number of leading zero hex digits).
pub const DEFAULT_DIFFICULTY: u32 = 2;

/// Difficulty is recalculated whenever the height is a multiple of this
pub const DIFFICULTY_INTERVAL: u64 = 5;

/// Target minutes per block
pub const BLOCK_INTERVAL_MINUTES: i64 = 2;

/// Slack in minutes around the expected window duration before we adjust
pub const ALLOWED_RANGE_MINUTES: i64 = 2;

/// Reward minted to the block producer
pub const MINER_REWARD: u64 = 50;

/// Seed payload of the genesis block
pub const GENESIS_DATA: &str = "Genesis";

/// Difficulty floor; fast windows keep raising it without a ceiling
pub const DIFF_MIN: u32 = 1;
