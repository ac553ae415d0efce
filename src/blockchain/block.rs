use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::transaction::Tx;

/// How many nonces to try between looks at the cancellation flag.
const CANCEL_CHECK_EVERY: u64 = 1024;

/// A single block in the chain holding an ordered list of transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub hash: String, // Cached hash of the block
    pub prev_hash: String, // Empty for genesis only
    pub height: u64,
    pub difficulty: u32,
    pub nonce: u64,     // Proof-of-Work nonce
    pub timestamp: i64, // Unix timestamp (UTC)
    pub data: String,
    pub transactions: Vec<Tx>,
}

impl Block {
    /// Create a new block (not mined yet). Call `mine()` to perform PoW.
    pub fn new(
        height: u64,
        prev_hash: String,
        difficulty: u32,
        data: String,
        transactions: Vec<Tx>,
    ) -> Self {
        let mut block = Self {
            hash: String::new(),
            prev_hash,
            height,
            difficulty,
            nonce: 0,
            timestamp: Utc::now().timestamp(),
            data,
            transactions,
        };
        block.hash = block.compute_hash();
        block
    }

    /// Compute the SHA-256 hash of this block using its fields
    /// (excluding the `hash` field itself). Transactions are serialized
    /// deterministically as JSON and included in the preimage.
    pub fn compute_hash(&self) -> String {
        let txs_json = serde_json::to_string(&self.transactions).expect("serialize txs");
        let preimage = format!(
            "{}:{}:{}:{}:{}:{}:{}",
            self.prev_hash,
            self.height,
            self.difficulty,
            self.timestamp,
            self.nonce,
            self.data,
            txs_json
        );
        let mut hasher = Sha256::new();
        hasher.update(preimage.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Does `hash` start with `difficulty` zero hex digits?
    pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
        let difficulty = difficulty as usize;
        hash.len() >= difficulty && hash.bytes().take(difficulty).all(|c| c == b'0')
    }

    /// Perform Proof-of-Work from nonce 0 until the hash carries
    /// `self.difficulty` leading zeros (in hex).
    pub fn mine(&mut self) {
        self.mine_until(&AtomicBool::new(false));
    }

    /// Same search as [`Block::mine`], giving up when `cancel` is raised.
    /// Returns `true` if a valid nonce was found.
    pub fn mine_until(&mut self, cancel: &AtomicBool) -> bool {
        self.nonce = 0;
        loop {
            self.hash = self.compute_hash();
            if Self::meets_difficulty(&self.hash, self.difficulty) {
                return true;
            }
            self.nonce = self.nonce.wrapping_add(1);
            if self.nonce % CANCEL_CHECK_EVERY == 0 && cancel.load(Ordering::Relaxed) {
                return false;
            }
        }
    }

    /// Validate that the block's cached `hash` matches its content and
    /// satisfies its own PoW difficulty. (Does NOT validate chain linkage.)
    pub fn is_valid(&self) -> bool {
        self.hash == self.compute_hash() && Self::meets_difficulty(&self.hash, self.difficulty)
    }

    /// The trailing reward transaction, if the block carries one.
    pub fn reward(&self) -> Option<&Tx> {
        self.transactions.last().filter(|tx| tx.is_coinbase())
    }
}
