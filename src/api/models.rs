use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::blockchain::Block;
use crate::node::Node;
use crate::transaction::UTxOut;
use crate::wallet::Wallet;

/// Shared application state: the node behind one writer lock plus the
/// node's own wallet, which receives rewards and pays transfers.
pub struct AppState {
    pub node: Mutex<Node>,
    pub wallet: Wallet,
    /// Set while a block is being mined; one block at a time.
    pub mining: AtomicBool,
    /// Raised on shutdown to stop an in-progress nonce search.
    pub cancel: Arc<AtomicBool>,
}

impl AppState {
    pub fn new(node: Node, wallet: Wallet) -> Self {
        Self {
            node: Mutex::new(node),
            wallet,
            mining: AtomicBool::new(false),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel_mining(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }
}

/* ---------- Chain API Models ---------- */

#[derive(Serialize)]
pub struct BlocksResponse {
    pub height: u64,
    pub blocks: Vec<Block>,
}

#[derive(Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
    pub height: u64,
    pub error: Option<String>,
}

#[derive(Serialize)]
pub struct MineResponse {
    pub height: u64,
    pub hash: String,
    pub nonce: u64,
    pub difficulty: u32,
    pub transactions: usize,
}

impl From<&Block> for MineResponse {
    fn from(block: &Block) -> Self {
        Self {
            height: block.height,
            hash: block.hash.clone(),
            nonce: block.nonce,
            difficulty: block.difficulty,
            transactions: block.transactions.len(),
        }
    }
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub height: u64,
    pub newest_hash: String,
    pub current_difficulty: u32,
    pub next_difficulty: u32,
    pub difficulty_interval: u64,
    pub block_interval_minutes: i64,
    pub mempool_size: usize,
    pub mining: bool,
}

/* ---------- TX API Models ---------- */

#[derive(Deserialize)]
pub struct NewTxRequest {
    pub to: String,
    pub amount: u64,
}

#[derive(Serialize)]
pub struct NewTxResponse {
    pub tx_id: String,
}

#[derive(Serialize)]
pub struct MempoolResponse {
    pub size: usize,
    pub transactions: Vec<String>, // list tx ids for brevity
}

/* ---------- Address API Models ---------- */

#[derive(Serialize)]
pub struct BalanceResponse {
    pub address: String,
    pub balance: u64,
    pub utxos: usize,
}

#[derive(Serialize)]
pub struct UtxosResponse {
    pub address: String,
    pub utxos: Vec<UTxOut>,
}

#[derive(Serialize)]
pub struct WalletResponse {
    pub address: String,
}
