//! The node context: one ledger and one mempool, always mutated together.

use log::{error, info};

use crate::blockchain::{Block, Ledger};
use crate::error::{LedgerError, TxError};
use crate::transaction::{Mempool, Tx, UTxOut};
use crate::wallet::Wallet;

pub struct Node {
    pub ledger: Ledger,
    pub mempool: Mempool,
}

impl Node {
    pub fn new(ledger: Ledger) -> Self {
        Self {
            ledger,
            mempool: Mempool::new(),
        }
    }

    /// Queue a payment from `wallet` to `to`.
    pub fn transfer(&mut self, wallet: &Wallet, to: &str, amount: u64) -> Result<Tx, TxError> {
        let tx = self
            .mempool
            .add_transfer(&self.ledger, wallet, to, amount)?;
        info!("queued tx {} paying {} to {}", tx.id, amount, to);
        Ok(tx)
    }

    /// Drain the mempool into an unmined candidate rewarding `miner`.
    /// Must be followed by [`Node::commit_block`] or [`Node::abort_block`].
    pub fn prepare_block(&mut self, miner: &str) -> Result<Block, LedgerError> {
        let height = self.ledger.height() + 1;
        let txs = self.mempool.drain_for_block(miner, height);
        self.ledger.template(txs, "").inspect_err(|_| self.mempool.restore())
    }

    /// Append a block mined from [`Node::prepare_block`]'s candidate.
    pub fn commit_block(&mut self, block: Block) -> Result<(), LedgerError> {
        match self.ledger.append(block) {
            Ok(()) => {
                self.mempool.confirm();
                Ok(())
            }
            Err(e) => {
                error!("could not append mined block: {e}");
                self.mempool.restore();
                Err(e)
            }
        }
    }

    pub fn abort_block(&mut self) {
        self.mempool.restore();
    }

    /// Produce a block in the calling thread.
    pub fn mine_block(&mut self, miner: &str) -> Result<Block, LedgerError> {
        let mut block = self.prepare_block(miner)?;
        block.mine();
        self.commit_block(block.clone())?;
        Ok(block)
    }

    pub fn balance(&self, address: &str) -> Result<u64, LedgerError> {
        self.ledger.balance_by_address(address, &self.mempool)
    }

    pub fn utxouts(&self, address: &str) -> Result<Vec<UTxOut>, LedgerError> {
        self.ledger.utxouts_by_address(address, &self.mempool)
    }
}
