use log::{debug, info, warn};

use super::{Tx, UTxOut, make_tx};
use crate::blockchain::{Ledger, MINER_REWARD};
use crate::error::TxError;
use crate::wallet::{Wallet, verify_signature_hex};

/// Transactions waiting for a block.
///
/// `sealing` holds transfers already drained into a block that is still
/// being mined. They keep their outputs reserved until the block is either
/// confirmed or aborted.
#[derive(Debug, Default)]
pub struct Mempool {
    txs: Vec<Tx>,
    sealing: Vec<Tx>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pending transfers, oldest first.
    pub fn txs(&self) -> &[Tx] {
        &self.txs
    }

    pub fn sealing(&self) -> &[Tx] {
        &self.sealing
    }

    pub fn len(&self) -> usize {
        self.txs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.txs.is_empty()
    }

    /// Pay `amount` to `to` out of `wallet`'s unspent outputs.
    pub fn add_transfer(
        &mut self,
        ledger: &Ledger,
        wallet: &Wallet,
        to: &str,
        amount: u64,
    ) -> Result<Tx, TxError> {
        let mut tx = make_tx(ledger, self, &wallet.address, to, amount)?;
        wallet.sign_tx(&mut tx);
        self.submit(tx.clone())?;
        Ok(tx)
    }

    /// Admit a signed transfer. Every input must carry a signature by its
    /// owner over the transaction's sighash.
    ///
    /// Only reachable through [`Mempool::add_transfer`], whose builder picks
    /// unspent, unreserved inputs and balances outputs against them.
    fn submit(&mut self, tx: Tx) -> Result<(), TxError> {
        if tx.tx_ins.iter().any(|input| input.is_coinbase()) {
            return Err(TxError::CoinbaseSubmission);
        }
        if tx.tx_outs.is_empty() || tx.tx_outs.iter().any(|o| o.amount == 0) {
            return Err(TxError::InvalidAmount);
        }

        let sighash = tx.sighash();
        for (index, input) in tx.tx_ins.iter().enumerate() {
            match verify_signature_hex(&input.owner, &input.signature, sighash) {
                Ok(true) => {}
                Ok(false) => {
                    warn!("tx {} input[{}]: signature mismatch", tx.id, index);
                    return Err(TxError::InvalidSignature {
                        index,
                        reason: "signature does not match owner",
                    });
                }
                Err(reason) => {
                    warn!("tx {} input[{}]: {}", tx.id, index, reason);
                    return Err(TxError::InvalidSignature { index, reason });
                }
            }
        }

        self.txs.push(tx);
        debug!("mempool size now {}", self.txs.len());
        Ok(())
    }

    /// True if a pending or sealing input already spends `utxout`.
    pub fn is_on_mempool(&self, utxout: &UTxOut) -> bool {
        self.txs
            .iter()
            .chain(&self.sealing)
            .flat_map(|tx| &tx.tx_ins)
            .any(|input| utxout.is_spent_by(input))
    }

    /// Take every pending transfer plus a reward for `miner` (last) for the
    /// block at `height`. The pending list is left empty.
    pub fn drain_for_block(&mut self, miner: &str, height: u64) -> Vec<Tx> {
        let mut txs = std::mem::take(&mut self.txs);
        self.sealing.extend(txs.iter().cloned());
        txs.push(Tx::coinbase(miner, MINER_REWARD, height));
        info!(
            "drained {} transfers for block #{} (reward to {})",
            txs.len() - 1,
            height,
            miner
        );
        txs
    }

    /// The sealing block was committed: its transfers are history now.
    pub fn confirm(&mut self) {
        self.sealing.clear();
    }

    /// The sealing block was abandoned: put its transfers back in front.
    pub fn restore(&mut self) {
        if self.sealing.is_empty() {
            return;
        }
        let mut txs = std::mem::take(&mut self.sealing);
        warn!("restoring {} transfers to the mempool", txs.len());
        txs.append(&mut self.txs);
        self.txs = txs;
    }
}
