use log::debug;

use super::{Mempool, Tx, TxIn, TxOut};
use crate::blockchain::Ledger;
use crate::error::TxError;

/// Build an unsigned transfer of `amount` from `from` to `to`.
///
/// Coin selection is greedy: unspent outputs are consumed in the order the
/// ledger returns them (newest block first) until they cover `amount`. Any
/// surplus comes back to `from` as a change output placed before the
/// recipient's output.
pub fn make_tx(
    ledger: &Ledger,
    mempool: &Mempool,
    from: &str,
    to: &str,
    amount: u64,
) -> Result<Tx, TxError> {
    if amount == 0 {
        return Err(TxError::InvalidAmount);
    }

    let utxouts = ledger.utxouts_by_address(from, mempool)?;
    let available: u64 = utxouts.iter().map(|u| u.amount).sum();
    if available < amount {
        return Err(TxError::InsufficientFunds {
            available,
            requested: amount,
        });
    }

    let mut total = 0u64;
    let mut tx_ins = Vec::new();
    for utxout in utxouts {
        if total >= amount {
            break;
        }
        tx_ins.push(TxIn::new(utxout.tx_id, utxout.index as i64, from));
        total += utxout.amount;
    }

    let mut tx_outs = Vec::with_capacity(2);
    let change = total - amount;
    if change != 0 {
        tx_outs.push(TxOut::new(from, change));
    }
    tx_outs.push(TxOut::new(to, amount));

    let tx = Tx::new(tx_ins, tx_outs);
    debug!(
        "built tx {} ({} inputs, change={})",
        tx.id,
        tx.tx_ins.len(),
        change
    );
    Ok(tx)
}
