use actix_web::{HttpResponse, Responder, get, post, web};
use log::{debug, info, warn};
use std::time::Instant;

use super::internal_error;
use super::models::{AppState, MempoolResponse, NewTxRequest, NewTxResponse};
use crate::error::TxError;
use crate::wallet::pubkey_to_address_hex;

/// Pay `amount` to `to` from the node wallet. The transfer waits in the
/// mempool until the next block.
#[post("/transactions/")]
pub async fn post_transaction(
    state: web::Data<AppState>,
    body: web::Json<NewTxRequest>,
) -> impl Responder {
    let t0 = Instant::now();
    let NewTxRequest { to, amount } = body.into_inner();
    // public-key addresses are compared as lowercase hex
    let to = pubkey_to_address_hex(to.trim()).unwrap_or_else(|_| to.trim().to_string());
    debug!("POST /transactions/ - to={} amount={}", to, amount);

    if to.is_empty() {
        return HttpResponse::BadRequest().body("recipient address required");
    }

    let result = {
        let mut node = state.node.lock().expect("mutex poisoned");
        node.transfer(&state.wallet, &to, amount)
    };

    match result {
        Ok(tx) => {
            info!(
                "POST /transactions/ - tx_id={} OK ({} ms)",
                tx.id,
                t0.elapsed().as_millis()
            );
            HttpResponse::Ok().json(NewTxResponse { tx_id: tx.id })
        }
        Err(TxError::Ledger(e)) => internal_error(e),
        Err(e) => {
            warn!("POST /transactions/ - rejected: {e}");
            HttpResponse::BadRequest().body(e.to_string())
        }
    }
}

/// List current mempool (just tx ids to keep it compact).
#[get("/mempool/")]
pub async fn get_mempool(state: web::Data<AppState>) -> impl Responder {
    let node = state.node.lock().expect("mutex poisoned");
    let ids = node
        .mempool
        .txs()
        .iter()
        .map(|t| t.id.clone())
        .collect::<Vec<_>>();
    HttpResponse::Ok().json(MempoolResponse {
        size: ids.len(),
        transactions: ids,
    })
}
