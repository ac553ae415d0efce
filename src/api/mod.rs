mod balance;
mod chain;
mod health;
pub mod models;
mod status;
mod tx;
mod wallet;

use actix_web::HttpResponse;
use actix_web::web::{self, ServiceConfig};
use log::error;

pub use models::AppState;

use crate::error::LedgerError;

pub fn init_routes(cfg: &mut ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .service(health::health_check)
            .service(status::get_status)
            .service(chain::get_blocks)
            .service(chain::get_block)
            .service(chain::mine_block)
            .service(chain::validate_chain)
            .service(tx::post_transaction)
            .service(tx::get_mempool)
            .service(balance::get_balance)
            .service(balance::get_utxos)
            .service(wallet::get_wallet),
    );
}

/// Ledger failures are never the caller's fault.
fn internal_error(e: LedgerError) -> HttpResponse {
    error!("ledger error: {e}");
    HttpResponse::InternalServerError().body(e.to_string())
}
