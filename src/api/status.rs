use actix_web::{HttpResponse, Responder, get, web};
use std::sync::atomic::Ordering;

use super::internal_error;
use super::models::{AppState, StatusResponse};
use crate::blockchain::{BLOCK_INTERVAL_MINUTES, DIFFICULTY_INTERVAL};

#[get("/status/")]
pub async fn get_status(state: web::Data<AppState>) -> impl Responder {
    let node = state.node.lock().expect("mutex poisoned");
    let chain = node.ledger.state();

    // difficulty the next block will be mined at (may trigger a recalculation)
    let next_difficulty = match node.ledger.difficulty() {
        Ok(d) => d,
        Err(e) => return internal_error(e),
    };

    HttpResponse::Ok().json(StatusResponse {
        height: chain.height,
        newest_hash: chain.newest_hash.clone(),
        current_difficulty: chain.current_difficulty,
        next_difficulty,
        difficulty_interval: DIFFICULTY_INTERVAL,
        block_interval_minutes: BLOCK_INTERVAL_MINUTES,
        mempool_size: node.mempool.len(),
        mining: state.mining.load(Ordering::Relaxed),
    })
}
