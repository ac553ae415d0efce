use actix_web::{HttpResponse, Responder, get, post, web};
use log::{error, info, warn};
use std::sync::PoisonError;
use std::sync::atomic::Ordering;
use std::time::Instant;

use super::internal_error;
use super::models::{AppState, BlocksResponse, MineResponse, ValidateResponse};
use crate::blockchain::Block;
use crate::error::LedgerError;

/// The whole chain, newest block first.
#[get("/blocks/")]
pub async fn get_blocks(state: web::Data<AppState>) -> impl Responder {
    let node = state.node.lock().expect("mutex poisoned");
    match node.ledger.blocks() {
        Ok(blocks) => HttpResponse::Ok().json(BlocksResponse {
            height: node.ledger.height(),
            blocks,
        }),
        Err(e) => internal_error(e),
    }
}

#[get("/blocks/{hash}/")]
pub async fn get_block(state: web::Data<AppState>, path: web::Path<(String,)>) -> impl Responder {
    let hash = path.into_inner().0;
    let node = state.node.lock().expect("mutex poisoned");
    match node.ledger.get_block(&hash) {
        Ok(Some(block)) => HttpResponse::Ok().json(block),
        Ok(None) => HttpResponse::NotFound().body(format!("block {hash} not found")),
        Err(e) => internal_error(e),
    }
}

/// Validate the whole chain.
#[get("/validate/")]
pub async fn validate_chain(state: web::Data<AppState>) -> impl Responder {
    let node = state.node.lock().expect("mutex poisoned");
    let result = node.ledger.verify_chain();
    HttpResponse::Ok().json(ValidateResponse {
        valid: result.is_ok(),
        height: node.ledger.height(),
        error: result.err().map(|e| e.to_string()),
    })
}

/// Holds the single block-production slot. Dropping it puts back whatever
/// an unfinished candidate still holds, then frees the slot.
struct MiningSlot(web::Data<AppState>);

impl MiningSlot {
    fn acquire(state: &web::Data<AppState>) -> Option<Self> {
        state
            .mining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(state.clone()))
    }
}

impl Drop for MiningSlot {
    fn drop(&mut self) {
        // no-op once the candidate was committed or aborted
        self.0
            .node
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .abort_block();
        self.0.mining.store(false, Ordering::Release);
    }
}

enum Sealed {
    Mined(Block),
    Cancelled,
}

/// Prepare, mine and settle one block. Runs to completion on the blocking
/// pool whether or not anyone still waits for the answer.
fn seal_block(slot: MiningSlot) -> Result<Sealed, LedgerError> {
    let state = &slot.0;
    let mut candidate = state
        .node
        .lock()
        .expect("mutex poisoned")
        .prepare_block(&state.wallet.address)?;

    // node lock is released during the nonce search
    let t0 = Instant::now();
    if !candidate.mine_until(&state.cancel) {
        state.node.lock().expect("mutex poisoned").abort_block();
        warn!("MINER - search for block #{} cancelled", candidate.height);
        return Ok(Sealed::Cancelled);
    }

    state
        .node
        .lock()
        .expect("mutex poisoned")
        .commit_block(candidate.clone())?;
    info!(
        "MINER - sealed block #{} (hash={}, nonce={}, {} ms)",
        candidate.height,
        candidate.hash,
        candidate.nonce,
        t0.elapsed().as_millis()
    );
    Ok(Sealed::Mined(candidate))
}

/// Mine a new block from the current mempool:
/// - Drain pending transfers and append the reward for the node wallet
/// - Search for the nonce on the blocking pool, without the node lock
/// - Append the block and persist the checkpoint
/// - On cancellation or failure, put the drained transfers back
#[post("/blocks/")]
pub async fn mine_block(state: web::Data<AppState>) -> impl Responder {
    let Some(slot) = MiningSlot::acquire(&state) else {
        return HttpResponse::Conflict().body("block production already in progress");
    };

    match web::block(move || seal_block(slot)).await {
        Ok(Ok(Sealed::Mined(block))) => HttpResponse::Ok().json(MineResponse::from(&block)),
        Ok(Ok(Sealed::Cancelled)) => HttpResponse::ServiceUnavailable().body("mining cancelled"),
        Ok(Err(e)) => internal_error(e),
        Err(e) => {
            error!("MINER - worker failed: {e}");
            HttpResponse::InternalServerError().body("mining worker failed")
        }
    }
}
