use actix_web::{HttpResponse, Responder, get, web};

use super::internal_error;
use super::models::{AppState, BalanceResponse, UtxosResponse};

#[get("/balance/{address}/")]
pub async fn get_balance(state: web::Data<AppState>, path: web::Path<(String,)>) -> impl Responder {
    let address = path.into_inner().0;

    let utxos = {
        let node = state.node.lock().expect("mutex poisoned");
        match node.utxouts(&address) {
            Ok(utxos) => utxos,
            Err(e) => return internal_error(e),
        }
    };

    HttpResponse::Ok().json(BalanceResponse {
        address,
        balance: utxos.iter().map(|u| u.amount).sum(),
        utxos: utxos.len(),
    })
}

#[get("/utxos/{address}/")]
pub async fn get_utxos(state: web::Data<AppState>, path: web::Path<(String,)>) -> impl Responder {
    let address = path.into_inner().0;
    let node = state.node.lock().expect("mutex poisoned");
    match node.utxouts(&address) {
        Ok(utxos) => HttpResponse::Ok().json(UtxosResponse { address, utxos }),
        Err(e) => internal_error(e),
    }
}
