use actix_web::{HttpResponse, Responder, get, web};

use super::models::{AppState, WalletResponse};

/// Address of the node wallet (the implicit sender and reward recipient).
#[get("/wallet/")]
pub async fn get_wallet(state: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(WalletResponse {
        address: state.wallet.address.clone(),
    })
}
