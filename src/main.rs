mod api;
mod blockchain;
mod config;
mod error;
mod node;
mod storage;
mod transaction;
mod wallet;

use actix_web::{App, HttpServer, web};
use dotenvy::dotenv;
use log::{error, info, warn};
use std::io;

use api::AppState;
use blockchain::Ledger;
use config::Config;
use node::Node;
use storage::{FileStore, MemoryStore, Storage};
use wallet::Wallet;

#[actix_web::main]
async fn main() -> io::Result<()> {
    let _ = dotenv();
    env_logger::init();

    let config = Config::from_env().map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

    let wallet = Wallet::load_or_create(&config.wallet_path)?;
    let store: Box<dyn Storage> = match &config.data_dir {
        Some(dir) => Box::new(FileStore::open(dir).map_err(io::Error::other)?),
        None => {
            warn!("DATA_DIR not set; chain will not survive a restart");
            Box::new(MemoryStore::new())
        }
    };
    let ledger = Ledger::open(store, config.genesis_reward, &wallet.address).map_err(|e| {
        error!("could not open ledger: {e}");
        io::Error::other(e)
    })?;
    info!(
        "ledger at height {} (tip {}), node address {}",
        ledger.height(),
        ledger.newest_hash(),
        wallet.address
    );

    let state = web::Data::new(AppState::new(Node::new(ledger), wallet));

    // stop a running nonce search when the process is interrupted
    let on_interrupt = state.clone();
    actix_web::rt::spawn(async move {
        if actix_web::rt::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel_mining();
        }
    });

    let (host, port) = (config.host.clone(), config.port);
    println!("⛓️ Starting ledger API at http://{host}:{port}");

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(api::init_routes)
    })
    .bind((host.as_str(), port))?
    .run()
    .await
}
