pub mod builder;
pub mod mempool;
pub mod model;

pub use builder::make_tx;
pub use mempool::Mempool;
pub use model::{Tx, TxIn, TxOut, UTxOut};
