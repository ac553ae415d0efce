//! Persistence collaborator for the ledger.
//!
//! The ledger only ever hands this layer opaque bytes: a checkpoint of the
//! chain state and one serialized block per hash. Two backends exist:
//!
//! - [`MemoryStore`] keeps everything in a `HashMap` (tests, throwaway nodes),
//! - [`FileStore`] keeps a `checkpoint` file and a `blocks/` directory.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::StorageError;

/// Byte-level checkpoint and block store.
pub trait Storage: Send {
    /// Overwrite the checkpoint.
    fn save_checkpoint(&mut self, bytes: &[u8]) -> Result<(), StorageError>;

    /// Last saved checkpoint, if any.
    fn load_checkpoint(&self) -> Result<Option<Vec<u8>>, StorageError>;

    /// Store a serialized block under its hash.
    fn put_block(&mut self, hash: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Fetch a serialized block by hash.
    fn get_block(&self, hash: &str) -> Result<Option<Vec<u8>>, StorageError>;
}
