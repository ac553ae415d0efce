use std::collections::HashMap;

use super::Storage;
use crate::error::StorageError;

/// In-memory implementation of [`Storage`]. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    checkpoint: Option<Vec<u8>>,
    blocks: HashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Storage for MemoryStore {
    fn save_checkpoint(&mut self, bytes: &[u8]) -> Result<(), StorageError> {
        self.checkpoint = Some(bytes.to_vec());
        Ok(())
    }

    fn load_checkpoint(&self) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.checkpoint.clone())
    }

    fn put_block(&mut self, hash: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.blocks.insert(hash.to_string(), bytes.to_vec());
        Ok(())
    }

    fn get_block(&self, hash: &str) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.blocks.get(hash).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checkpoint_starts_empty_and_is_overwritten() {
        let mut store = MemoryStore::new();
        assert!(store.load_checkpoint().unwrap().is_none());

        store.save_checkpoint(b"first").unwrap();
        store.save_checkpoint(b"second").unwrap();
        assert_eq!(store.load_checkpoint().unwrap().as_deref(), Some(&b"second"[..]));
    }

    #[test]
    fn blocks_are_keyed_by_hash() {
        let mut store = MemoryStore::new();
        store.put_block("aa", b"block-a").unwrap();
        store.put_block("aa", b"block-a2").unwrap();

        assert_eq!(store.get_block("aa").unwrap().as_deref(), Some(&b"block-a2"[..]));
        assert!(store.get_block("bb").unwrap().is_none());
        assert_eq!(store.blocks.len(), 1);
    }
}
