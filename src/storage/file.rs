use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::debug;

use super::Storage;
use crate::error::StorageError;

const CHECKPOINT_FILE: &str = "checkpoint";
const BLOCKS_DIR: &str = "blocks";

/// Directory-backed [`Storage`].
///
/// Layout:
///
/// ```text
/// <root>/checkpoint
/// <root>/blocks/<hash>
/// ```
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(BLOCKS_DIR))?;
        debug!("FileStore opened at {}", root.display());
        Ok(Self { root })
    }

    fn block_path(&self, hash: &str) -> Result<PathBuf, StorageError> {
        // hashes are hex; anything else would escape the blocks directory
        if hash.is_empty() || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(StorageError::InvalidKey(hash.to_string()));
        }
        Ok(self.root.join(BLOCKS_DIR).join(hash))
    }
}

fn read_optional(path: &Path) -> Result<Option<Vec<u8>>, StorageError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

impl Storage for FileStore {
    fn save_checkpoint(&mut self, bytes: &[u8]) -> Result<(), StorageError> {
        let tmp = self.root.join(format!("{CHECKPOINT_FILE}.tmp"));
        fs::write(&tmp, bytes)?;
        fs::rename(&tmp, self.root.join(CHECKPOINT_FILE))?;
        Ok(())
    }

    fn load_checkpoint(&self) -> Result<Option<Vec<u8>>, StorageError> {
        read_optional(&self.root.join(CHECKPOINT_FILE))
    }

    fn put_block(&mut self, hash: &str, bytes: &[u8]) -> Result<(), StorageError> {
        fs::write(self.block_path(hash)?, bytes)?;
        Ok(())
    }

    fn get_block(&self, hash: &str) -> Result<Option<Vec<u8>>, StorageError> {
        match self.block_path(hash) {
            Ok(path) => read_optional(&path),
            // no block can live under a non-hex key
            Err(StorageError::InvalidKey(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
