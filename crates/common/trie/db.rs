use crate::error::TrieError;
use ethereum_types::H256;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

/// Key-value store holding encoded trie nodes keyed by their hash
pub trait TrieDB: Send + Sync {
    fn get(&self, key: H256) -> Result<Option<Vec<u8>>, TrieError>;
    /// Writes all entries at once, implementations must make the batch visible atomically
    fn put_batch(&self, key_values: Vec<(H256, Vec<u8>)>) -> Result<(), TrieError>;
    fn put(&self, key: H256, value: Vec<u8>) -> Result<(), TrieError> {
        self.put_batch(vec![(key, value)])
    }
    fn contains(&self, key: H256) -> Result<bool, TrieError> {
        Ok(self.get(key)?.is_some())
    }
}

/// InMemory implementation for the TrieDB trait, with get and put operations.
#[derive(Clone, Default)]
pub struct InMemoryTrieDB {
    inner: Arc<Mutex<HashMap<H256, Vec<u8>>>>,
}

impl InMemoryTrieDB {
    pub const fn new(map: Arc<Mutex<HashMap<H256, Vec<u8>>>>) -> Self {
        Self { inner: map }
    }

    pub fn new_empty() -> Self {
        Self::default()
    }

    /// Amount of nodes currently stored
    pub fn len(&self) -> Result<usize, TrieError> {
        Ok(self.inner.lock().map_err(|_| TrieError::LockError)?.len())
    }

    pub fn is_empty(&self) -> Result<bool, TrieError> {
        Ok(self.len()? == 0)
    }

    /// Returns a copy of every stored entry
    pub fn entries(&self) -> Result<HashMap<H256, Vec<u8>>, TrieError> {
        Ok(self.inner.lock().map_err(|_| TrieError::LockError)?.clone())
    }
}

impl TrieDB for InMemoryTrieDB {
    fn get(&self, key: H256) -> Result<Option<Vec<u8>>, TrieError> {
        Ok(self
            .inner
            .lock()
            .map_err(|_| TrieError::LockError)?
            .get(&key)
            .cloned())
    }

    fn put_batch(&self, key_values: Vec<(H256, Vec<u8>)>) -> Result<(), TrieError> {
        let mut db = self.inner.lock().map_err(|_| TrieError::LockError)?;

        for (key, value) in key_values {
            db.insert(key, value);
        }

        Ok(())
    }
}
