use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use ethereum_types::H256;

use crate::error::TrieError;

/// Backing store the trie reads committed nodes from and flushes
/// newly-hashed nodes to on `sync`. Keyed by node hash; absent keys are not
/// an error at this layer (the trie distinguishes "node not found" itself).
pub trait TrieDB: Send + Sync {
    fn get(&self, key: H256) -> Result<Option<Vec<u8>>, TrieError>;
    fn put_batch(&self, nodes: Vec<(H256, Vec<u8>)>) -> Result<(), TrieError>;
}

/// In-memory implementation, used by tests and by the in-memory storage
/// backend.
#[derive(Debug, Default, Clone)]
pub struct InMemoryTrieDB {
    inner: Arc<Mutex<HashMap<H256, Vec<u8>>>>,
}

impl InMemoryTrieDB {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TrieDB for InMemoryTrieDB {
    fn get(&self, key: H256) -> Result<Option<Vec<u8>>, TrieError> {
        Ok(self.inner.lock().expect("trie db lock poisoned").get(&key).cloned())
    }

    fn put_batch(&self, nodes: Vec<(H256, Vec<u8>)>) -> Result<(), TrieError> {
        let mut db = self.inner.lock().expect("trie db lock poisoned");
        for (key, value) in nodes {
            db.insert(key, value);
        }
        Ok(())
    }
}
