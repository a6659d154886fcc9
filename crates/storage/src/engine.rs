use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use crate::error::StoreError;

/// The physically distinct tables persisted by a node. Kept separate so a
/// 32-byte block hash key can never collide with a 32-byte code hash or
/// trie node hash key, even though all three live in the same 32-byte
/// address space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Blocks,
    BlockInfo,
    Code,
    Meta,
    TrieNodes,
}

/// Backing key/value engine a node is built on. A real deployment would
/// implement this over an embedded database; tests and the in-process
/// node both use [`InMemoryEngine`].
pub trait KvEngine: Send + Sync {
    fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;
    fn put(&self, table: Table, key: Vec<u8>, value: Vec<u8>) -> Result<(), StoreError>;
    fn put_batch(&self, table: Table, items: Vec<(Vec<u8>, Vec<u8>)>) -> Result<(), StoreError>;
    fn delete(&self, table: Table, key: &[u8]) -> Result<(), StoreError>;
}

#[derive(Default)]
pub struct InMemoryEngine {
    tables: Mutex<HashMap<Table, HashMap<Vec<u8>, Vec<u8>>>>,
}

impl InMemoryEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

impl KvEngine for InMemoryEngine {
    fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let tables = self.tables.lock().expect("store lock poisoned");
        Ok(tables.get(&table).and_then(|t| t.get(key)).cloned())
    }

    fn put(&self, table: Table, key: Vec<u8>, value: Vec<u8>) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().expect("store lock poisoned");
        tables.entry(table).or_default().insert(key, value);
        Ok(())
    }

    fn put_batch(&self, table: Table, items: Vec<(Vec<u8>, Vec<u8>)>) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().expect("store lock poisoned");
        let t = tables.entry(table).or_default();
        for (key, value) in items {
            t.insert(key, value);
        }
        Ok(())
    }

    fn delete(&self, table: Table, key: &[u8]) -> Result<(), StoreError> {
        let mut tables = self.tables.lock().expect("store lock poisoned");
        if let Some(t) = tables.get_mut(&table) {
            t.remove(key);
        }
        Ok(())
    }
}
