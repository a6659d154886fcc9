use std::sync::Arc;

use doug_trie::{TrieDB, TrieError};
use ethereum_types::H256;

use crate::engine::{KvEngine, Table};

/// Adapts the node's [`KvEngine`] so the trie crate can commit nodes to
/// the same backing store as everything else, instead of the free-standing
/// `InMemoryTrieDB` tests use.
pub struct EngineTrieDB {
    engine: Arc<dyn KvEngine>,
}

impl EngineTrieDB {
    pub fn new(engine: Arc<dyn KvEngine>) -> Arc<Self> {
        Arc::new(Self { engine })
    }
}

impl TrieDB for EngineTrieDB {
    fn get(&self, key: H256) -> Result<Option<Vec<u8>>, TrieError> {
        self.engine.get(Table::TrieNodes, key.as_bytes()).map_err(|e| TrieError::DbError(e.to_string()))
    }

    fn put_batch(&self, nodes: Vec<(H256, Vec<u8>)>) -> Result<(), TrieError> {
        let items = nodes.into_iter().map(|(h, v)| (h.as_bytes().to_vec(), v)).collect();
        self.engine
            .put_batch(Table::TrieNodes, items)
            .map_err(|e| TrieError::DbError(e.to_string()))
    }
}
