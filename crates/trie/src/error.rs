use doug_rlp::error::RLPDecodeError;
use ethereum_types::H256;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TrieError {
    #[error(transparent)]
    RLPDecode(#[from] RLPDecodeError),
    #[error("node with hash {0:#x} not found in trie database")]
    NodeNotFound(H256),
    #[error("trie database error: {0}")]
    DbError(String),
    #[error("corrupt trie node")]
    CorruptNode,
}
