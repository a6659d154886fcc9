use doug_rlp::error::RLPDecodeError;
use doug_trie::TrieError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    RLPDecode(#[from] RLPDecodeError),
    #[error(transparent)]
    Trie(#[from] TrieError),
    #[error("no last block has been written yet")]
    NoLastBlock,
    /// Fatal: a stored record exists but cannot be parsed, or the
    /// underlying database reported an internal inconsistency. The node
    /// must stop rather than operate on an untrustworthy store.
    #[error("corrupt store: {0}")]
    Corrupt(String),
}
