use ethereum_types::H256;
use thiserror::Error;

/// Reasons a candidate block is rejected before or during application.
/// Distinct from [`ChainError`] so callers can tell "this block is simply
/// bad" (discard it, maybe punish the peer) from "something in this node is
/// broken" (the `Fatal`/store/trie variants).
#[derive(Debug, Error)]
pub enum InvalidBlockError {
    #[error("parent block {0:#x} not found")]
    ParentNotFound(H256),
    #[error("nonce mismatch for sender: expected {expected}, got {got}")]
    NonceMismatch { expected: u64, got: u64 },
    #[error("sender cannot cover gas*gas_price")]
    InsufficientFunds,
    #[error("state root mismatch: expected {expected:#x}, computed {computed:#x}")]
    StateRootMismatch { expected: H256, computed: H256 },
    #[error(transparent)]
    Protocol(#[from] doug_protocol::ProtocolError),
}

/// Rejections a transaction can hit on its way into the [`crate::Mempool`],
/// distinct from [`InvalidBlockError`] since a pooled transaction is never
/// inside a block yet.
#[derive(Debug, Error)]
pub enum MempoolError {
    #[error("could not recover a sender address: invalid signature")]
    InvalidSignature,
    #[error("nonce too low")]
    NonceTooLow,
    #[error("sender cannot cover gas*gas_price")]
    InsufficientFunds,
}

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("invalid block: {0}")]
    InvalidBlock(#[from] InvalidBlockError),
    #[error(transparent)]
    Store(#[from] doug_storage::StoreError),
    #[error(transparent)]
    Trie(#[from] doug_trie::TrieError),
    #[error(transparent)]
    Vm(#[from] doug_vm::VmError),
    #[error("candidate chain's total difficulty does not exceed the canonical head")]
    LowerTotalDifficulty,
    #[error("candidate chain is broken: block {0:#x} does not chain to its predecessor")]
    BrokenChain(H256),
    #[error("no genesis block has been committed yet")]
    NoGenesis,
    /// Unrecoverable: corrupt storage, an invariant violated mid-reorg, or
    /// a paranoia-check repair that still didn't converge. `cmd/dougnode`
    /// treats this as fatal and exits rather than continuing on
    /// untrustworthy state.
    #[error("fatal chain error: {0}")]
    Fatal(String),
}
