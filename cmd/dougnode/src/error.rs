use doug_blockchain::ChainError;
use doug_storage::StoreError;
use thiserror::Error;

use crate::addr::ParseError;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// Corrupt storage or a mid-reorg invariant violation: the node can no
/// longer trust its own state and must stop rather than keep mining or
/// writing on top of it.
pub fn is_fatal(err: &ChainError) -> bool {
    matches!(err, ChainError::Fatal(_) | ChainError::Store(StoreError::Corrupt(_)))
}
