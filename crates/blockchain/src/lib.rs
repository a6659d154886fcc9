//! Account-based chain core built on `doug-trie`/`doug-storage`: a
//! cache+trie `State`, a per-block transaction-application pipeline, and
//! a `ChainManager` that owns persistence and fork-choice.

pub mod block_manager;
pub mod chain;
pub mod error;
pub mod mempool;
pub mod state;

pub use chain::ChainManager;
pub use error::{ChainError, InvalidBlockError, MempoolError};
pub use mempool::Mempool;
pub use state::{ManifestEntry, State};
