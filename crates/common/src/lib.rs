//! Shared data model for the chain core: accounts, blocks, transactions,
//! receipts and the per-block sidecar info records that the storage and
//! blockchain crates build on.

pub mod error;
pub mod types;

pub use error::CommonError;
pub use types::{
    Account, AccountState, Block, BlockHeader, BlockInfo, ChainLink, Receipt, Transaction,
};
