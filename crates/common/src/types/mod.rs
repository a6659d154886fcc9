mod account;
mod block;
mod chain_link;
mod receipt;
mod transaction;

pub use account::{Account, AccountState};
pub use block::{Block, BlockHeader};
pub use chain_link::{BlockInfo, ChainLink};
pub use receipt::Receipt;
pub use transaction::Transaction;
