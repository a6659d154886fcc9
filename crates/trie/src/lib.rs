//! Merkle-Patricia trie: deterministic, content-addressed key/value storage
//! with a single root hash that commits to the whole data set.
//!
//! Every non-empty node is stored by the Keccak256 hash of its RLP
//! encoding, in either the in-memory write cache or the backing
//! [`TrieDB`]. Short nodes are not inlined into their parent's encoding;
//! this trades the constant-factor storage win real clients take for a
//! simpler, more literal reading of the four node kinds.

pub mod db;
pub mod error;
pub mod nibbles;
pub mod node;
pub mod trie;

pub use db::{InMemoryTrieDB, TrieDB};
pub use error::TrieError;
pub use nibbles::Nibbles;
pub use node::{Node, NodeRef};
pub use trie::{empty_root, Trie};
