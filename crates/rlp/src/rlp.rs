//! # doug-rlp
//!
//! Recursive Length Prefix (RLP) encoding and decoding, the wire format shared by
//! blocks, transactions, receipts and trie nodes throughout the chain core.
//!
//! ```rust
//! use doug_rlp::encode::RLPEncode;
//! use doug_rlp::decode::RLPDecode;
//!
//! let value: u64 = 42;
//! let encoded = value.encode_to_vec();
//! assert_eq!(u64::decode(&encoded).unwrap(), value);
//! ```

pub mod constants;
pub mod decode;
pub mod encode;
pub mod error;
pub mod structs;
