//! Keccak hashing and secp256k1 signing/recovery used throughout the chain
//! core: account/code hashing, trie node hashing, block hashing, and
//! transaction sender recovery.

pub mod keccak;
pub mod signature;

pub use keccak::{empty_hash, keccak256};
pub use signature::{recover_signer, sign_message, CryptoError, KeyPair};

/// The well-known address of the genesis permission/consensus contract,
/// `Keccak256("the genesis doug")[12..]`. Every `StdLib`/`Vm` protocol model
/// must agree on this derivation.
pub fn gendoug_address() -> ethereum_types::Address {
    let hash = keccak256(b"the genesis doug");
    ethereum_types::Address::from_slice(&hash[12..])
}
