use sha3::{Digest, Keccak256};

/// Keccak256 of arbitrary bytes. Used for account code hashes, trie node
/// hashes, block/transaction hashes and the GenDoug address derivation.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Hash used as the sentinel for "no code" (`code_hash` of an account with
/// empty code).
pub fn empty_hash() -> [u8; 32] {
    keccak256(&[])
}
