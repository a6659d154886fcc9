//! Proof-of-work verification and block-time bounds shared by the `Eth`
//! and `StdLib` models. Both hash with Keccak256 (the same hasher used
//! throughout this crate for account, trie, and block hashing); a
//! different hashing algorithm is a model parameter this repo doesn't
//! need to support.

use doug_common::BlockHeader;
use ethereum_types::U256;

use crate::error::ProtocolError;

/// A block's hash, read as a big integer, must not exceed `2^256 /
/// difficulty` for the nonce to verify.
pub fn verify_pow(header: &BlockHeader) -> bool {
    if header.difficulty.is_zero() {
        return false;
    }
    let target = U256::max_value() / header.difficulty;
    let hash = U256::from_big_endian(header.hash().as_bytes());
    hash <= target
}

/// Timestamps must strictly increase and may not run more than
/// `MAX_FUTURE_DRIFT` seconds ahead of the wall clock at validation time.
const MAX_FUTURE_DRIFT_SECS: u64 = 15;

pub fn check_block_times(parent: &BlockHeader, block: &BlockHeader, now: u64) -> Result<(), ProtocolError> {
    if block.timestamp <= parent.timestamp {
        return Err(ProtocolError::BadBlockTime);
    }
    if block.timestamp > now + MAX_FUTURE_DRIFT_SECS {
        return Err(ProtocolError::BadBlockTime);
    }
    Ok(())
}
