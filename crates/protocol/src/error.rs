use ethereum_types::{Address, U256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("{addr:#x} lacks permission {role:?}")]
    NoPermission { addr: Address, role: String },
    #[error("block signature does not match coinbase")]
    InvalidSignature,
    #[error("difficulty {got} does not match expected {expected}")]
    InvalidDifficulty { expected: U256, got: U256 },
    #[error("block timestamp is not monotone or too far in the future")]
    BadBlockTime,
    #[error("proof-of-work nonce does not verify")]
    PoWInvalid,
    #[error("tx gas {gas} exceeds maxgastx {max}")]
    GasLimitExceeded { gas: U256, max: U256 },
    #[error("nonce mismatch: expected {expected}, got {got}")]
    NonceMismatch { expected: u64, got: u64 },
    #[error("denied")]
    Denied,
    #[error(transparent)]
    Vm(#[from] doug_vm::VmError),
    #[error(transparent)]
    Crypto(#[from] doug_crypto::CryptoError),
}
