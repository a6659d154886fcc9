use thiserror::Error;

#[derive(Debug, Error)]
pub enum VmError {
    #[error("execution reverted: {0:?}")]
    Reverted(bytes::Bytes),
    #[error("out of gas")]
    OutOfGas,
    #[error("evm halted: {0}")]
    Halted(String),
}
