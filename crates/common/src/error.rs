use doug_rlp::error::RLPDecodeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommonError {
    #[error(transparent)]
    RLPDecode(#[from] RLPDecodeError),
    #[error("invalid signature on transaction")]
    InvalidSignature,
    #[error("code hash does not match the account's code")]
    CodeHashMismatch,
}
