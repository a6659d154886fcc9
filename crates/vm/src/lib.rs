//! The boundary between the chain core and an EVM implementation. The core
//! never interprets bytecode itself: it builds a [`Message`], hands it to an
//! [`Evm`], and treats the returned [`Outcome`] as opaque. Everything an
//! interpreter would need — the account's code, the call's input, the
//! enclosing block's context — travels in the message; nothing flows back
//! except `(output, gas_used, success)`.

pub mod error;

use bytes::Bytes;
use doug_common::BlockHeader;
use ethereum_types::{Address, U256};

pub use error::VmError;

/// The subset of a block's header an interpreter can observe (`BLOCKHASH`,
/// `COINBASE`, `DIFFICULTY`, `GASLIMIT`, `TIMESTAMP` and friends), carried
/// by value so a call doesn't hold a reference into the block being built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockContext {
    pub number: u64,
    pub timestamp: u64,
    pub difficulty: U256,
    pub gas_limit: u64,
    pub coinbase: Address,
}

impl From<&BlockHeader> for BlockContext {
    fn from(header: &BlockHeader) -> Self {
        Self {
            number: header.number,
            timestamp: header.timestamp,
            difficulty: header.difficulty,
            gas_limit: header.gas_limit,
            coinbase: header.coinbase,
        }
    }
}

/// A single call into the EVM collaborator. `to` is `None` for contract
/// creation, in which case `code` is the init code rather than an existing
/// account's code; the caller is responsible for deriving `new_address`
/// and, on success, storing the returned output as that account's code.
#[derive(Debug, Clone)]
pub struct Message {
    pub code: Bytes,
    pub input: Bytes,
    pub to: Option<Address>,
    pub from: Address,
    pub value: U256,
    pub origin: Address,
    pub block_ctx: BlockContext,
    pub gas: u64,
}

impl Message {
    pub fn is_creation(&self) -> bool {
        self.to.is_none()
    }
}

/// The result of executing a [`Message`]. `output` is the return data for a
/// call, or the code to install for a creation; `success` is false on a
/// revert, in which case state changes made during the call must be
/// discarded by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub output: Bytes,
    pub gas_used: u64,
    pub success: bool,
}

/// The narrow contract a pluggable EVM implementation satisfies:
/// `Execute(code, input, context) -> output`. Nothing else about an
/// implementation's internals — its opcode table, its gas schedule, whether
/// it's an interpreter or a JIT — is visible to the rest of the chain core.
pub trait Evm: Send + Sync {
    fn execute(&self, message: &Message) -> Result<Outcome, VmError>;
}

/// A deterministic stand-in backend used by tests and by nodes that don't
/// need real contract execution. It doesn't interpret `code` at all: a call
/// echoes its input back as output at a fixed cost per input byte, and a
/// creation "deploys" its init code verbatim, so callers can assert on
/// `new_address`/code-storage wiring without depending on a real
/// interpreter being linked in.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEvm {
    pub gas_per_byte: u64,
}

impl NoopEvm {
    pub fn new() -> Self {
        Self { gas_per_byte: 1 }
    }
}

impl Evm for NoopEvm {
    fn execute(&self, message: &Message) -> Result<Outcome, VmError> {
        let gas_used = (message.input.len() as u64)
            .saturating_mul(self.gas_per_byte)
            .min(message.gas);
        if gas_used == message.gas && message.gas < message.input.len() as u64 {
            return Err(VmError::OutOfGas);
        }

        let output = if message.is_creation() { message.code.clone() } else { message.input.clone() };
        Ok(Outcome { output, gas_used, success: true })
    }
}
