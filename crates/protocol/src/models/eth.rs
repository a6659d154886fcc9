use doug_common::{Block, BlockHeader, Transaction};
use ethereum_types::{Address, U256};

use crate::{
    error::ProtocolError,
    genesis::{self, GenesisConfig},
    model::ProtocolModel,
    pow,
    state::{StateView, StateWriter},
};

/// Classical proof-of-work rules, no permission layer: any address may
/// mine or transact. Block validity rests entirely on difficulty, block
/// time, and nonce.
pub struct EthModel {
    genesis: GenesisConfig,
}

impl EthModel {
    pub fn new(genesis: GenesisConfig) -> Self {
        Self { genesis }
    }
}

impl ProtocolModel for EthModel {
    fn deploy(&self, genesis: &GenesisConfig, state: &dyn StateWriter) {
        genesis.deploy(state)
    }

    fn participate(&self, _coinbase: Address, _parent: &BlockHeader, _parent_state: &dyn StateView, _now: u64) -> bool {
        true
    }

    fn difficulty(&self, header: &BlockHeader, parent: &BlockHeader, _parent_state: &dyn StateView) -> U256 {
        genesis::eth_difficulty(self.genesis.blocktime, header, parent)
    }

    fn validate_perm(&self, _addr: Address, _role: &str, _state: &dyn StateView) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn validate_block(
        &self,
        block: &Block,
        parent: &BlockHeader,
        parent_state: &dyn StateView,
        now: u64,
    ) -> Result<(), ProtocolError> {
        // A coinbase signature is optional under pure PoW compatibility:
        // only enforced when the block actually carries one.
        if let Some(signer) = block.header.signer()? {
            if signer != block.header.coinbase {
                return Err(ProtocolError::InvalidSignature);
            }
        }

        let expected = self.difficulty(&block.header, parent, parent_state);
        if block.header.difficulty != expected {
            return Err(ProtocolError::InvalidDifficulty { expected, got: block.header.difficulty });
        }

        pow::check_block_times(parent, &block.header, now)?;

        if !pow::verify_pow(&block.header) {
            return Err(ProtocolError::PoWInvalid);
        }

        Ok(())
    }

    fn validate_tx(&self, tx: &Transaction, state: &dyn StateView) -> Result<(), ProtocolError> {
        let sender = tx.sender()?;
        let expected = state.get_nonce(sender);
        if tx.nonce != expected {
            return Err(ProtocolError::NonceMismatch { expected, got: tx.nonce });
        }
        Ok(())
    }
}
