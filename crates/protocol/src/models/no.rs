use doug_common::{Block, BlockHeader, Transaction};
use ethereum_types::{Address, U256};

use crate::{
    error::ProtocolError,
    genesis::GenesisConfig,
    model::ProtocolModel,
    state::{StateView, StateWriter},
};

/// Denies every permission. `participate` still returns `true` — the
/// caller is expected to try mining anyway and have it fail validation,
/// the same way the original's `NoModel` is "mostly just used for
/// testing" deny-all behavior.
pub struct NoModel {
    genesis: GenesisConfig,
}

impl NoModel {
    pub fn new(genesis: GenesisConfig) -> Self {
        Self { genesis }
    }
}

impl ProtocolModel for NoModel {
    fn deploy(&self, genesis: &GenesisConfig, state: &dyn StateWriter) {
        genesis.deploy(state)
    }

    fn participate(&self, _coinbase: Address, _parent: &BlockHeader, _parent_state: &dyn StateView, _now: u64) -> bool {
        true
    }

    fn difficulty(&self, _header: &BlockHeader, _parent: &BlockHeader, _parent_state: &dyn StateView) -> U256 {
        U256::one() << self.genesis.difficulty_exponent
    }

    fn validate_perm(&self, _addr: Address, _role: &str, _state: &dyn StateView) -> Result<(), ProtocolError> {
        Err(ProtocolError::Denied)
    }

    fn validate_block(
        &self,
        _block: &Block,
        _parent: &BlockHeader,
        _parent_state: &dyn StateView,
        _now: u64,
    ) -> Result<(), ProtocolError> {
        Err(ProtocolError::Denied)
    }

    fn validate_tx(&self, _tx: &Transaction, _state: &dyn StateView) -> Result<(), ProtocolError> {
        Err(ProtocolError::Denied)
    }
}
