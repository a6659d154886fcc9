use doug_common::{Block, BlockHeader, Transaction};
use ethereum_types::{Address, U256};

use crate::{
    error::ProtocolError,
    genesis::GenesisConfig,
    model::ProtocolModel,
    state::{StateView, StateWriter},
};

/// Grants every permission and mines unconditionally. Used in tests and
/// to bring up a chain with no permission enforcement at all.
pub struct YesModel {
    genesis: GenesisConfig,
}

impl YesModel {
    pub fn new(genesis: GenesisConfig) -> Self {
        Self { genesis }
    }
}

impl ProtocolModel for YesModel {
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
        Ok(())
    }

    fn validate_block(
        &self,
        _block: &Block,
        _parent: &BlockHeader,
        _parent_state: &dyn StateView,
        _now: u64,
    ) -> Result<(), ProtocolError> {
        Ok(())
    }

    fn validate_tx(&self, _tx: &Transaction, _state: &dyn StateView) -> Result<(), ProtocolError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::mock::MockState;

    #[test]
    fn grants_everything() {
        let model = YesModel::new(GenesisConfig::default());
        let state = MockState::default();
        assert!(model.validate_perm(Address::zero(), "mine", &state).is_ok());
        assert!(model.participate(Address::zero(), &sample_header(), &state, 0));
    }

    fn sample_header() -> BlockHeader {
        BlockHeader {
            prev_hash: Default::default(),
            uncle_hash: Default::default(),
            coinbase: Default::default(),
            state_root: Default::default(),
            tx_root: Default::default(),
            difficulty: U256::one(),
            number: 0,
            min_gas_price: U256::zero(),
            gas_limit: 0,
            gas_used: 0,
            timestamp: 0,
            extra: Default::default(),
            nonce: 0,
            signature: None,
        }
    }
}
