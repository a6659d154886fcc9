use doug_common::{Block, BlockHeader, Transaction};
use ethereum_types::{Address, U256};

use crate::{
    error::ProtocolError,
    gendoug,
    genesis::{self, ConsensusTag, GenesisConfig, PERM_CREATE, PERM_MINE, PERM_TRANSACT},
    model::ProtocolModel,
    pow,
    state::{StateView, StateWriter},
};

/// Permissioned model: every hook reads permissions and consensus
/// parameters from the GenDoug contract's storage (§4.4, §6). `adversary`
/// is a per-instance test escape hatch that accepts everything, never a
/// global — flipping it in one test run must not affect another.
pub struct StdLibModel {
    genesis: GenesisConfig,
    adversary: bool,
}

impl StdLibModel {
    pub fn new(genesis: GenesisConfig) -> Self {
        Self { genesis, adversary: false }
    }

    pub fn adversary(genesis: GenesisConfig) -> Self {
        Self { genesis, adversary: true }
    }
}

impl ProtocolModel for StdLibModel {
    fn deploy(&self, genesis: &GenesisConfig, state: &dyn StateWriter) {
        genesis.deploy(state)
    }

    /// Saves energy in the round robin by not mining until close to the
    /// caller's turn, or until enough time has passed that it no longer
    /// matters whose turn it technically is.
    fn participate(&self, coinbase: Address, parent: &BlockHeader, parent_state: &dyn StateView, now: u64) -> bool {
        if self.adversary {
            return true;
        }

        let doug = doug_crypto::gendoug_address();
        if ConsensusTag::read(doug, parent_state) != ConsensusTag::Robin {
            return true;
        }

        let n_miners = gendoug::ring_len(doug, parent_state);
        let Some(next) = gendoug::nth_from_head(doug, parent.number + 1, parent_state) else {
            return true;
        };
        let i = match gendoug::distance(doug, next, coinbase, parent_state) {
            Some(i) => i,
            None => return false,
        };

        if i <= n_miners / 2 {
            return true;
        }

        let m_diff = i - n_miners / 2;
        let blocktime = genesis::blocktime(doug, parent_state).max(1);
        let t_diff = now.saturating_sub(parent.timestamp) / blocktime;
        t_diff > m_diff
    }

    fn difficulty(&self, header: &BlockHeader, parent: &BlockHeader, parent_state: &dyn StateView) -> U256 {
        let doug = doug_crypto::gendoug_address();
        match ConsensusTag::read(doug, parent_state) {
            ConsensusTag::Robin => genesis::round_robin_difficulty(doug, parent_state),
            ConsensusTag::StakeWeight => genesis::stake_difficulty(doug, parent_state),
            ConsensusTag::Constant => genesis::base_difficulty(doug, parent_state),
            ConsensusTag::Default => {
                genesis::eth_difficulty(genesis::blocktime(doug, parent_state), header, parent)
            }
        }
    }

    fn validate_perm(&self, addr: Address, role: &str, state: &dyn StateView) -> Result<(), ProtocolError> {
        if self.adversary {
            tracing::warn!(addr = ?addr, role, "adversary override: permission check bypassed");
            return Ok(());
        }
        let doug = doug_crypto::gendoug_address();
        if gendoug::has_permission(doug, addr, role, state) {
            Ok(())
        } else {
            tracing::debug!(addr = ?addr, role, "permission denied");
            Err(ProtocolError::NoPermission { addr, role: role.to_string() })
        }
    }

    fn validate_block(
        &self,
        block: &Block,
        parent: &BlockHeader,
        parent_state: &dyn StateView,
        now: u64,
    ) -> Result<(), ProtocolError> {
        if self.adversary {
            return Ok(());
        }

        // Verified against the parent's post-state: permissions can't be
        // self-granted by the block under validation.
        self.validate_perm(block.header.coinbase, PERM_MINE, parent_state)?;

        match block.header.signer()? {
            Some(signer) if signer == block.header.coinbase => {}
            _ => return Err(ProtocolError::InvalidSignature),
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
        if self.adversary {
            return Ok(());
        }

        let doug = doug_crypto::gendoug_address();
        let perm = if tx.is_contract_creation() { PERM_CREATE } else { PERM_TRANSACT };
        let sender = tx.sender()?;
        self.validate_perm(sender, perm, state)?;

        if let Some(max) = genesis::maxgastx(doug, state) {
            let gas = U256::from(tx.gas);
            if gas > max {
                return Err(ProtocolError::GasLimitExceeded { gas, max });
            }
        }

        let expected = state.get_nonce(sender);
        if tx.nonce != expected {
            return Err(ProtocolError::NonceMismatch { expected, got: tx.nonce });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::mock::MockState;
    use bytes::Bytes;

    fn genesis_with_miners(miners: Vec<Address>, blocktime: u64, consensus: ConsensusTag) -> GenesisConfig {
        GenesisConfig {
            transactors: miners.clone(),
            miners,
            blocktime,
            consensus,
            difficulty_exponent: 17,
            ..Default::default()
        }
    }

    fn sample_header(number: u64, timestamp: u64, coinbase: Address) -> BlockHeader {
        BlockHeader {
            prev_hash: Default::default(),
            uncle_hash: Default::default(),
            coinbase,
            state_root: Default::default(),
            tx_root: Default::default(),
            difficulty: U256::from(131_072u64),
            number,
            min_gas_price: U256::zero(),
            gas_limit: 3_141_592,
            gas_used: 0,
            timestamp,
            extra: Bytes::new(),
            nonce: 0,
            signature: None,
        }
    }

    #[test]
    fn validate_perm_denies_unlisted_address() {
        let a = Address::repeat_byte(0x01);
        let genesis = genesis_with_miners(vec![a], 15, ConsensusTag::Robin);
        let model = StdLibModel::new(genesis.clone());
        let state = MockState::default();
        genesis.deploy(&state);

        assert!(model.validate_perm(a, "mine", &state).is_ok());
        assert!(matches!(
            model.validate_perm(Address::repeat_byte(0x02), "mine", &state),
            Err(ProtocolError::NoPermission { .. })
        ));
    }

    #[test]
    fn adversary_accepts_everything() {
        let model = StdLibModel::adversary(GenesisConfig::default());
        let state = MockState::default();
        assert!(model.validate_perm(Address::zero(), "mine", &state).is_ok());
        assert!(model.participate(Address::zero(), &sample_header(0, 0, Address::zero()), &state, 0));
    }

    #[test]
    fn robin_participation_favors_the_designated_miner() {
        let a = Address::repeat_byte(0x01);
        let b = Address::repeat_byte(0x02);
        let c = Address::repeat_byte(0x03);
        let genesis = genesis_with_miners(vec![a, b, c], 15, ConsensusTag::Robin);
        let model = StdLibModel::new(genesis.clone());
        let state = MockState::default();
        genesis.deploy(&state);

        // parent.number = 0, so the designated miner for the next block is
        // nth_from_head(1) = b; a is distance 2 away (> n_miners/2 == 1).
        let parent = sample_header(0, 1000, Address::zero());
        assert!(model.participate(b, &parent, &state, 1000));
        assert!(!model.participate(a, &parent, &state, 1000));
        // Enough elapsed time makes everyone eligible.
        assert!(model.participate(a, &parent, &state, 1000 + 100 * 15));
    }

    #[test]
    fn non_robin_consensus_always_participates() {
        let genesis = genesis_with_miners(vec![Address::repeat_byte(0x01)], 15, ConsensusTag::Constant);
        let model = StdLibModel::new(genesis.clone());
        let state = MockState::default();
        genesis.deploy(&state);

        let parent = sample_header(0, 0, Address::zero());
        assert!(model.participate(Address::repeat_byte(0x09), &parent, &state, 0));
    }

    #[test]
    fn validate_tx_enforces_maxgastx_and_nonce() {
        let a = Address::repeat_byte(0x01);
        let genesis = GenesisConfig {
            transactors: vec![a],
            maxgastx: Some(U256::from(21_000u64)),
            difficulty_exponent: 17,
            ..Default::default()
        };
        let model = StdLibModel::new(genesis.clone());
        let state = MockState::default();
        genesis.deploy(&state);

        // Nonce/gas validity depends on a real signed transaction; exercised
        // at the blockchain integration level where senders are recovered
        // from real signatures. Here we only check the permission gate.
        assert!(model.validate_perm(a, PERM_TRANSACT, &state).is_ok());
    }
}
