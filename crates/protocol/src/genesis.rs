//! The genesis deployment contract (`GenesisConfig`), shared by every model
//! variant's `deploy`. Per `spec.md` §1/§3, genesis deployment never runs
//! through the EVM here — it seeds initial balances and, for permissioned
//! models, the GenDoug permission/consensus layout directly into storage.

use doug_common::BlockHeader;
use ethereum_types::{Address, U256};

use crate::{gendoug, state::StateWriter};

pub const PERM_MINE: &str = "mine";
pub const PERM_TRANSACT: &str = "transact";
pub const PERM_CREATE: &str = "create";

const SCALAR_MAXGASTX: &str = "maxgastx";
const SCALAR_BLOCKTIME: &str = "blocktime";
const SCALAR_DIFFICULTY: &str = "difficulty";
const SCALAR_CONSENSUS: &str = "consensus";

const BASE_DIFFICULTY_EXPONENT: u64 = 17;
const MIN_DIFFICULTY: u64 = 131_072;

/// The `"consensus"` scalar tag (§6): `"robin" | "stake-weight" |
/// "constant" | default`. Stored as a small discriminant rather than an
/// ASCII string, since GenDoug storage here is never read by real
/// bytecode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConsensusTag {
    #[default]
    Default,
    Robin,
    StakeWeight,
    Constant,
}

impl ConsensusTag {
    fn discriminant(self) -> u64 {
        match self {
            ConsensusTag::Default => 0,
            ConsensusTag::Robin => 1,
            ConsensusTag::StakeWeight => 2,
            ConsensusTag::Constant => 3,
        }
    }

    fn from_discriminant(d: u64) -> Self {
        match d {
            1 => ConsensusTag::Robin,
            2 => ConsensusTag::StakeWeight,
            3 => ConsensusTag::Constant,
            _ => ConsensusTag::Default,
        }
    }

    pub fn read(doug: Address, state: &dyn crate::state::StateView) -> Self {
        gendoug::get_scalar(doug, SCALAR_CONSENSUS, state)
            .map(|v| Self::from_discriminant(v.as_u64()))
            .unwrap_or_default()
    }
}

/// The deployment contract consumed at first-block construction: initial
/// account balances, and — for `StdLib`/`Vm` — the GenDoug permission
/// contract's name list, miner ring, and scalar configuration.
#[derive(Debug, Clone, Default)]
pub struct GenesisConfig {
    pub accounts: Vec<(Address, U256)>,
    pub miners: Vec<Address>,
    pub transactors: Vec<Address>,
    pub creators: Vec<Address>,
    pub maxgastx: Option<U256>,
    pub blocktime: u64,
    pub consensus: ConsensusTag,
    pub difficulty_exponent: u64,
}

impl GenesisConfig {
    /// Seeds balances and, unconditionally, the GenDoug layout — `Yes`/`No`
    /// deploy it too so a `StdLib` chain can later be re-validated against
    /// the same genesis state even under a permissive model.
    pub fn deploy(&self, state: &dyn StateWriter) {
        for &(addr, balance) in &self.accounts {
            state.set_balance(addr, balance);
        }

        let doug = doug_crypto::gendoug_address();
        gendoug::register_permission(doug, PERM_MINE, state);
        gendoug::register_permission(doug, PERM_TRANSACT, state);
        gendoug::register_permission(doug, PERM_CREATE, state);

        for &miner in &self.miners {
            gendoug::set_permission(doug, miner, PERM_MINE, true, state);
            gendoug::push_miner(doug, miner, state);
        }
        for &addr in &self.transactors {
            gendoug::set_permission(doug, addr, PERM_TRANSACT, true, state);
        }
        for &addr in &self.creators {
            gendoug::set_permission(doug, addr, PERM_CREATE, true, state);
        }

        if let Some(max) = self.maxgastx {
            gendoug::set_scalar(doug, SCALAR_MAXGASTX, max, state);
        }
        gendoug::set_scalar(doug, SCALAR_BLOCKTIME, U256::from(self.blocktime), state);
        gendoug::set_scalar(doug, SCALAR_DIFFICULTY, U256::from(self.difficulty_exponent), state);
        gendoug::set_scalar(doug, SCALAR_CONSENSUS, U256::from(self.consensus.discriminant()), state);
    }
}

pub fn base_difficulty(doug: Address, state: &dyn crate::state::StateView) -> U256 {
    let exponent =
        gendoug::get_scalar(doug, SCALAR_DIFFICULTY, state).map(|v| v.as_u64()).unwrap_or(BASE_DIFFICULTY_EXPONENT);
    U256::one() << exponent
}

pub fn blocktime(doug: Address, state: &dyn crate::state::StateView) -> u64 {
    gendoug::get_scalar(doug, SCALAR_BLOCKTIME, state).map(|v| v.as_u64()).unwrap_or(1)
}

pub fn maxgastx(doug: Address, state: &dyn crate::state::StateView) -> Option<U256> {
    gendoug::get_scalar(doug, SCALAR_MAXGASTX, state)
}

/// Classical retarget: difficulty rises when blocks come in faster than
/// half the target interval, falls otherwise, floored so a chain can never
/// grind to triviality.
pub fn eth_difficulty(blocktime: u64, header: &BlockHeader, parent: &BlockHeader) -> U256 {
    let adjust = parent.difficulty / U256::from(2048u64);
    let elapsed = header.timestamp.saturating_sub(parent.timestamp);
    let next =
        if elapsed < blocktime / 2 { parent.difficulty + adjust } else { parent.difficulty.saturating_sub(adjust) };
    next.max(U256::from(MIN_DIFFICULTY))
}

/// Round-robin and stake-weighted consensus reward timely/staked
/// participation rather than competitive search, so difficulty stays at
/// the configured constant instead of auto-adjusting.
pub fn round_robin_difficulty(doug: Address, state: &dyn crate::state::StateView) -> U256 {
    base_difficulty(doug, state)
}

pub fn stake_difficulty(doug: Address, state: &dyn crate::state::StateView) -> U256 {
    base_difficulty(doug, state)
}
