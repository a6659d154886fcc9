use doug_common::{Block, BlockHeader, Transaction};
use ethereum_types::{Address, U256};

use crate::{
    error::ProtocolError,
    genesis::GenesisConfig,
    state::{StateView, StateWriter},
};

/// The capability set every model variant implements (§4.4): `deploy`,
/// `participate`, `difficulty`, `validate_perm`, `validate_block`,
/// `validate_tx`. One trait, tagged dispatch via `enum` or `Box<dyn
/// ProtocolModel>` at call sites — never a class hierarchy.
pub trait ProtocolModel: Send + Sync {
    fn deploy(&self, genesis: &GenesisConfig, state: &dyn StateWriter);

    /// Whether `coinbase` should attempt to mine the next block on top of
    /// `parent`, observing `parent`'s post-state.
    fn participate(&self, coinbase: Address, parent: &BlockHeader, parent_state: &dyn StateView, now: u64) -> bool;

    fn difficulty(&self, header: &BlockHeader, parent: &BlockHeader, parent_state: &dyn StateView) -> U256;

    fn validate_perm(&self, addr: Address, role: &str, state: &dyn StateView) -> Result<(), ProtocolError>;

    /// Validates `block` against `parent`'s post-state — never the
    /// candidate block's own state, so permissions can't be self-granted
    /// by the block under validation.
    fn validate_block(
        &self,
        block: &Block,
        parent: &BlockHeader,
        parent_state: &dyn StateView,
        now: u64,
    ) -> Result<(), ProtocolError>;

    fn validate_tx(&self, tx: &Transaction, state: &dyn StateView) -> Result<(), ProtocolError>;
}
