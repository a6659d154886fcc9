//! The pluggable permission/consensus model (§4.4): one capability set —
//! `deploy`, `participate`, `difficulty`, `validate_perm`, `validate_block`,
//! `validate_tx` — behind the [`ProtocolModel`] trait, with five variants
//! (`Yes`, `No`, `Eth`, `StdLib`, `Vm`) and the GenDoug storage-layout
//! helpers the permissioned variants read and write.

pub mod error;
pub mod gendoug;
pub mod genesis;
pub mod model;
pub mod models;
pub mod pow;
pub mod state;

pub use error::ProtocolError;
pub use genesis::{ConsensusTag, GenesisConfig};
pub use model::ProtocolModel;
pub use models::{EthModel, NoModel, StdLibModel, VmModel, YesModel};
pub use state::{StateView, StateWriter};
