mod eth;
mod no;
mod stdlib;
mod vm;
mod yes;

pub use eth::EthModel;
pub use no::NoModel;
pub use stdlib::StdLibModel;
pub use vm::VmModel;
pub use yes::YesModel;
