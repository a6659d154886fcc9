use clap::{Parser, Subcommand, ValueEnum};

pub const VERSION_STRING: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "dougnode", version = VERSION_STRING, about = "Permissioned account-based chain core node")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Deploys a genesis block against a fresh in-memory store and starts
    /// mining on top of it.
    Run(RunArgs),
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum ModelKind {
    Yes,
    No,
    Eth,
    StdLib,
}

#[derive(Parser)]
pub struct RunArgs {
    /// Which protocol/consensus model governs this chain.
    #[arg(long, value_enum, default_value_t = ModelKind::Eth)]
    pub model: ModelKind,

    /// 32-byte secp256k1 secret key (hex, "0x" prefix optional) this node
    /// mines and signs blocks with.
    #[arg(long, value_name = "HEX")]
    pub coinbase_key: String,

    /// Accounts funded at genesis, `address:balance` pairs.
    #[arg(long, value_delimiter = ',', value_name = "ADDR:BALANCE")]
    pub fund: Vec<String>,

    /// Addresses granted the `mine` permission at genesis (`StdLib` only).
    /// The coinbase address is always included automatically.
    #[arg(long, value_delimiter = ',', value_name = "ADDR")]
    pub miners: Vec<String>,

    /// Addresses granted the `transact`/`create` permissions at genesis
    /// (`StdLib` only). The coinbase address is always included.
    #[arg(long, value_delimiter = ',', value_name = "ADDR")]
    pub transactors: Vec<String>,

    /// Target seconds between blocks, used by the `eth`/`stdlib` difficulty
    /// retarget and the `StdLib` round-robin participation window.
    #[arg(long, default_value_t = 15)]
    pub blocktime: u64,

    /// `2^exponent` is the starting/constant difficulty.
    #[arg(long, default_value_t = 14)]
    pub difficulty_exponent: u64,

    /// Exit after mining this many blocks. `0` mines until interrupted.
    #[arg(long, default_value_t = 0)]
    pub blocks: u64,
}
