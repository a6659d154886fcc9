//! Wires together a `ChainManager`, the selected `ProtocolModel`, an
//! in-memory `ChainStore`, and the miner/chain-writer task pair (§5),
//! deploys genesis, then drives the node until `--blocks` candidates have
//! been mined or the process is interrupted.

use std::sync::Arc;

use bytes::Bytes;
use doug_blockchain::{ChainManager, Mempool, State};
use doug_common::{Block, BlockHeader};
use doug_crypto::KeyPair;
use doug_protocol::{ConsensusTag, EthModel, GenesisConfig, NoModel, ProtocolModel, StdLibModel, YesModel};
use doug_reactor::Reactor;
use doug_storage::ChainStore;
use doug_vm::{Evm, NoopEvm};
use ethereum_types::{Address, H256, U256};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::{
    addr,
    cli::{ModelKind, RunArgs},
    error::NodeError,
    miner, writer,
};

const CANDIDATE_BUFFER: usize = 4;
const GAS_LIMIT: u64 = 8_000_000;

pub async fn run(args: RunArgs) -> Result<(), NodeError> {
    let secret = addr::parse_secret_key(&args.coinbase_key)?;
    let keypair = Arc::new(KeyPair::from_secret(secret));
    let coinbase = keypair.address();

    let mut accounts = Vec::new();
    for raw in &args.fund {
        accounts.push(addr::parse_account(raw)?);
    }
    let mut miners = vec![coinbase];
    for raw in &args.miners {
        miners.push(addr::parse_address(raw)?);
    }
    let mut transactors = vec![coinbase];
    for raw in &args.transactors {
        transactors.push(addr::parse_address(raw)?);
    }

    // `Eth` retargets difficulty off block timing; every permissioned
    // variant uses the fixed-by-exponent constant so `--blocks` runs
    // finish in bounded time without a real round-robin driver.
    let consensus = match args.model {
        ModelKind::Eth => ConsensusTag::Default,
        ModelKind::Yes | ModelKind::No | ModelKind::StdLib => ConsensusTag::Constant,
    };

    let genesis_config = GenesisConfig {
        accounts,
        miners,
        transactors,
        creators: vec![],
        maxgastx: None,
        blocktime: args.blocktime,
        consensus,
        difficulty_exponent: args.difficulty_exponent,
    };

    let store = ChainStore::in_memory();
    let reactor = Reactor::start();

    let genesis_protocol = build_protocol(args.model, genesis_config.clone());
    let genesis_state = State::new(store.clone());
    genesis_protocol.deploy(&genesis_config, &genesis_state);
    genesis_state.update()?;
    genesis_state.sync()?;
    let genesis_root = genesis_state.root_hash();

    let mut genesis_block = genesis_block(coinbase, genesis_config.difficulty_exponent);
    genesis_block.header.state_root = genesis_root;

    let chain_protocol = build_protocol(args.model, genesis_config.clone());
    let chain = Arc::new(ChainManager::new(store.clone(), chain_protocol, Box::new(NoopEvm::new()), reactor.clone()));
    chain.commit_genesis(&genesis_block)?;

    let miner_protocol: Arc<dyn ProtocolModel> = Arc::from(build_protocol(args.model, genesis_config));
    let evm: Arc<dyn Evm> = Arc::new(NoopEvm::new());
    let mempool = Mempool::new();

    let shutdown = CancellationToken::new();
    let ctrl_c_shutdown = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted, shutting down");
            ctrl_c_shutdown.cancel();
        }
    });

    let (submit_tx, submit_rx) = mpsc::channel(CANDIDATE_BUFFER);
    let writer_handle = tokio::spawn(writer::run(chain.clone(), mempool.clone(), submit_rx));
    let miner_handle = tokio::spawn(miner::run(
        chain,
        store,
        miner_protocol,
        evm,
        mempool,
        keypair,
        args.blocks,
        submit_tx,
        reactor,
        shutdown,
    ));

    if let Err(err) = miner_handle.await {
        tracing::error!(%err, "miner task panicked");
    }
    // Dropping the miner's `submit` sender (above) unblocks the writer's
    // `recv` once it's drained whatever was already queued.
    if let Err(err) = writer_handle.await {
        tracing::error!(%err, "chain writer task panicked");
    }

    Ok(())
}

fn build_protocol(kind: ModelKind, genesis_config: GenesisConfig) -> Box<dyn ProtocolModel> {
    match kind {
        ModelKind::Yes => Box::new(YesModel::new(genesis_config)),
        ModelKind::No => Box::new(NoModel::new(genesis_config)),
        ModelKind::Eth => Box::new(EthModel::new(genesis_config)),
        ModelKind::StdLib => Box::new(StdLibModel::new(genesis_config)),
    }
}

fn genesis_block(coinbase: Address, difficulty_exponent: u64) -> Block {
    let header = BlockHeader {
        prev_hash: H256::zero(),
        uncle_hash: H256::zero(),
        coinbase,
        state_root: H256::zero(),
        tx_root: H256::zero(),
        difficulty: U256::one() << difficulty_exponent,
        number: 0,
        min_gas_price: U256::zero(),
        gas_limit: GAS_LIMIT,
        gas_used: 0,
        timestamp: 0,
        extra: Bytes::new(),
        nonce: 0,
        signature: None,
    };
    Block { header, transactions: vec![], uncles: vec![] }
}
