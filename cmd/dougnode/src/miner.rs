//! The miner task (§5): repeatedly checks `protocol.participate`, draws
//! pending transactions from the mempool, assembles a candidate on top of
//! the current head, searches for a winning nonce, and hands the result
//! to the chain writer over a channel.
//!
//! The nonce search is cancellable: a `newBlock` event observed mid-search
//! means the head moved out from under this candidate, so the attempt is
//! abandoned and the loop rebuilds on the new parent.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use doug_blockchain::{block_manager, ChainError, ChainManager, Mempool, State};
use doug_common::{Block, BlockHeader, Transaction};
use doug_crypto::{sign_message, KeyPair};
use doug_protocol::{pow, ProtocolModel};
use doug_reactor::{Event, Reactor};
use doug_storage::ChainStore;
use doug_vm::{BlockContext, Evm};
use ethereum_types::{Address, H256};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Fixed for this single-node binary; a real deployment would size it
/// from a chain-config scalar the way `maxgastx` already is.
const GAS_LIMIT: u64 = 8_000_000;
const IDLE_POLL: Duration = Duration::from_millis(200);
const YIELD_EVERY: u64 = 4096;

fn now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock before epoch").as_secs()
}

/// Runs until `blocks_target` candidates have been submitted (`0` means
/// indefinitely) or `shutdown` fires.
#[allow(clippy::too_many_arguments)]
pub async fn run(
    chain: Arc<ChainManager>,
    store: ChainStore,
    protocol: Arc<dyn ProtocolModel>,
    evm: Arc<dyn Evm>,
    mempool: Mempool,
    keypair: Arc<KeyPair>,
    blocks_target: u64,
    submit: mpsc::Sender<Block>,
    reactor: Reactor,
    shutdown: CancellationToken,
) {
    let (new_head_tx, mut new_head_rx) = mpsc::channel(8);
    let subscription = match reactor.subscribe("newBlock", new_head_tx).await {
        Ok(id) => Some(id),
        Err(err) => {
            tracing::error!(%err, "reactor unavailable, mining without new-head cancellation");
            None
        }
    };

    let mut mined = 0u64;
    let coinbase = keypair.address();

    while !shutdown.is_cancelled() {
        if blocks_target != 0 && mined >= blocks_target {
            break;
        }

        // Drain notifications queued since the last round; they only
        // matter below as a cancellation signal for the active search.
        while new_head_rx.try_recv().is_ok() {}

        let Some(parent) = chain.head_hash().and_then(|hash| chain.get_block(hash).ok().flatten()) else {
            tracing::warn!("no canonical head yet, miner idling");
            tokio::time::sleep(IDLE_POLL).await;
            continue;
        };

        let parent_state = State::open(store.clone(), parent.header.state_root);
        if !protocol.participate(coinbase, &parent.header, &parent_state, now()) {
            tokio::time::sleep(IDLE_POLL).await;
            continue;
        }

        let mut header = assemble_stub(&parent.header, coinbase);
        header.difficulty = protocol.difficulty(&header, &parent.header, &parent_state);

        let (state_root, applied) =
            match assemble_state_root(&store, &parent.header, &header, &mempool, evm.as_ref(), coinbase) {
                Ok(result) => result,
                Err(err) if crate::error::is_fatal(&err) => {
                    tracing::error!(%err, "unrecoverable chain error, stopping");
                    std::process::exit(1);
                }
                Err(err) => {
                    tracing::warn!(%err, "failed to assemble candidate block, retrying");
                    tokio::time::sleep(IDLE_POLL).await;
                    continue;
                }
            };
        header.state_root = state_root;

        let Some(mut header) = search_nonce(header, &mut new_head_rx, &shutdown).await else {
            continue;
        };
        header.signature = Some(sign_message(&keypair, &header.hash().0));

        let block = Block { header, transactions: applied, uncles: vec![] };
        if submit.send(block).await.is_err() {
            tracing::info!("chain writer channel closed, miner stopping");
            break;
        }
        mined += 1;
    }

    if let Some(id) = subscription {
        let _ = reactor.unsubscribe("newBlock", id).await;
    }
}

/// A header with every field independent of the executed transactions
/// filled in: identity fields, the timestamp, and the coinbase.
fn assemble_stub(parent: &BlockHeader, coinbase: Address) -> BlockHeader {
    BlockHeader {
        prev_hash: parent.hash(),
        uncle_hash: H256::zero(),
        coinbase,
        state_root: H256::zero(),
        tx_root: H256::zero(),
        difficulty: parent.difficulty,
        number: parent.number + 1,
        min_gas_price: ethereum_types::U256::zero(),
        gas_limit: GAS_LIMIT,
        gas_used: 0,
        timestamp: now().max(parent.timestamp + 1),
        extra: Bytes::new(),
        nonce: 0,
        signature: None,
    }
}

/// Runs every transaction the mempool currently has pending against a
/// scratch state opened on the parent's root, credits the block reward,
/// and returns the resulting root plus the subset that actually applied.
/// A transaction that fails its nonce/balance check is simply left out of
/// this candidate; it stays pooled for a later round.
fn assemble_state_root(
    store: &ChainStore,
    parent: &BlockHeader,
    header: &BlockHeader,
    mempool: &Mempool,
    evm: &dyn Evm,
    coinbase: Address,
) -> Result<(H256, Vec<Transaction>), ChainError> {
    let scratch = State::open(store.clone(), parent.state_root);
    let block_ctx = BlockContext::from(header);
    let mut applied = Vec::new();

    for txs in mempool.pending_by_sender().into_values() {
        for tx in txs {
            if block_manager::apply_transaction(&tx, &scratch, evm, block_ctx).is_ok() {
                applied.push(tx);
            }
        }
    }

    block_manager::credit_rewards(&scratch, coinbase, 0);
    scratch.update()?;
    Ok((scratch.root_hash(), applied))
}

/// Tries nonces starting from a random point until one verifies, the
/// shutdown token fires, or a `newBlock` event (this node's head moved,
/// most likely from a reorg) makes the candidate stale.
async fn search_nonce(
    mut header: BlockHeader,
    new_head_rx: &mut mpsc::Receiver<Event>,
    shutdown: &CancellationToken,
) -> Option<BlockHeader> {
    let mut nonce: u64 = rand::random();
    let mut checked = 0u64;
    loop {
        if shutdown.is_cancelled() || new_head_rx.try_recv().is_ok() {
            return None;
        }
        header.nonce = nonce;
        if pow::verify_pow(&header) {
            return Some(header);
        }
        nonce = nonce.wrapping_add(1);
        checked += 1;
        if checked % YIELD_EVERY == 0 {
            tokio::task::yield_now().await;
        }
    }
}
