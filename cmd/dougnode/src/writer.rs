//! The chain writer task (§5): the only place that calls
//! `ChainManager::insert_chain`, so the canonical head and `LastBlock`
//! never race between two concurrent submitters.

use std::sync::Arc;

use doug_blockchain::{ChainManager, Mempool};
use doug_common::Block;
use tokio::sync::mpsc;

use crate::error::is_fatal;

pub async fn run(chain: Arc<ChainManager>, mempool: Mempool, mut candidates: mpsc::Receiver<Block>) {
    while let Some(block) = candidates.recv().await {
        let number = block.header.number;
        let applied = block.transactions.clone();
        match chain.insert_chain(std::slice::from_ref(&block)).await {
            Ok(()) => {
                mempool.remove_applied(&applied);
                tracing::info!(number, head = ?chain.head_hash(), "block committed");
            }
            Err(err) if is_fatal(&err) => {
                tracing::error!(number, %err, "unrecoverable chain error, stopping");
                std::process::exit(1);
            }
            Err(err) => tracing::warn!(number, %err, "candidate block rejected"),
        }
    }
}
