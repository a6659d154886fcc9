//! Owns the canonical chain (§4.5): persistence, fork-choice by total
//! difficulty, and the reorg algorithm that walks to a common ancestor,
//! re-applies a winning candidate, and rolls back cleanly on failure.

use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use doug_common::{Block, BlockInfo};
use doug_protocol::ProtocolModel;
use doug_reactor::Reactor;
use doug_storage::ChainStore;
use doug_vm::Evm;
use ethereum_types::{H256, U256};

use crate::{
    block_manager,
    error::{ChainError, InvalidBlockError},
    state::State,
};

fn now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock before epoch").as_secs()
}

/// The chain core's top-level handle: persistent storage, the pluggable
/// protocol model, an EVM collaborator, and the reactor candidate blocks
/// are announced on. `head` tracks the canonical tip in memory so readers
/// don't have to round-trip the store for every query.
pub struct ChainManager {
    store: ChainStore,
    protocol: Box<dyn ProtocolModel>,
    evm: Box<dyn Evm>,
    reactor: Reactor,
    head: Mutex<Option<H256>>,
}

impl ChainManager {
    pub fn new(store: ChainStore, protocol: Box<dyn ProtocolModel>, evm: Box<dyn Evm>, reactor: Reactor) -> Self {
        let head = store.get_last_block().ok().flatten().map(|b| b.hash());
        Self { store, protocol, evm, reactor, head: Mutex::new(head) }
    }

    pub fn head_hash(&self) -> Option<H256> {
        *self.head.lock().unwrap_or_else(|poison| poison.into_inner())
    }

    pub fn total_difficulty(&self) -> U256 {
        self.store.get_total_difficulty().ok().flatten().unwrap_or_default()
    }

    /// Commits the genesis block directly: no parent to validate against,
    /// no reorg possible. The caller is responsible for having run
    /// `GenesisConfig::deploy` against a fresh `State` and stamped its
    /// root onto `genesis.header.state_root` before calling this.
    pub fn commit_genesis(&self, genesis: &Block) -> Result<(), ChainError> {
        self.add(genesis)
    }

    /// Persists `block` and its `BlockInfo` sidecar unconditionally;
    /// advances the in-memory head and the `LastBlock`/`LTD`/canonical-
    /// number store records only when `block` extends the current head
    /// (or there is no head yet).
    fn add(&self, block: &Block) -> Result<(), ChainError> {
        let hash = block.hash();
        let parent_td = if block.header.number == 0 {
            U256::zero()
        } else {
            self.store
                .get_block_info(block.header.prev_hash)?
                .map(|info| info.total_difficulty)
                .ok_or(InvalidBlockError::ParentNotFound(block.header.prev_hash))?
        };
        let uncle_td = block.uncles.iter().fold(U256::zero(), |acc, uncle| acc + uncle.difficulty);
        let total_difficulty = parent_td + block.header.difficulty + uncle_td;

        self.store.put_block(block)?;
        self.store.put_block_info(&BlockInfo {
            number: block.header.number,
            hash,
            parent: block.header.prev_hash,
            total_difficulty,
        })?;

        let extends_head = match self.head_hash() {
            None => true,
            Some(current) => block.header.prev_hash == current,
        };
        if extends_head {
            self.store.set_last_block(block)?;
            self.store.set_total_difficulty(total_difficulty)?;
            *self.head.lock().unwrap_or_else(|poison| poison.into_inner()) = Some(hash);
        }
        Ok(())
    }

    pub fn get_block(&self, hash: H256) -> Result<Option<Block>, ChainError> {
        Ok(self.store.get_block(hash)?)
    }

    /// Derived by walking `prev_hash` back from the current head rather
    /// than trusting a separately maintained by-number index, matching
    /// `monkchain.ChainManager.GetBlockByNumber`: an index updated only on
    /// the extending path can outlive the chain it was built from once a
    /// reorg to a shorter, higher-difficulty fork orphans the numbers above
    /// the new head, and would otherwise hand back a stale block.
    pub fn get_by_number(&self, number: u64) -> Result<Option<Block>, ChainError> {
        let Some(head) = self.head_hash() else { return Ok(None) };
        let Some(head_block) = self.get_block(head)? else { return Ok(None) };
        if number > head_block.header.number {
            return Ok(None);
        }
        self.get_back(head, head_block.header.number - number)
    }

    /// Walks `prev_hash` `n` times back from `hash`.
    pub fn get_back(&self, hash: H256, n: u64) -> Result<Option<Block>, ChainError> {
        let mut current = self.get_block(hash)?;
        for _ in 0..n {
            current = match current {
                Some(block) => self.get_block(block.header.prev_hash)?,
                None => return Ok(None),
            };
        }
        Ok(current)
    }

    /// Dry-run validation: replays `candidates` against a scratch `State`
    /// opened on their shared parent's root without persisting anything,
    /// and returns the resulting total difficulty. Never mutates the
    /// store; a caller that wants the result committed calls
    /// [`Self::insert_chain`] next.
    pub fn test_chain(&self, candidates: &[Block]) -> Result<U256, ChainError> {
        if candidates.is_empty() {
            return Ok(self.total_difficulty());
        }

        let first = &candidates[0];
        let ancestor_block = self
            .store
            .get_block(first.header.prev_hash)?
            .ok_or(InvalidBlockError::ParentNotFound(first.header.prev_hash))?;
        let ancestor_info = self
            .store
            .get_block_info(first.header.prev_hash)?
            .ok_or(InvalidBlockError::ParentNotFound(first.header.prev_hash))?;

        let mut parent_header = ancestor_block.header;
        let mut td = ancestor_info.total_difficulty;
        let state = State::open(self.store.clone(), parent_header.state_root);

        for candidate in candidates {
            if candidate.header.prev_hash != parent_header.hash() {
                return Err(ChainError::BrokenChain(candidate.hash()));
            }

            let when = now();
            self.protocol
                .validate_block(candidate, &parent_header, &state, when)
                .map_err(InvalidBlockError::Protocol)?;
            for tx in &candidate.transactions {
                self.protocol.validate_tx(tx, &state).map_err(InvalidBlockError::Protocol)?;
            }

            block_manager::apply_block(candidate, &state, self.evm.as_ref())?;

            let uncle_td = candidate.uncles.iter().fold(U256::zero(), |acc, uncle| acc + uncle.difficulty);
            td += candidate.header.difficulty + uncle_td;
            parent_header = candidate.header.clone();
        }

        if td <= self.total_difficulty() {
            return Err(ChainError::LowerTotalDifficulty);
        }
        Ok(td)
    }

    /// Commits `candidates` after a successful [`Self::test_chain`]:
    /// unwinds the current head to the chain's common ancestor, re-runs
    /// Block Manager over each candidate in order, `add`s it, and posts a
    /// `newBlock` event — reverting to the pre-reorg head on any failure.
    pub async fn insert_chain(&self, candidates: &[Block]) -> Result<(), ChainError> {
        if candidates.is_empty() {
            return Ok(());
        }

        self.test_chain(candidates)?;

        let pre_reorg_head = self.head_hash();
        let ancestor_hash = candidates[0].header.prev_hash;

        if let Some(current) = pre_reorg_head {
            if current != ancestor_hash {
                let mut cursor = current;
                loop {
                    let block = self
                        .get_block(cursor)?
                        .ok_or_else(|| ChainError::Fatal(format!("canonical block {cursor:#x} missing from store")))?;
                    if block.header.number == 0 {
                        return Err(ChainError::Fatal(
                            "candidate chain shares no common ancestor with the canonical chain".to_string(),
                        ));
                    }
                    cursor = block.header.prev_hash;
                    if cursor == ancestor_hash {
                        break;
                    }
                }
            }
        }

        let ancestor_block =
            self.get_block(ancestor_hash)?.ok_or(InvalidBlockError::ParentNotFound(ancestor_hash))?;
        let ancestor_info = self
            .store
            .get_block_info(ancestor_hash)?
            .ok_or(InvalidBlockError::ParentNotFound(ancestor_hash))?;

        self.store.set_last_block(&ancestor_block)?;
        self.store.set_total_difficulty(ancestor_info.total_difficulty)?;
        *self.head.lock().unwrap_or_else(|poison| poison.into_inner()) = Some(ancestor_hash);

        // Re-run Block Manager for real this time, syncing each block's
        // trie nodes to the store before `add` so a later reader opening
        // a fresh `State` on this root finds them.
        let state = State::open(self.store.clone(), ancestor_block.header.state_root);
        for block in candidates {
            if let Err(err) = self.apply_and_commit(block, &state) {
                self.rollback_to(pre_reorg_head)?;
                return Err(err);
            }
            let payload: doug_reactor::Payload = Arc::new(block.clone());
            let _ = self.reactor.post("newBlock", payload).await;
        }

        Ok(())
    }

    fn apply_and_commit(&self, block: &Block, state: &State) -> Result<(), ChainError> {
        block_manager::apply_block(block, state, self.evm.as_ref())?;
        state.sync()?;
        self.add(block)
    }

    fn rollback_to(&self, head: Option<H256>) -> Result<(), ChainError> {
        match head {
            Some(hash) => {
                let block = self.get_block(hash)?.ok_or_else(|| ChainError::Fatal(format!("pre-reorg head {hash:#x} missing from store")))?;
                let info = self
                    .store
                    .get_block_info(hash)?
                    .ok_or_else(|| ChainError::Fatal(format!("pre-reorg head {hash:#x} missing BlockInfo")))?;
                self.store.set_last_block(&block)?;
                self.store.set_total_difficulty(info.total_difficulty)?;
            }
            None => {}
        }
        *self.head.lock().unwrap_or_else(|poison| poison.into_inner()) = head;
        Ok(())
    }
}
