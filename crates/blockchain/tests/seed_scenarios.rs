//! End-to-end chain-manager scenarios, mirroring the fixture shape of
//! `monkchain/chain_manager_test.go`'s `testFork`/`fakePow` harness: build
//! a canonical chain and one or more forks against an in-memory store,
//! feed them through `ChainManager::insert_chain`, and check total
//! difficulty, head, and `get_by_number` afterwards.

use bytes::Bytes;
use doug_blockchain::{block_manager, ChainError, ChainManager, InvalidBlockError, State};
use doug_common::{Block, BlockHeader, Transaction};
use doug_crypto::{sign_message, KeyPair};
use doug_protocol::{GenesisConfig, ProtocolError, StdLibModel, YesModel};
use doug_reactor::Reactor;
use doug_rlp::encode::RLPEncode;
use doug_storage::ChainStore;
use doug_vm::NoopEvm;
use ethereum_types::{Address, H256, U256};
use secp256k1::SecretKey;

fn manager_with(store: ChainStore, protocol: Box<dyn doug_protocol::ProtocolModel>) -> ChainManager {
    ChainManager::new(store, protocol, Box::new(NoopEvm::new()), Reactor::start())
}

fn yes_manager() -> (ChainManager, ChainStore) {
    let store = ChainStore::in_memory();
    let manager = manager_with(store.clone(), Box::new(YesModel::new(GenesisConfig::default())));
    (manager, store)
}

fn genesis(coinbase: Address, difficulty: U256) -> Block {
    let header = BlockHeader {
        prev_hash: H256::zero(),
        uncle_hash: H256::zero(),
        coinbase,
        state_root: doug_trie::empty_root(),
        tx_root: H256::zero(),
        difficulty,
        number: 0,
        min_gas_price: U256::zero(),
        gas_limit: 3_141_592,
        gas_used: 0,
        timestamp: 0,
        extra: Bytes::new(),
        nonce: 0,
        signature: None,
    };
    Block { header, transactions: vec![], uncles: vec![] }
}

/// Builds the child of `parent` with no transactions, stamping the
/// post-reward root the way a block assembler would before a winning
/// nonce is even searched for.
fn child_of(store: &ChainStore, parent: &BlockHeader, coinbase: Address, difficulty: U256) -> Block {
    let state = State::open(store.clone(), parent.state_root);
    block_manager::credit_rewards(&state, coinbase, 0);
    state.update().unwrap();
    state.sync().unwrap();
    let state_root = state.root_hash();

    let header = BlockHeader {
        prev_hash: parent.hash(),
        uncle_hash: H256::zero(),
        coinbase,
        state_root,
        tx_root: H256::zero(),
        difficulty,
        number: parent.number + 1,
        min_gas_price: U256::zero(),
        gas_limit: 3_141_592,
        gas_used: 0,
        timestamp: parent.timestamp + 1,
        extra: Bytes::new(),
        nonce: 0,
        signature: None,
    };
    Block { header, transactions: vec![], uncles: vec![] }
}

fn chain_of(store: &ChainStore, from: &BlockHeader, len: usize, coinbase: Address, difficulty: U256) -> Vec<Block> {
    let mut out = Vec::with_capacity(len);
    let mut parent = from.clone();
    for _ in 0..len {
        let block = child_of(store, &parent, coinbase, difficulty);
        parent = block.header.clone();
        out.push(block);
    }
    out
}

#[tokio::test]
async fn extend_canonical_always_grows_total_difficulty() {
    for fork_len in [1usize, 2, 5, 10] {
        let (manager, store) = yes_manager();
        let coinbase = Address::repeat_byte(0x10);
        let difficulty = U256::from(1024u64);
        let genesis = genesis(coinbase, difficulty);
        manager.commit_genesis(&genesis).unwrap();

        let canonical = chain_of(&store, &genesis.header, 5, coinbase, difficulty);
        manager.insert_chain(&canonical).await.unwrap();
        let td_before = manager.total_difficulty();

        let tip_header = canonical.last().unwrap().header.clone();
        let extension = chain_of(&store, &tip_header, fork_len, coinbase, difficulty);
        let extension_tip = extension.last().unwrap().hash();
        manager.insert_chain(&extension).await.unwrap();

        assert!(manager.total_difficulty() > td_before, "fork_len={fork_len}");
        assert_eq!(manager.head_hash(), Some(extension_tip), "fork_len={fork_len}");
    }
}

#[tokio::test]
async fn a_fork_shorter_than_the_remaining_canonical_tail_is_rejected() {
    for &(fork_point, fork_len) in &[(0usize, 3usize), (1, 7), (5, 4)] {
        let (manager, store) = yes_manager();
        let coinbase = Address::repeat_byte(0x11);
        let difficulty = U256::from(1024u64);
        let genesis = genesis(coinbase, difficulty);
        manager.commit_genesis(&genesis).unwrap();

        let canonical = chain_of(&store, &genesis.header, 10, coinbase, difficulty);
        manager.insert_chain(&canonical).await.unwrap();
        let head_before = manager.head_hash();
        let td_before = manager.total_difficulty();

        let branch_point = if fork_point == 0 { genesis.header.clone() } else { canonical[fork_point - 1].header.clone() };
        let fork = chain_of(&store, &branch_point, fork_len, coinbase, difficulty);

        let result = manager.insert_chain(&fork).await;
        assert!(result.is_err(), "fork_point={fork_point} fork_len={fork_len}");
        assert_eq!(manager.head_hash(), head_before);
        assert_eq!(manager.total_difficulty(), td_before);
    }
}

#[tokio::test]
async fn a_fork_longer_than_the_remaining_canonical_tail_reorgs_the_head() {
    for &(fork_point, fork_len) in &[(0usize, 11usize), (1, 15), (5, 12)] {
        let (manager, store) = yes_manager();
        let coinbase = Address::repeat_byte(0x12);
        let difficulty = U256::from(1024u64);
        let genesis = genesis(coinbase, difficulty);
        manager.commit_genesis(&genesis).unwrap();

        let canonical = chain_of(&store, &genesis.header, 10, coinbase, difficulty);
        manager.insert_chain(&canonical).await.unwrap();
        let td_before = manager.total_difficulty();

        let branch_point = if fork_point == 0 { genesis.header.clone() } else { canonical[fork_point - 1].header.clone() };
        let fork = chain_of(&store, &branch_point, fork_len, coinbase, difficulty);
        let tip = fork.last().unwrap().hash();

        manager.insert_chain(&fork).await.unwrap();

        assert!(manager.total_difficulty() > td_before, "fork_point={fork_point} fork_len={fork_len}");
        assert_eq!(manager.head_hash(), Some(tip));
        assert_eq!(manager.get_by_number(fork[0].header.number).unwrap().map(|b| b.hash()), Some(fork[0].hash()));
    }
}

#[tokio::test]
async fn an_equal_difficulty_fork_keeps_the_existing_canonical_head() {
    let (manager, store) = yes_manager();
    let coinbase = Address::repeat_byte(0x13);
    let difficulty = U256::from(1024u64);
    let genesis = genesis(coinbase, difficulty);
    manager.commit_genesis(&genesis).unwrap();

    let canonical = chain_of(&store, &genesis.header, 10, coinbase, difficulty);
    manager.insert_chain(&canonical).await.unwrap();
    let head_before = manager.head_hash();
    let td_before = manager.total_difficulty();

    // Fork from block 4, exactly as long as the remaining canonical tail:
    // same per-block difficulty means exactly equal total difficulty.
    let fork = chain_of(&store, &canonical[3].header, 6, coinbase, difficulty);

    let result = manager.insert_chain(&fork).await;
    assert!(result.is_err());
    assert_eq!(manager.head_hash(), head_before);
    assert_eq!(manager.total_difficulty(), td_before);
}

#[tokio::test]
async fn a_broken_candidate_chain_is_rejected_and_head_is_unchanged() {
    let (manager, store) = yes_manager();
    let coinbase = Address::repeat_byte(0x14);
    let difficulty = U256::from(1024u64);
    let genesis = genesis(coinbase, difficulty);
    manager.commit_genesis(&genesis).unwrap();

    let canonical = chain_of(&store, &genesis.header, 4, coinbase, difficulty);
    manager.insert_chain(&canonical).await.unwrap();
    let head_before = manager.head_hash();

    let mut fork = chain_of(&store, &canonical[3].header, 5, coinbase, U256::from(2048u64));
    fork.remove(0); // breaks the prev_hash chain at its first link: fork[0]
    // (now what was fork[1]) points at a parent never added to the store.

    let result = manager.insert_chain(&fork).await;
    assert!(result.is_err());
    assert_eq!(manager.head_hash(), head_before);
}

fn signed_tx(keypair: &KeyPair, nonce: u64, recipient: Option<Address>, gas: u64, gas_price: U256, value: U256, data: Bytes) -> Transaction {
    let mut tx = Transaction { nonce, gas_price, gas, recipient, value, data, v: 0, r: U256::zero(), s: U256::zero() };
    let unsigned = Transaction { v: 0, r: U256::zero(), s: U256::zero(), ..tx.clone() };
    let hash = H256::from(doug_crypto::keccak256(&unsigned.encode_to_vec()));
    let sig = sign_message(keypair, &hash.0);
    tx.r = U256::from_big_endian(&sig[0..32]);
    tx.s = U256::from_big_endian(&sig[32..64]);
    tx.v = sig[64] as u64;
    tx
}

/// Signs `header` (minus its own signature field, which `hash()` already
/// ignores) with `keypair`, stamping `header.coinbase` so `signer()`
/// recovers back to it.
fn mine(mut header: BlockHeader, keypair: &KeyPair) -> BlockHeader {
    header.coinbase = keypair.address();
    let sig = sign_message(keypair, &header.hash().0);
    header.signature = Some(sig);
    header
}

#[tokio::test]
async fn genesis_deploy_lets_a_listed_miner_mine_and_rejects_an_unlisted_transactor() {
    let miner_a = KeyPair::from_secret(SecretKey::from_slice(&[0x20; 32]).unwrap());
    let miner_b = KeyPair::from_secret(SecretKey::from_slice(&[0x21; 32]).unwrap());
    let outsider_c = KeyPair::from_secret(SecretKey::from_slice(&[0x22; 32]).unwrap());

    let config = GenesisConfig {
        accounts: vec![(outsider_c.address(), U256::from(1_000_000u64))],
        miners: vec![miner_a.address(), miner_b.address()],
        transactors: vec![miner_a.address(), miner_b.address()],
        creators: vec![],
        maxgastx: None,
        blocktime: 15,
        consensus: doug_protocol::ConsensusTag::Constant,
        difficulty_exponent: 0, // base_difficulty == 1: any nonce verifies.
    };

    let store = ChainStore::in_memory();
    let genesis_state = State::new(store.clone());
    config.deploy(&genesis_state);
    genesis_state.update().unwrap();
    genesis_state.sync().unwrap();
    let genesis_root = genesis_state.root_hash();

    let mut genesis_block = genesis(Address::zero(), U256::zero());
    genesis_block.header.state_root = genesis_root;

    let manager = manager_with(store.clone(), Box::new(StdLibModel::new(config)));
    manager.commit_genesis(&genesis_block).unwrap();

    // A is a listed miner: a block it mines on top of genesis is accepted.
    let state = State::open(store.clone(), genesis_root);
    block_manager::credit_rewards(&state, miner_a.address(), 0);
    state.update().unwrap();
    state.sync().unwrap();
    let header = BlockHeader {
        prev_hash: genesis_block.hash(),
        uncle_hash: H256::zero(),
        coinbase: miner_a.address(),
        state_root: state.root_hash(),
        tx_root: H256::zero(),
        difficulty: U256::one(),
        number: 1,
        min_gas_price: U256::zero(),
        gas_limit: 3_141_592,
        gas_used: 0,
        timestamp: 1,
        extra: Bytes::new(),
        nonce: 0,
        signature: None,
    };
    let mined = mine(header, &miner_a);
    let block1 = Block { header: mined, transactions: vec![], uncles: vec![] };

    manager.insert_chain(&[block1.clone()]).await.unwrap();
    assert_eq!(manager.head_hash(), Some(block1.hash()));

    // C is not a listed transactor: a block carrying C's transaction is
    // rejected with NoPermission even though A (a legitimate miner) mined it.
    let tx = signed_tx(&outsider_c, 0, Some(Address::repeat_byte(0x99)), 50_000, U256::one(), U256::from(10u64), Bytes::new());
    let mut reject_header = BlockHeader {
        prev_hash: block1.hash(),
        uncle_hash: H256::zero(),
        coinbase: miner_a.address(),
        state_root: block1.header.state_root, // never reached: rejected before apply_block
        tx_root: H256::zero(),
        difficulty: U256::one(),
        number: 2,
        min_gas_price: U256::zero(),
        gas_limit: 3_141_592,
        gas_used: 0,
        timestamp: 2,
        extra: Bytes::new(),
        nonce: 0,
        signature: None,
    };
    reject_header = mine(reject_header, &miner_a);
    let reject_block = Block { header: reject_header, transactions: vec![tx], uncles: vec![] };

    let result = manager.insert_chain(&[reject_block]).await;
    assert!(matches!(
        result,
        Err(ChainError::InvalidBlock(InvalidBlockError::Protocol(ProtocolError::NoPermission { role, .. }))) if role == "transact"
    ));
    assert_eq!(manager.head_hash(), Some(block1.hash()));
}
