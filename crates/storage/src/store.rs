use std::sync::Arc;

use bytes::Bytes;
use doug_common::{Block, BlockInfo};
use doug_rlp::{decode::RLPDecode, encode::RLPEncode};
use ethereum_types::{H256, U256};

use crate::{
    engine::{InMemoryEngine, KvEngine, Table},
    error::StoreError,
    trie_db::EngineTrieDB,
};

const LAST_BLOCK_KEY: &[u8] = b"LastBlock";
const TOTAL_DIFFICULTY_KEY: &[u8] = b"LTD";

/// Facade over a [`KvEngine`] implementing the node's persistent key
/// schema (§6): blocks and their `BlockInfo` sidecars keyed by hash,
/// contract code keyed by its own hash, and the two head pointers,
/// `LastBlock` and `LTD`.
#[derive(Clone)]
pub struct ChainStore {
    engine: Arc<dyn KvEngine>,
}

impl ChainStore {
    pub fn new(engine: Arc<dyn KvEngine>) -> Self {
        Self { engine }
    }

    pub fn in_memory() -> Self {
        Self::new(InMemoryEngine::new())
    }

    /// A `doug_trie::TrieDB` backed by the same engine, for the state and
    /// storage tries to commit their nodes into.
    pub fn trie_db(&self) -> Arc<EngineTrieDB> {
        EngineTrieDB::new(self.engine.clone())
    }

    pub fn put_block(&self, block: &Block) -> Result<(), StoreError> {
        let hash = block.hash();
        self.engine.put(Table::Blocks, hash.as_bytes().to_vec(), block.encode_to_vec())?;
        Ok(())
    }

    pub fn get_block(&self, hash: H256) -> Result<Option<Block>, StoreError> {
        match self.engine.get(Table::Blocks, hash.as_bytes())? {
            Some(bytes) => Ok(Some(Block::decode(&bytes).map_err(|e| {
                StoreError::Corrupt(format!("block {hash:#x} failed to decode: {e}"))
            })?)),
            None => Ok(None),
        }
    }

    pub fn put_block_info(&self, info: &BlockInfo) -> Result<(), StoreError> {
        self.engine.put(Table::BlockInfo, info_key(info.hash), info.encode_to_vec())?;
        Ok(())
    }

    pub fn get_block_info(&self, hash: H256) -> Result<Option<BlockInfo>, StoreError> {
        match self.engine.get(Table::BlockInfo, &info_key(hash))? {
            Some(bytes) => Ok(Some(BlockInfo::decode(&bytes).map_err(|e| {
                StoreError::Corrupt(format!("block info for {hash:#x} failed to decode: {e}"))
            })?)),
            None => Ok(None),
        }
    }

    pub fn set_last_block(&self, block: &Block) -> Result<(), StoreError> {
        self.engine.put(Table::Meta, LAST_BLOCK_KEY.to_vec(), block.encode_to_vec())?;
        Ok(())
    }

    pub fn get_last_block(&self) -> Result<Option<Block>, StoreError> {
        match self.engine.get(Table::Meta, LAST_BLOCK_KEY)? {
            Some(bytes) => Ok(Some(Block::decode(&bytes).map_err(|e| {
                StoreError::Corrupt(format!("LastBlock record failed to decode: {e}"))
            })?)),
            None => Ok(None),
        }
    }

    pub fn set_total_difficulty(&self, td: U256) -> Result<(), StoreError> {
        let mut bytes = [0u8; 32];
        td.to_big_endian(&mut bytes);
        self.engine.put(Table::Meta, TOTAL_DIFFICULTY_KEY.to_vec(), bytes.to_vec())?;
        Ok(())
    }

    pub fn get_total_difficulty(&self) -> Result<Option<U256>, StoreError> {
        match self.engine.get(Table::Meta, TOTAL_DIFFICULTY_KEY)? {
            Some(bytes) if bytes.len() == 32 => Ok(Some(U256::from_big_endian(&bytes))),
            Some(bytes) => Err(StoreError::Corrupt(format!(
                "LTD record has {} bytes, expected 32",
                bytes.len()
            ))),
            None => Ok(None),
        }
    }

    pub fn put_code(&self, code_hash: H256, code: &Bytes) -> Result<(), StoreError> {
        self.engine.put(Table::Code, code_hash.as_bytes().to_vec(), code.to_vec())?;
        Ok(())
    }

    pub fn get_code(&self, code_hash: H256) -> Result<Bytes, StoreError> {
        Ok(self.engine.get(Table::Code, code_hash.as_bytes())?.map(Bytes::from).unwrap_or_default())
    }
}

fn info_key(hash: H256) -> Vec<u8> {
    let mut key = hash.as_bytes().to_vec();
    key.extend_from_slice(b"Info");
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes as B;
    use doug_common::BlockHeader;

    fn sample_block(number: u64) -> Block {
        Block {
            header: BlockHeader {
                prev_hash: H256::zero(),
                uncle_hash: H256::zero(),
                coinbase: Default::default(),
                state_root: H256::zero(),
                tx_root: H256::zero(),
                difficulty: U256::from(1024u64),
                number,
                min_gas_price: U256::zero(),
                gas_limit: 3_141_592,
                gas_used: 0,
                timestamp: 0,
                extra: B::new(),
                nonce: number,
                signature: None,
            },
            transactions: vec![],
            uncles: vec![],
        }
    }

    #[test]
    fn put_then_get_block_by_hash() {
        let store = ChainStore::in_memory();
        let block = sample_block(1);
        store.put_block(&block).unwrap();
        assert_eq!(store.get_block(block.hash()).unwrap(), Some(block));
    }

    #[test]
    fn missing_block_is_none_not_error() {
        let store = ChainStore::in_memory();
        assert_eq!(store.get_block(H256::repeat_byte(0xee)).unwrap(), None);
    }

    #[test]
    fn last_block_and_total_difficulty_round_trip() {
        let store = ChainStore::in_memory();
        let block = sample_block(5);
        store.set_last_block(&block).unwrap();
        store.set_total_difficulty(U256::from(999_999u64)).unwrap();

        assert_eq!(store.get_last_block().unwrap(), Some(block));
        assert_eq!(store.get_total_difficulty().unwrap(), Some(U256::from(999_999u64)));
    }

    #[test]
    fn code_and_block_hash_tables_do_not_collide() {
        let store = ChainStore::in_memory();
        let block = sample_block(1);
        let hash = block.hash();
        store.put_block(&block).unwrap();
        store.put_code(hash, &B::from_static(b"unrelated code")).unwrap();

        assert_eq!(store.get_block(hash).unwrap(), Some(block));
        assert_eq!(store.get_code(hash).unwrap(), B::from_static(b"unrelated code"));
    }
}
