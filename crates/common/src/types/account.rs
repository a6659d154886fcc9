use bytes::{BufMut, Bytes};
use doug_rlp::{decode::RLPDecode, encode::RLPEncode, error::RLPDecodeError, structs::{Decoder, Encoder}};
use ethereum_types::{Address, H256, U256};

/// What actually gets RLP-encoded into the state trie's leaf for an
/// account. Code lives outside the trie, addressed by `code_hash`; an
/// account's own storage lives in a distinct trie rooted at
/// `storage_root`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountState {
    pub nonce: u64,
    pub balance: U256,
    pub storage_root: H256,
    pub code_hash: H256,
}

impl AccountState {
    /// A freshly created account: no balance, no code, an empty storage trie.
    pub fn empty() -> Self {
        Self {
            nonce: 0,
            balance: U256::zero(),
            storage_root: empty_trie_root(),
            code_hash: doug_crypto::empty_hash().into(),
        }
    }
}

/// `Keccak256(RLP(""))`, duplicated from the trie crate's own constant
/// rather than pulled in as a dependency: an empty account's storage
/// trie always hashes to this value.
fn empty_trie_root() -> H256 {
    use std::sync::OnceLock;
    static EMPTY: OnceLock<H256> = OnceLock::new();
    *EMPTY.get_or_init(|| H256::from(doug_crypto::keccak256(&[doug_rlp::constants::RLP_NULL])))
}

impl RLPEncode for AccountState {
    fn encode(&self, buf: &mut dyn BufMut) {
        Encoder::new(buf)
            .encode_field(&self.nonce)
            .encode_field(&self.balance)
            .encode_field(&self.storage_root)
            .encode_field(&self.code_hash)
            .finish();
    }
}

impl RLPDecode for AccountState {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let decoder = Decoder::new(rlp)?;
        let (nonce, decoder) = decoder.decode_field("nonce")?;
        let (balance, decoder) = decoder.decode_field("balance")?;
        let (storage_root, decoder) = decoder.decode_field("storage_root")?;
        let (code_hash, decoder) = decoder.decode_field("code_hash")?;
        let rest = decoder.finish()?;
        Ok((Self { nonce, balance, storage_root, code_hash }, rest))
    }
}

/// The in-memory view of an account the state cache and block manager
/// operate on: the trie-encoded `AccountState` plus the address that keys
/// it and the code bytes `code_hash` commits to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    pub address: Address,
    pub state: AccountState,
    pub code: Bytes,
    /// Set by `State::delete`; a dirty account with this flag is removed
    /// from the trie on `update` instead of re-encoded into it.
    pub removed: bool,
}

impl Account {
    pub fn new(address: Address) -> Self {
        Self { address, state: AccountState::empty(), code: Bytes::new(), removed: false }
    }

    pub fn set_code(&mut self, code: Bytes) {
        self.state.code_hash = H256::from(doug_crypto::keccak256(&code));
        self.code = code;
    }

    pub fn is_empty(&self) -> bool {
        self.state.nonce == 0 && self.state.balance.is_zero() && self.code.is_empty()
    }
}
