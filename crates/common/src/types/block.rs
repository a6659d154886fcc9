use bytes::{BufMut, Bytes};
use doug_rlp::{
    decode::RLPDecode,
    encode::RLPEncode,
    error::RLPDecodeError,
    structs::{Decoder, Encoder},
};
use ethereum_types::{Address, H256, U256};

use super::transaction::Transaction;

/// A block header. `signature` is only present under the `StdLib`
/// protocol model, where a designated miner signs what it produced;
/// classical PoW chains leave it `None` and authenticate purely through
/// the nonce/difficulty check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub prev_hash: H256,
    pub uncle_hash: H256,
    pub coinbase: Address,
    pub state_root: H256,
    pub tx_root: H256,
    pub difficulty: U256,
    pub number: u64,
    pub min_gas_price: U256,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub timestamp: u64,
    pub extra: Bytes,
    pub nonce: u64,
    pub signature: Option<[u8; 65]>,
}

impl BlockHeader {
    /// The block's identity: `Keccak256(RLP(header))` over the header
    /// fields, signature excluded. This is what `BlockInfo` and block
    /// persistence key on, and what a `StdLib` miner signs.
    pub fn hash(&self) -> H256 {
        let mut buf = Vec::new();
        self.encode_fields(&mut buf, false);
        H256::from(doug_crypto::keccak256(&buf))
    }

    /// Recovers the address that produced `signature` over this header's
    /// `hash()`. `StdLib` requires this to equal `coinbase`; `None` means
    /// the header was never signed.
    pub fn signer(&self) -> Result<Option<Address>, doug_crypto::CryptoError> {
        match self.signature {
            Some(sig) => doug_crypto::recover_signer(&sig, &self.hash().0).map(Some),
            None => Ok(None),
        }
    }

    fn encode_fields(&self, buf: &mut dyn BufMut, with_signature: bool) {
        let mut encoder = Encoder::new(buf)
            .encode_field(&self.prev_hash)
            .encode_field(&self.uncle_hash)
            .encode_field(&self.coinbase)
            .encode_field(&self.state_root)
            .encode_field(&self.tx_root)
            .encode_field(&self.difficulty)
            .encode_field(&self.number)
            .encode_field(&self.min_gas_price)
            .encode_field(&self.gas_limit)
            .encode_field(&self.gas_used)
            .encode_field(&self.timestamp)
            .encode_field(&self.extra)
            .encode_field(&self.nonce);
        if with_signature {
            encoder = encoder.encode_optional_field(&self.signature.map(|s| Bytes::copy_from_slice(&s)));
        }
        encoder.finish();
    }
}

impl RLPEncode for BlockHeader {
    fn encode(&self, buf: &mut dyn BufMut) {
        self.encode_fields(buf, true)
    }
}

impl RLPDecode for BlockHeader {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let decoder = Decoder::new(rlp)?;
        let (prev_hash, decoder) = decoder.decode_field("prev_hash")?;
        let (uncle_hash, decoder) = decoder.decode_field("uncle_hash")?;
        let (coinbase, decoder) = decoder.decode_field("coinbase")?;
        let (state_root, decoder) = decoder.decode_field("state_root")?;
        let (tx_root, decoder) = decoder.decode_field("tx_root")?;
        let (difficulty, decoder) = decoder.decode_field("difficulty")?;
        let (number, decoder) = decoder.decode_field("number")?;
        let (min_gas_price, decoder) = decoder.decode_field("min_gas_price")?;
        let (gas_limit, decoder) = decoder.decode_field("gas_limit")?;
        let (gas_used, decoder) = decoder.decode_field("gas_used")?;
        let (timestamp, decoder) = decoder.decode_field("timestamp")?;
        let (extra, decoder) = decoder.decode_field("extra")?;
        let (nonce, decoder) = decoder.decode_field("nonce")?;
        let (raw_signature, decoder): (Option<Bytes>, _) = decoder.decode_optional_field();
        let signature = match raw_signature {
            Some(bytes) => {
                let arr: [u8; 65] =
                    bytes.as_ref().try_into().map_err(|_| RLPDecodeError::malformed_data())?;
                Some(arr)
            }
            None => None,
        };
        let rest = decoder.finish()?;
        Ok((
            Self {
                prev_hash,
                uncle_hash,
                coinbase,
                state_root,
                tx_root,
                difficulty,
                number,
                min_gas_price,
                gas_limit,
                gas_used,
                timestamp,
                extra,
                nonce,
                signature,
            },
            rest,
        ))
    }
}

/// A full block: header plus the transactions it applies and the uncle
/// headers it references for the reward split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
    pub uncles: Vec<BlockHeader>,
}

impl Block {
    pub fn hash(&self) -> H256 {
        self.header.hash()
    }
}

impl RLPEncode for Block {
    fn encode(&self, buf: &mut dyn BufMut) {
        Encoder::new(buf)
            .encode_field(&self.header)
            .encode_field(&self.transactions)
            .encode_field(&self.uncles)
            .finish();
    }
}

impl RLPDecode for Block {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let decoder = Decoder::new(rlp)?;
        let (header, decoder) = decoder.decode_field("header")?;
        let (transactions, decoder) = decoder.decode_field("transactions")?;
        let (uncles, decoder) = decoder.decode_field("uncles")?;
        let rest = decoder.finish()?;
        Ok((Self { header, transactions, uncles }, rest))
    }
}
