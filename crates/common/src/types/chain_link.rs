use bytes::BufMut;
use doug_rlp::{
    decode::RLPDecode,
    encode::RLPEncode,
    error::RLPDecodeError,
    structs::{Decoder, Encoder},
};
use ethereum_types::{H256, U256};

use super::block::Block;

/// Per-hash sidecar stored under key `hash || "Info"`, letting the chain
/// manager resolve a block's total difficulty and parent without
/// decoding the block body itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockInfo {
    pub number: u64,
    pub hash: H256,
    pub parent: H256,
    pub total_difficulty: U256,
}

impl RLPEncode for BlockInfo {
    fn encode(&self, buf: &mut dyn BufMut) {
        Encoder::new(buf)
            .encode_field(&self.number)
            .encode_field(&self.hash)
            .encode_field(&self.parent)
            .encode_field(&self.total_difficulty)
            .finish();
    }
}

impl RLPDecode for BlockInfo {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let decoder = Decoder::new(rlp)?;
        let (number, decoder) = decoder.decode_field("number")?;
        let (hash, decoder) = decoder.decode_field("hash")?;
        let (parent, decoder) = decoder.decode_field("parent")?;
        let (total_difficulty, decoder) = decoder.decode_field("total_difficulty")?;
        let rest = decoder.finish()?;
        Ok((Self { number, hash, parent, total_difficulty }, rest))
    }
}

/// A candidate block paired with its total difficulty, as tracked while a
/// working chain is being evaluated against the current canonical chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainLink {
    pub block: Block,
    pub total_difficulty: U256,
}
