use bytes::BufMut;
use doug_rlp::{
    decode::RLPDecode,
    encode::RLPEncode,
    error::RLPDecodeError,
    structs::{Decoder, Encoder},
};
use ethereum_types::H256;

use super::transaction::Transaction;

/// One per included transaction, in the same order as the block's
/// transaction list. Snapshots the state root immediately after applying
/// its transaction, so a light client can bisect a disputed block by
/// receipt instead of replaying the whole thing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub tx: Transaction,
    pub post_state_root: H256,
    pub cumulative_gas: u64,
}

impl RLPEncode for Receipt {
    fn encode(&self, buf: &mut dyn BufMut) {
        Encoder::new(buf)
            .encode_field(&self.tx)
            .encode_field(&self.post_state_root)
            .encode_field(&self.cumulative_gas)
            .finish();
    }
}

impl RLPDecode for Receipt {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let decoder = Decoder::new(rlp)?;
        let (tx, decoder) = decoder.decode_field("tx")?;
        let (post_state_root, decoder) = decoder.decode_field("post_state_root")?;
        let (cumulative_gas, decoder) = decoder.decode_field("cumulative_gas")?;
        let rest = decoder.finish()?;
        Ok((Self { tx, post_state_root, cumulative_gas }, rest))
    }
}
