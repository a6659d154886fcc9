use bytes::BufMut;
use doug_rlp::{
    decode::{decode_bytes, get_item_with_prefix, RLPDecode},
    encode::RLPEncode,
    error::RLPDecodeError,
    structs::{Decoder, Encoder},
};
use ethereum_types::H256;

use crate::nibbles::Nibbles;

/// Reference to a child node: either nothing, or the Keccak hash of
/// another node's RLP encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeRef {
    #[default]
    Empty,
    Hash(H256),
}

impl NodeRef {
    pub fn is_empty(&self) -> bool {
        matches!(self, NodeRef::Empty)
    }
}

impl RLPEncode for NodeRef {
    fn encode(&self, buf: &mut dyn BufMut) {
        match self {
            NodeRef::Empty => ([] as [u8; 0]).as_slice().encode(buf),
            NodeRef::Hash(h) => h.as_bytes().encode(buf),
        }
    }
}

impl RLPDecode for NodeRef {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let (payload, rest) = decode_bytes(rlp)?;
        match payload.len() {
            0 => Ok((NodeRef::Empty, rest)),
            32 => Ok((NodeRef::Hash(H256::from_slice(payload)), rest)),
            _ => Err(RLPDecodeError::malformed_data()),
        }
    }
}

/// The four node kinds of the hex-prefix Merkle-Patricia trie (§4.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Leaf { path: Nibbles, value: Vec<u8> },
    Extension { path: Nibbles, child: NodeRef },
    Branch { children: [NodeRef; 16], value: Vec<u8> },
}

impl Node {
    pub fn encode_raw(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode(&mut buf);
        buf
    }

    pub fn decode_raw(data: &[u8]) -> Result<Self, RLPDecodeError> {
        Self::decode(data)
    }
}

impl RLPEncode for Node {
    fn encode(&self, buf: &mut dyn BufMut) {
        match self {
            Node::Leaf { path, value } => {
                let encoded_path = path.hex_prefix_encode(true);
                Encoder::new(buf).encode_field(&encoded_path).encode_field(value).finish();
            }
            Node::Extension { path, child } => {
                let encoded_path = path.hex_prefix_encode(false);
                Encoder::new(buf).encode_field(&encoded_path).encode_field(child).finish();
            }
            Node::Branch { children, value } => {
                let mut encoder = Encoder::new(buf);
                for child in children {
                    encoder = encoder.encode_field(child);
                }
                encoder.encode_field(value).finish();
            }
        }
    }
}

impl RLPDecode for Node {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let item_count = count_list_items(rlp)?;
        match item_count {
            2 => {
                let decoder = Decoder::new(rlp)?;
                let (encoded_path, decoder): (Vec<u8>, _) = decoder.decode_field("path")?;
                let (path, is_leaf) = Nibbles::hex_prefix_decode(&encoded_path);
                if is_leaf {
                    let (value, decoder) = decoder.decode_field("value")?;
                    let rest = decoder.finish()?;
                    Ok((Node::Leaf { path, value }, rest))
                } else {
                    let (child, decoder) = decoder.decode_field("child")?;
                    let rest = decoder.finish()?;
                    Ok((Node::Extension { path, child }, rest))
                }
            }
            17 => {
                let mut decoder = Decoder::new(rlp)?;
                let mut children = [NodeRef::Empty; 16];
                for slot in &mut children {
                    let (child, next) = decoder.decode_field("child")?;
                    *slot = child;
                    decoder = next;
                }
                let (value, decoder) = decoder.decode_field("value")?;
                let rest = decoder.finish()?;
                Ok((Node::Branch { children, value }, rest))
            }
            _ => Err(RLPDecodeError::malformed_data()),
        }
    }
}

fn count_list_items(rlp: &[u8]) -> Result<usize, RLPDecodeError> {
    let (is_list, payload, _) = doug_rlp::decode::decode_rlp_item(rlp)?;
    if !is_list {
        return Err(RLPDecodeError::unexpected_string());
    }
    let mut count = 0;
    let mut rest = payload;
    while !rest.is_empty() {
        let (_, next) = get_item_with_prefix(rest)?;
        rest = next;
        count += 1;
    }
    Ok(count)
}
