use bytes::{BufMut, Bytes};
use doug_rlp::{
    decode::RLPDecode,
    encode::RLPEncode,
    error::RLPDecodeError,
    structs::{Decoder, Encoder},
};
use doug_crypto::{recover_signer, CryptoError};
use ethereum_types::{Address, H256, U256};

/// A signed transaction. `recipient` is empty for contract creation, in
/// which case the new contract's address is derived from the sender and
/// its pending nonce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub nonce: u64,
    pub gas_price: U256,
    pub gas: u64,
    pub recipient: Option<Address>,
    pub value: U256,
    pub data: Bytes,
    pub v: u64,
    pub r: U256,
    pub s: U256,
}

impl Transaction {
    pub fn is_contract_creation(&self) -> bool {
        self.recipient.is_none()
    }

    pub fn hash(&self) -> H256 {
        H256::from(doug_crypto::keccak256(&self.encode_to_vec()))
    }

    /// Recovers the sender's address from `(v, r, s)` over the
    /// transaction's signing hash (the encoding with `v, r, s` zeroed out).
    pub fn sender(&self) -> Result<Address, CryptoError> {
        let mut sig = [0u8; 65];
        self.r.to_big_endian(&mut sig[0..32]);
        self.s.to_big_endian(&mut sig[32..64]);
        sig[64] = recovery_id(self.v);
        recover_signer(&sig, &self.signing_hash())
    }

    /// The hash the sender actually signs: the transaction's own
    /// encoding with `v, r, s` zeroed out.
    fn signing_hash(&self) -> H256 {
        let unsigned = Transaction { v: 0, r: U256::zero(), s: U256::zero(), ..self.clone() };
        H256::from(doug_crypto::keccak256(&unsigned.encode_to_vec()))
    }

    /// Derives the address of a contract created by `sender`'s
    /// transaction at the given pending nonce: `Keccak256(RLP(sender,
    /// nonce))[12..]`.
    pub fn contract_address(sender: Address, nonce: u64) -> Address {
        let mut buf = Vec::new();
        Encoder::new(&mut buf).encode_field(&sender).encode_field(&nonce).finish();
        let hash = doug_crypto::keccak256(&buf);
        Address::from_slice(&hash[12..])
    }
}

fn recovery_id(v: u64) -> u8 {
    // Accepts both the bare {0,1} parity and EIP-155-less legacy {27,28}.
    match v {
        0 | 1 => v as u8,
        27 | 28 => (v - 27) as u8,
        _ => (v % 2) as u8,
    }
}

impl RLPEncode for Transaction {
    fn encode(&self, buf: &mut dyn BufMut) {
        let recipient_bytes: Bytes = match self.recipient {
            Some(addr) => Bytes::copy_from_slice(addr.as_bytes()),
            None => Bytes::new(),
        };
        Encoder::new(buf)
            .encode_field(&self.nonce)
            .encode_field(&self.gas_price)
            .encode_field(&self.gas)
            .encode_field(&recipient_bytes)
            .encode_field(&self.value)
            .encode_field(&self.data)
            .encode_field(&self.v)
            .encode_field(&self.r)
            .encode_field(&self.s)
            .finish();
    }
}

impl RLPDecode for Transaction {
    fn decode_unfinished(rlp: &[u8]) -> Result<(Self, &[u8]), RLPDecodeError> {
        let decoder = Decoder::new(rlp)?;
        let (nonce, decoder) = decoder.decode_field("nonce")?;
        let (gas_price, decoder) = decoder.decode_field("gas_price")?;
        let (gas, decoder) = decoder.decode_field("gas")?;
        let (recipient_bytes, decoder): (Bytes, _) = decoder.decode_field("recipient")?;
        let (value, decoder) = decoder.decode_field("value")?;
        let (data, decoder) = decoder.decode_field("data")?;
        let (v, decoder) = decoder.decode_field("v")?;
        let (r, decoder) = decoder.decode_field("r")?;
        let (s, decoder) = decoder.decode_field("s")?;
        let rest = decoder.finish()?;

        let recipient = match recipient_bytes.len() {
            0 => None,
            20 => Some(Address::from_slice(&recipient_bytes)),
            _ => return Err(RLPDecodeError::malformed_data()),
        };

        Ok((Self { nonce, gas_price, gas, recipient, value, data, v, r, s }, rest))
    }
}
