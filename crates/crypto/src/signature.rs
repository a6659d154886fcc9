use ethereum_types::Address;
use secp256k1::{
    ecdsa::{RecoverableSignature, RecoveryId},
    Message, PublicKey, SecretKey, SECP256K1,
};
use thiserror::Error;

use crate::keccak::keccak256;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid recovery id")]
    InvalidRecoveryId,
    #[error("recovery failed")]
    RecoveryFailed,
}

/// EIP-2: reject high-s signatures (malleability).
const SECP256K1_N_HALF: [u8; 32] = hex_literal::hex!(
    "7fffffffffffffffffffffffffffffff5d576e7357a4501ddfe92f46681b20a0"
);

fn address_from_public_key(public_key: &PublicKey) -> Address {
    let hash = keccak256(&public_key.serialize_uncompressed()[1..]);
    Address::from_slice(&hash[12..])
}

/// Recovers the signer's address from a 65-byte `r||s||v` signature over a
/// 32-byte message digest (`v` is the recovery id, 0 or 1).
pub fn recover_signer(sig: &[u8; 65], msg: &[u8; 32]) -> Result<Address, CryptoError> {
    if sig[32..64] > SECP256K1_N_HALF[..] {
        return Err(CryptoError::InvalidSignature);
    }

    let recovery_id =
        RecoveryId::try_from(sig[64] as i32).map_err(|_| CryptoError::InvalidRecoveryId)?;
    let recoverable_sig = RecoverableSignature::from_compact(&sig[..64], recovery_id)
        .map_err(|_| CryptoError::InvalidSignature)?;
    let message = Message::from_digest(*msg);

    let public_key = SECP256K1
        .recover_ecdsa(&message, &recoverable_sig)
        .map_err(|_| CryptoError::RecoveryFailed)?;

    Ok(address_from_public_key(&public_key))
}

/// An in-memory keypair used by the miner and by tests to sign blocks and
/// transactions. Key management UIs are out of this crate's scope (§1).
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    pub fn from_secret(secret_key: SecretKey) -> Self {
        let public_key = PublicKey::from_secret_key(SECP256K1, &secret_key);
        Self { secret_key, public_key }
    }

    pub fn address(&self) -> Address {
        address_from_public_key(&self.public_key)
    }
}

/// Signs a 32-byte digest, returning a 65-byte `r||s||v` signature.
pub fn sign_message(keypair: &KeyPair, msg: &[u8; 32]) -> [u8; 65] {
    let message = Message::from_digest(*msg);
    let (recovery_id, sig) = SECP256K1
        .sign_ecdsa_recoverable(&message, &keypair.secret_key)
        .serialize_compact();

    let mut out = [0u8; 65];
    out[..64].copy_from_slice(&sig);
    out[64] = recovery_id.to_i32() as u8;
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_recover_roundtrip() {
        let secret = SecretKey::from_slice(&[0x11; 32]).unwrap();
        let keypair = KeyPair::from_secret(secret);
        let msg = keccak256(b"hello doug");

        let sig = sign_message(&keypair, &msg);
        let recovered = recover_signer(&sig, &msg).unwrap();

        assert_eq!(recovered, keypair.address());
    }

    #[test]
    fn recover_rejects_high_s() {
        let mut sig = [0u8; 65];
        sig[32] = 0xff;
        let msg = [0u8; 32];
        assert!(recover_signer(&sig, &msg).is_err());
    }
}
