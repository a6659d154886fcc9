//! The candidate transaction pool (§5): a miner assembling a block reads
//! from here; nothing in Block Manager or `ChainManager` touches it. Kept
//! deliberately small — no replacement-by-fee-bump, no per-sender slot
//! limits — since this chain core has no network layer to defend against
//! a flood of competing submissions.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use doug_common::Transaction;
use doug_protocol::StateView;
use ethereum_types::{Address, H256, U256};

use crate::error::MempoolError;

#[derive(Debug, Clone, Default)]
pub struct Mempool {
    transactions: Arc<RwLock<HashMap<H256, Transaction>>>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<H256, Transaction>> {
        self.transactions.write().unwrap_or_else(|poison| poison.into_inner())
    }

    fn lock_read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<H256, Transaction>> {
        self.transactions.read().unwrap_or_else(|poison| poison.into_inner())
    }

    /// Validates `tx` against `state`'s nonce and balance (the same two
    /// checks Block Manager makes before touching the EVM) and pools it.
    pub fn add(&self, tx: Transaction, state: &dyn StateView) -> Result<H256, MempoolError> {
        let sender = tx.sender().map_err(|_| MempoolError::InvalidSignature)?;
        if tx.nonce < state.get_nonce(sender) {
            return Err(MempoolError::NonceTooLow);
        }
        let upfront = U256::from(tx.gas).saturating_mul(tx.gas_price);
        if state.get_balance(sender) < upfront {
            return Err(MempoolError::InsufficientFunds);
        }

        let hash = tx.hash();
        self.lock_write().insert(hash, tx);
        Ok(hash)
    }

    pub fn remove(&self, hash: &H256) {
        self.lock_write().remove(hash);
    }

    /// Drops every transaction a just-mined block carried, once it's been
    /// committed — whether the miner pulled them from this pool or not.
    pub fn remove_applied(&self, applied: &[Transaction]) {
        let mut pool = self.lock_write();
        for tx in applied {
            pool.remove(&tx.hash());
        }
    }

    /// Pending transactions grouped by sender and sorted by nonce, the
    /// order a block assembler applies them in.
    pub fn pending_by_sender(&self) -> HashMap<Address, Vec<Transaction>> {
        let pool = self.lock_read();
        let mut by_sender: HashMap<Address, Vec<Transaction>> = HashMap::new();
        for tx in pool.values() {
            if let Ok(sender) = tx.sender() {
                by_sender.entry(sender).or_default().push(tx.clone());
            }
        }
        for txs in by_sender.values_mut() {
            txs.sort_by_key(|tx| tx.nonce);
        }
        by_sender
    }

    pub fn len(&self) -> usize {
        self.lock_read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use doug_crypto::{sign_message, KeyPair};
    use doug_rlp::encode::RLPEncode;
    use doug_storage::ChainStore;
    use secp256k1::SecretKey;

    use crate::state::State;

    fn signed_tx(keypair: &KeyPair, nonce: u64, gas: u64, gas_price: U256) -> Transaction {
        let mut tx = Transaction {
            nonce,
            gas_price,
            gas,
            recipient: Some(Address::repeat_byte(0x42)),
            value: U256::zero(),
            data: Bytes::new(),
            v: 0,
            r: U256::zero(),
            s: U256::zero(),
        };
        let unsigned = Transaction { v: 0, r: U256::zero(), s: U256::zero(), ..tx.clone() };
        let hash = H256::from(doug_crypto::keccak256(&unsigned.encode_to_vec()));
        let sig = sign_message(keypair, &hash.0);
        tx.r = U256::from_big_endian(&sig[0..32]);
        tx.s = U256::from_big_endian(&sig[32..64]);
        tx.v = sig[64] as u64;
        tx
    }

    #[test]
    fn accepts_a_well_formed_transaction() {
        let keypair = KeyPair::from_secret(SecretKey::from_slice(&[0x31; 32]).unwrap());
        let state = State::new(ChainStore::in_memory());
        let mut sender = state.get_or_new(keypair.address());
        sender.state.balance = U256::from(1_000_000u64);
        state.put(sender);
        state.update().unwrap();

        let mempool = Mempool::new();
        let tx = signed_tx(&keypair, 0, 21_000, U256::one());
        let hash = mempool.add(tx.clone(), &state).unwrap();

        assert_eq!(hash, tx.hash());
        assert_eq!(mempool.len(), 1);
        assert_eq!(mempool.pending_by_sender()[&keypair.address()], vec![tx]);
    }

    #[test]
    fn rejects_a_stale_nonce() {
        let keypair = KeyPair::from_secret(SecretKey::from_slice(&[0x32; 32]).unwrap());
        let state = State::new(ChainStore::in_memory());
        let mut sender = state.get_or_new(keypair.address());
        sender.state.nonce = 3;
        sender.state.balance = U256::from(1_000_000u64);
        state.put(sender);
        state.update().unwrap();

        let mempool = Mempool::new();
        let tx = signed_tx(&keypair, 1, 21_000, U256::one());
        assert!(matches!(mempool.add(tx, &state), Err(MempoolError::NonceTooLow)));
    }

    #[test]
    fn rejects_a_transaction_the_sender_cannot_afford() {
        let keypair = KeyPair::from_secret(SecretKey::from_slice(&[0x33; 32]).unwrap());
        let state = State::new(ChainStore::in_memory());

        let mempool = Mempool::new();
        let tx = signed_tx(&keypair, 0, 21_000, U256::one());
        assert!(matches!(mempool.add(tx, &state), Err(MempoolError::InsufficientFunds)));
    }

    #[test]
    fn remove_applied_drains_mined_transactions() {
        let keypair = KeyPair::from_secret(SecretKey::from_slice(&[0x34; 32]).unwrap());
        let state = State::new(ChainStore::in_memory());
        let mut sender = state.get_or_new(keypair.address());
        sender.state.balance = U256::from(1_000_000u64);
        state.put(sender);
        state.update().unwrap();

        let mempool = Mempool::new();
        let tx = signed_tx(&keypair, 0, 21_000, U256::one());
        mempool.add(tx.clone(), &state).unwrap();

        mempool.remove_applied(std::slice::from_ref(&tx));
        assert!(mempool.is_empty());
    }
}
