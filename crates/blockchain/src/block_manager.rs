//! Applies a block's transactions to a parent state (§4.3): one pass over
//! the transaction list, a snapshot/restore per transaction so a failed
//! tx can't leak partial state, then rewards and the final root check.

use doug_common::{Block, Receipt, Transaction};
use doug_vm::{BlockContext, Evm, Message};
use ethereum_types::{Address, U256};

use crate::{
    error::{ChainError, InvalidBlockError},
    state::{ManifestEntry, State},
};

/// Charged regardless of whether the dispatched call itself ran out of
/// gas; a reverted transaction still refunds everything above this much.
pub const INTRINSIC_GAS: u64 = 21_000;

/// Credited to `coinbase` once per block, on top of any uncle reward.
pub const BLOCK_REWARD: u64 = 5_000_000_000_000_000_000;

/// Credited to `coinbase` per valid uncle referenced by the block.
pub const UNCLE_REWARD: u64 = BLOCK_REWARD / 32;

/// Runs every transaction in `block` against `state` (already opened on
/// the parent's root), credits the coinbase, and checks the resulting
/// root against `block.header.state_root`. `state` is mutated in place;
/// on any error the caller's own snapshot of `state` (if it took one)
/// is the only way to recover the pre-apply state.
pub fn apply_block(block: &Block, state: &State, evm: &dyn Evm) -> Result<Vec<Receipt>, ChainError> {
    let block_ctx = BlockContext::from(&block.header);
    let mut receipts = Vec::with_capacity(block.transactions.len());
    let mut cumulative_gas = 0u64;

    for tx in &block.transactions {
        tracing::debug!(nonce = tx.nonce, gas = tx.gas, "applying transaction");
        let gas_used = apply_transaction(tx, state, evm, block_ctx)?;
        cumulative_gas += gas_used;
        receipts.push(Receipt { tx: tx.clone(), post_state_root: state.root_hash(), cumulative_gas });
    }

    credit_rewards(state, block.header.coinbase, block.uncles.len());

    state.update()?;
    let computed = state.root_hash();
    if computed != block.header.state_root {
        return Err(InvalidBlockError::StateRootMismatch { expected: block.header.state_root, computed }.into());
    }

    Ok(receipts)
}

/// Applies a single transaction, returning the gas actually charged.
/// Any failure after the nonce/balance checks (EVM error, revert) rolls
/// `state` back to its pre-tx contents and only the intrinsic cost is
/// kept; `NonceMismatch`/`InsufficientFunds` abort before any mutation.
///
/// Exposed (not just `apply_block`) so a block assembler can run
/// transactions one at a time against a scratch `State` while it still
/// doesn't know the header fields `apply_block` would otherwise need.
pub fn apply_transaction(tx: &Transaction, state: &State, evm: &dyn Evm, block_ctx: BlockContext) -> Result<u64, ChainError> {
    let from = tx.sender().map_err(doug_protocol::ProtocolError::from).map_err(InvalidBlockError::Protocol)?;
    let mut sender = state.get_or_new(from);

    if tx.nonce != sender.state.nonce {
        return Err(InvalidBlockError::NonceMismatch { expected: sender.state.nonce, got: tx.nonce }.into());
    }
    let upfront = U256::from(tx.gas).saturating_mul(tx.gas_price);
    if sender.state.balance < upfront {
        return Err(InvalidBlockError::InsufficientFunds.into());
    }

    sender.state.nonce += 1;
    sender.state.balance -= upfront;
    state.put(sender);

    let snapshot = state.copy();

    let new_address = tx.is_contract_creation().then(|| Transaction::contract_address(from, tx.nonce));
    let message = Message {
        code: if tx.is_contract_creation() { tx.data.clone() } else { state.get_code(tx.recipient.unwrap_or(from)) },
        input: tx.data.clone(),
        to: tx.recipient,
        from,
        value: tx.value,
        origin: from,
        block_ctx,
        gas: tx.gas,
    };

    let outcome = evm.execute(&message);

    let (gas_used, manifest_entry) = match outcome {
        Ok(outcome) if outcome.success => {
            if tx.value > U256::zero() {
                if let Some(to) = tx.recipient {
                    let mut recipient = state.get_or_new(to);
                    recipient.state.balance += tx.value;
                    state.put(recipient);
                }
            }
            if let Some(new_address) = new_address {
                let mut created = state.new_account(new_address);
                created.set_code(outcome.output.clone());
                state.put(created);
            }
            let entry = ManifestEntry {
                from,
                to: tx.recipient.or(new_address),
                value: tx.value,
                input: tx.data.clone(),
                output: outcome.output.clone(),
                success: true,
            };
            (outcome.gas_used, entry)
        }
        Ok(outcome) => {
            tracing::warn!(?from, "transaction reverted");
            state.restore_from(snapshot);
            let entry = ManifestEntry {
                from,
                to: tx.recipient,
                value: tx.value,
                input: tx.data.clone(),
                output: outcome.output,
                success: false,
            };
            (outcome.gas_used, entry)
        }
        Err(err) => {
            tracing::warn!(?from, error = %err, "transaction's EVM call failed");
            state.restore_from(snapshot);
            let entry = ManifestEntry {
                from,
                to: tx.recipient,
                value: tx.value,
                input: tx.data.clone(),
                output: bytes::Bytes::new(),
                success: false,
            };
            (tx.gas, entry)
        }
    };

    state.record(manifest_entry);

    let charged = gas_used.max(INTRINSIC_GAS).min(tx.gas);
    let refund = U256::from(tx.gas - charged).saturating_mul(tx.gas_price);
    if refund > U256::zero() {
        let mut sender = state.get_or_new(from);
        sender.state.balance += refund;
        state.put(sender);
    }

    Ok(charged)
}

/// Credits `coinbase` with the block and uncle rewards. Exposed
/// separately from [`apply_block`] so a block assembler can compute the
/// post-reward root (needed to stamp `state_root` into the header) before
/// a winning nonce is even found.
pub fn credit_rewards(state: &State, coinbase: Address, uncle_count: usize) {
    let mut account = state.get_or_new(coinbase);
    account.state.balance += U256::from(BLOCK_REWARD);
    account.state.balance += U256::from(UNCLE_REWARD).saturating_mul(U256::from(uncle_count as u64));
    state.put(account);
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use doug_common::BlockHeader;
    use doug_crypto::{sign_message, KeyPair};
    use doug_rlp::encode::RLPEncode;
    use doug_storage::ChainStore;
    use doug_vm::NoopEvm;
    use ethereum_types::H256;
    use secp256k1::SecretKey;

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

    fn header_with_root(root: H256, coinbase: Address) -> BlockHeader {
        BlockHeader {
            prev_hash: H256::zero(),
            uncle_hash: H256::zero(),
            coinbase,
            state_root: root,
            tx_root: H256::zero(),
            difficulty: U256::from(1024u64),
            number: 1,
            min_gas_price: U256::zero(),
            gas_limit: 3_141_592,
            gas_used: 0,
            timestamp: 1,
            extra: Bytes::new(),
            nonce: 0,
            signature: None,
        }
    }

    #[test]
    fn simple_transfer_moves_balance_and_matches_root() {
        let keypair = KeyPair::from_secret(SecretKey::from_slice(&[0x09; 32]).unwrap());
        let from = keypair.address();
        let to = Address::repeat_byte(0x42);
        let coinbase = Address::repeat_byte(0x99);

        let state = State::new(ChainStore::in_memory());
        let mut sender = state.get_or_new(from);
        sender.state.balance = U256::from(1_000_000u64);
        state.put(sender);
        state.update().unwrap();

        let tx = signed_tx(&keypair, 0, Some(to), 50_000, U256::one(), U256::from(1_000u64), Bytes::new());

        // Compute the expected root by applying against a scratch copy first.
        let scratch = state.copy();
        apply_transaction(&tx, &scratch, &NoopEvm::new(), BlockContext::from(&header_with_root(H256::zero(), coinbase))).unwrap();
        credit_rewards(&scratch, coinbase, 0);
        scratch.update().unwrap();
        let expected_root = scratch.root_hash();

        let block = Block { header: header_with_root(expected_root, coinbase), transactions: vec![tx], uncles: vec![] };
        let receipts = apply_block(&block, &state, &NoopEvm::new()).unwrap();

        assert_eq!(receipts.len(), 1);
        assert_eq!(state.get_balance(to), U256::from(1_000u64));
        assert_eq!(state.get_balance(coinbase), U256::from(BLOCK_REWARD));
        assert_eq!(state.get_nonce(from), 1);
    }

    #[test]
    fn wrong_nonce_is_rejected_before_any_mutation() {
        let keypair = KeyPair::from_secret(SecretKey::from_slice(&[0x0a; 32]).unwrap());
        let from = keypair.address();
        let state = State::new(ChainStore::in_memory());
        let mut sender = state.get_or_new(from);
        sender.state.balance = U256::from(1_000_000u64);
        state.put(sender);
        state.update().unwrap();

        let tx = signed_tx(&keypair, 5, Some(Address::repeat_byte(0x01)), 50_000, U256::one(), U256::zero(), Bytes::new());
        let result = apply_transaction(&tx, &state, &NoopEvm::new(), BlockContext::from(&header_with_root(H256::zero(), Address::zero())));

        assert!(matches!(result, Err(ChainError::InvalidBlock(InvalidBlockError::NonceMismatch { expected: 0, got: 5 }))));
        assert_eq!(state.get_nonce(from), 0);
    }

    #[test]
    fn insufficient_funds_is_rejected() {
        let keypair = KeyPair::from_secret(SecretKey::from_slice(&[0x0b; 32]).unwrap());
        let from = keypair.address();
        let state = State::new(ChainStore::in_memory());

        let tx = signed_tx(&keypair, 0, Some(Address::repeat_byte(0x01)), 50_000, U256::one(), U256::zero(), Bytes::new());
        let result = apply_transaction(&tx, &state, &NoopEvm::new(), BlockContext::from(&header_with_root(H256::zero(), Address::zero())));

        assert!(matches!(result, Err(ChainError::InvalidBlock(InvalidBlockError::InsufficientFunds))));
    }

    #[test]
    fn mismatched_state_root_is_fatal_for_the_candidate() {
        let keypair = KeyPair::from_secret(SecretKey::from_slice(&[0x0c; 32]).unwrap());
        let from = keypair.address();
        let state = State::new(ChainStore::in_memory());
        let mut sender = state.get_or_new(from);
        sender.state.balance = U256::from(1_000_000u64);
        state.put(sender);
        state.update().unwrap();

        let tx = signed_tx(&keypair, 0, Some(Address::repeat_byte(0x01)), 50_000, U256::one(), U256::zero(), Bytes::new());
        let block = Block { header: header_with_root(H256::repeat_byte(0xee), Address::zero()), transactions: vec![tx], uncles: vec![] };

        let result = apply_block(&block, &state, &NoopEvm::new());
        assert!(matches!(result, Err(ChainError::InvalidBlock(InvalidBlockError::StateRootMismatch { .. }))));
    }
}
