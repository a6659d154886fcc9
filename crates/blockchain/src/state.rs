use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use doug_common::{Account, AccountState};
use doug_protocol::{StateView, StateWriter};
use doug_rlp::{decode::RLPDecode, encode::RLPEncode};
use doug_storage::ChainStore;
use doug_trie::Trie;
use ethereum_types::{Address, H256, U256};

use crate::error::ChainError;

/// One pending call/create, accumulated for the duration of a block and
/// handed to the reactor for event emission (§4.2 `manifest()`).
#[derive(Debug, Clone)]
pub struct ManifestEntry {
    pub from: Address,
    pub to: Option<Address>,
    pub value: U256,
    pub input: Bytes,
    pub output: Bytes,
    pub success: bool,
}

struct Inner {
    trie: Trie,
    accounts: HashMap<Address, Account>,
    dirty: HashSet<Address>,
    storage: HashMap<Address, Trie>,
    manifest: Vec<ManifestEntry>,
    /// Set when a storage-trie write failed outside of `update()`'s own
    /// `?`-propagated path (the `StateWriter::set_storage` trait method is
    /// void-returning). Checked first by `update()`/`sync()` so the
    /// corruption surfaces as `ChainError::Fatal` rather than vanishing.
    corrupt: Option<String>,
}

/// Cache + trie composite (§4.2). A single mutex guards the whole cache;
/// callers serialize block-level mutations through it rather than relying
/// on per-field locking, matching `monkstate.State`'s single `mut` lock.
pub struct State {
    inner: Mutex<Inner>,
    store: ChainStore,
}

impl State {
    /// A fresh, empty state over `store`'s trie backend.
    pub fn new(store: ChainStore) -> Self {
        Self::open(store, doug_trie::empty_root())
    }

    pub fn open(store: ChainStore, root: H256) -> Self {
        let trie = Trie::open(store.trie_db(), root);
        let inner = Inner {
            trie,
            accounts: HashMap::new(),
            dirty: HashSet::new(),
            storage: HashMap::new(),
            manifest: Vec::new(),
            corrupt: None,
        };
        Self { inner: Mutex::new(inner), store }
    }

    pub fn root_hash(&self) -> H256 {
        self.lock().trie.root_hash()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poison| poison.into_inner())
    }

    /// Loads `addr` from the cache, or from the trie on a cache miss,
    /// fetching its code from the backing store. `None` if the account has
    /// never existed or was marked removed.
    fn load(&self, inner: &mut Inner, addr: Address) -> Option<Account> {
        if let Some(account) = inner.accounts.get(&addr) {
            return if account.removed { None } else { Some(account.clone()) };
        }

        let encoded = inner.trie.get(addr.as_bytes()).ok().flatten()?;
        let account_state = AccountState::decode(&encoded).ok()?;
        let code = self.store.get_code(account_state.code_hash).unwrap_or_default();
        let account = Account { address: addr, state: account_state, code, removed: false };
        inner.accounts.insert(addr, account.clone());
        Some(account)
    }

    pub fn get(&self, addr: Address) -> Option<Account> {
        let mut inner = self.lock();
        self.load(&mut inner, addr)
    }

    pub fn get_or_new(&self, addr: Address) -> Account {
        let mut inner = self.lock();
        if let Some(account) = self.load(&mut inner, addr) {
            return account;
        }
        let account = Account::new(addr);
        inner.accounts.insert(addr, account.clone());
        inner.dirty.insert(addr);
        account
    }

    /// Creates `addr` whether or not it already exists in the trie,
    /// discarding any prior state (used for contract creation at a freshly
    /// derived address).
    pub fn new_account(&self, addr: Address) -> Account {
        let mut inner = self.lock();
        let account = Account::new(addr);
        inner.accounts.insert(addr, account.clone());
        inner.dirty.insert(addr);
        account
    }

    pub fn put(&self, account: Account) {
        let mut inner = self.lock();
        inner.dirty.insert(account.address);
        inner.accounts.insert(account.address, account);
    }

    pub fn delete(&self, addr: Address) {
        let mut inner = self.lock();
        let mut account = self.load(&mut inner, addr).unwrap_or_else(|| Account::new(addr));
        account.removed = true;
        inner.accounts.insert(addr, account);
        inner.dirty.insert(addr);
        inner.storage.remove(&addr);
    }

    pub fn get_storage_at(&self, addr: Address, key: H256) -> H256 {
        let mut inner = self.lock();
        let Some(account) = self.load(&mut inner, addr) else { return H256::zero() };
        let trie = self.storage_trie(&mut inner, addr, account.state.storage_root);
        match trie.get(key.as_bytes()) {
            Ok(Some(encoded)) => H256::decode(&encoded).unwrap_or_else(|_| H256::zero()),
            _ => H256::zero(),
        }
    }

    pub fn set_storage_at(&self, addr: Address, key: H256, value: H256) -> Result<(), ChainError> {
        let mut inner = self.lock();
        // Touch the account first so an address whose only mutation is a
        // storage write is still picked up by `update()`.
        let account = self.load(&mut inner, addr).unwrap_or_else(|| Account::new(addr));
        let storage_root = account.state.storage_root;
        inner.accounts.entry(addr).or_insert(account);
        inner.dirty.insert(addr);

        let trie = self.storage_trie(&mut inner, addr, storage_root);
        if value.is_zero() {
            trie.delete(key.as_bytes())?;
        } else {
            trie.update(key.as_bytes(), value.encode_to_vec())?;
        }
        Ok(())
    }

    fn storage_trie<'a>(&self, inner: &'a mut Inner, addr: Address, root: H256) -> &'a mut Trie {
        inner.storage.entry(addr).or_insert_with(|| Trie::open(self.store.trie_db(), root))
    }

    pub fn record(&self, entry: ManifestEntry) {
        self.lock().manifest.push(entry);
    }

    pub fn manifest(&self) -> Vec<ManifestEntry> {
        self.lock().manifest.clone()
    }

    /// Independent deep snapshot sharing the backing store: the account
    /// cache, dirty set and every open storage trie are cloned; none of it
    /// is visible to the original until explicitly merged back in.
    pub fn copy(&self) -> Self {
        let inner = self.lock();
        let copied = Inner {
            trie: inner.trie.copy(),
            accounts: inner.accounts.clone(),
            dirty: inner.dirty.clone(),
            storage: inner.storage.iter().map(|(addr, trie)| (*addr, trie.copy())).collect(),
            manifest: inner.manifest.clone(),
            corrupt: inner.corrupt.clone(),
        };
        Self { inner: Mutex::new(copied), store: self.store.clone() }
    }

    /// Replaces this state's contents with `other`'s, consuming it. Used to
    /// commit a speculative `copy()` back into the state the rest of the
    /// block sees, or to roll back to a pre-tx snapshot on revert.
    pub fn restore_from(&self, other: State) {
        let mut inner = self.lock();
        *inner = other.inner.into_inner().unwrap_or_else(|poison| poison.into_inner());
    }

    /// Flushes every dirty account: nested storage tries sync first and
    /// their roots get folded back into the account encoding, then the
    /// outer trie is updated (or the account is deleted from it). Runs the
    /// paranoia check once per call, not once per leaf write, per
    /// `monkstate.State.Update`'s placement.
    pub fn update(&self) -> Result<(), ChainError> {
        let mut inner = self.lock();
        if let Some(reason) = inner.corrupt.take() {
            return Err(ChainError::Fatal(reason));
        }
        let dirty: Vec<Address> = inner.dirty.drain().collect();

        for addr in dirty {
            let Some(mut account) = inner.accounts.get(&addr).cloned() else { continue };

            if account.removed {
                inner.trie.delete(addr.as_bytes())?;
                inner.storage.remove(&addr);
                continue;
            }

            if let Some(trie) = inner.storage.get_mut(&addr) {
                trie.sync()?;
                account.state.storage_root = trie.root_hash();
            }

            if !account.code.is_empty() {
                self.store.put_code(account.state.code_hash, &account.code)?;
            }

            inner.trie.update(addr.as_bytes(), account.state.encode_to_vec())?;
            inner.accounts.insert(addr, account);
        }

        if !inner.trie.rebuild_and_verify()? {
            tracing::warn!("paranoia check: trie root diverged from rebuilt contents, repairing");
            let entries = inner.trie.collect_entries()?;
            let mut rebuilt = Trie::new(self.store.trie_db());
            for (key, value) in entries {
                rebuilt.update(&key, value)?;
            }
            inner.trie = rebuilt;
        }

        Ok(())
    }

    /// Recursively flushes every open storage trie then the account trie
    /// itself to the backing store, clearing the in-memory cache.
    pub fn sync(&self) -> Result<(), ChainError> {
        let mut inner = self.lock();
        if let Some(reason) = inner.corrupt.take() {
            return Err(ChainError::Fatal(reason));
        }
        for trie in inner.storage.values_mut() {
            trie.sync()?;
        }
        inner.trie.sync()?;
        inner.accounts.clear();
        inner.storage.clear();
        Ok(())
    }
}

impl StateView for State {
    fn get_storage(&self, addr: Address, key: H256) -> H256 {
        self.get_storage_at(addr, key)
    }

    fn get_balance(&self, addr: Address) -> U256 {
        self.get(addr).map(|a| a.state.balance).unwrap_or_default()
    }

    fn get_nonce(&self, addr: Address) -> u64 {
        self.get(addr).map(|a| a.state.nonce).unwrap_or_default()
    }

    fn get_code(&self, addr: Address) -> Bytes {
        self.get(addr).map(|a| a.code).unwrap_or_default()
    }
}

impl StateWriter for State {
    fn set_storage(&self, addr: Address, key: H256, value: H256) {
        if let Err(err) = self.set_storage_at(addr, key, value) {
            tracing::error!(%addr, %err, "storage trie write failed, flagging state corrupt");
            self.lock().corrupt.get_or_insert(err.to_string());
        }
    }

    fn set_balance(&self, addr: Address, balance: U256) {
        let mut account = self.get_or_new(addr);
        account.state.balance = balance;
        self.put(account);
    }

    fn set_nonce(&self, addr: Address, nonce: u64) {
        let mut account = self.get_or_new(addr);
        account.state.nonce = nonce;
        self.put(account);
    }

    fn set_code(&self, addr: Address, code: Bytes) {
        let mut account = self.get_or_new(addr);
        account.set_code(code);
        self.put(account);
    }
}

/// Convenience for call sites holding an `Arc<State>` that need to satisfy
/// a `&dyn StateView`/`&dyn StateWriter` trait object bound.
pub fn as_view(state: &Arc<State>) -> &dyn StateView {
    state.as_ref()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> State {
        State::new(ChainStore::in_memory())
    }

    #[test]
    fn unknown_account_reads_as_empty() {
        let state = fresh();
        let addr = Address::repeat_byte(0x01);
        assert!(state.get(addr).is_none());
        assert_eq!(state.get_balance(addr), U256::zero());
        assert_eq!(state.get_nonce(addr), 0);
        assert!(state.get_code(addr).is_empty());
    }

    #[test]
    fn set_balance_then_update_is_visible_after_reload() {
        let store = ChainStore::in_memory();
        let state = State::new(store.clone());
        let addr = Address::repeat_byte(0x02);
        state.set_balance(addr, U256::from(1_000u64));
        state.update().unwrap();

        let root = state.root_hash();
        state.sync().unwrap();

        let reopened = State::open(store, root);
        assert_eq!(reopened.get_balance(addr), U256::from(1_000u64));
    }

    #[test]
    fn storage_round_trips_through_update() {
        let state = fresh();
        let addr = Address::repeat_byte(0x03);
        let key = H256::repeat_byte(0x05);
        let value = H256::repeat_byte(0x09);

        state.set_storage_at(addr, key, value).unwrap();
        assert_eq!(state.get_storage_at(addr, key), value);

        state.update().unwrap();
        assert_eq!(state.get_storage_at(addr, key), value);
    }

    #[test]
    fn deleted_account_disappears_after_update() {
        let state = fresh();
        let addr = Address::repeat_byte(0x04);
        state.set_balance(addr, U256::from(1u64));
        state.update().unwrap();
        assert!(state.get(addr).is_some());

        state.delete(addr);
        state.update().unwrap();
        assert!(state.get(addr).is_none());
    }

    #[test]
    fn copy_is_independent_of_the_original() {
        let state = fresh();
        let addr = Address::repeat_byte(0x06);
        state.set_balance(addr, U256::from(7u64));
        state.update().unwrap();

        let snapshot = state.copy();
        state.set_balance(addr, U256::from(99u64));
        state.update().unwrap();

        assert_eq!(snapshot.get_balance(addr), U256::from(7u64));
        assert_eq!(state.get_balance(addr), U256::from(99u64));
    }

    #[test]
    fn restore_from_rolls_back_a_failed_transaction() {
        let state = fresh();
        let addr = Address::repeat_byte(0x07);
        state.set_balance(addr, U256::from(50u64));
        state.update().unwrap();

        let snapshot = state.copy();
        state.set_balance(addr, U256::from(0u64));
        state.update().unwrap();
        assert_eq!(state.get_balance(addr), U256::zero());

        state.restore_from(snapshot);
        assert_eq!(state.get_balance(addr), U256::from(50u64));
    }

    #[test]
    fn manifest_accumulates_and_is_readable() {
        let state = fresh();
        state.record(ManifestEntry {
            from: Address::repeat_byte(0x01),
            to: Some(Address::repeat_byte(0x02)),
            value: U256::zero(),
            input: Bytes::new(),
            output: Bytes::new(),
            success: true,
        });
        assert_eq!(state.manifest().len(), 1);
    }
}
