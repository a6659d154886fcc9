use bytes::Bytes;
use ethereum_types::{Address, H256, U256};

/// Read-only view of account state a protocol model needs: balances and
/// nonces for validation, storage and code for GenDoug lookups and `Vm`
/// contract calls. Implemented by `doug-blockchain`'s `State`; kept as a
/// trait here so this crate never depends on the concrete state engine.
pub trait StateView {
    fn get_storage(&self, address: Address, key: H256) -> H256;
    fn get_balance(&self, address: Address) -> U256;
    fn get_nonce(&self, address: Address) -> u64;
    fn get_code(&self, address: Address) -> Bytes;
}

/// The write half, used only by `deploy` to seed genesis accounts and the
/// GenDoug permission/consensus layout directly into storage.
///
/// Takes `&self`: the concrete implementation (`doug-blockchain`'s `State`)
/// guards all of its fields behind a single mutex and is shared as `&State`
/// everywhere, so there is no outer `&mut` to thread through a trait object.
pub trait StateWriter: StateView {
    fn set_storage(&self, address: Address, key: H256, value: H256);
    fn set_balance(&self, address: Address, value: U256);
    fn set_nonce(&self, address: Address, value: u64);
    fn set_code(&self, address: Address, code: Bytes);
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;

    #[derive(Default)]
    pub(crate) struct MockState {
        storage: RefCell<HashMap<(Address, H256), H256>>,
        balance: RefCell<HashMap<Address, U256>>,
        nonce: RefCell<HashMap<Address, u64>>,
        code: RefCell<HashMap<Address, Bytes>>,
    }

    impl StateView for MockState {
        fn get_storage(&self, address: Address, key: H256) -> H256 {
            self.storage.borrow().get(&(address, key)).copied().unwrap_or_default()
        }

        fn get_balance(&self, address: Address) -> U256 {
            self.balance.borrow().get(&address).copied().unwrap_or_default()
        }

        fn get_nonce(&self, address: Address) -> u64 {
            self.nonce.borrow().get(&address).copied().unwrap_or_default()
        }

        fn get_code(&self, address: Address) -> Bytes {
            self.code.borrow().get(&address).cloned().unwrap_or_default()
        }
    }

    impl StateWriter for MockState {
        fn set_storage(&self, address: Address, key: H256, value: H256) {
            self.storage.borrow_mut().insert((address, key), value);
        }

        fn set_balance(&self, address: Address, value: U256) {
            self.balance.borrow_mut().insert(address, value);
        }

        fn set_nonce(&self, address: Address, value: u64) {
            self.nonce.borrow_mut().insert(address, value);
        }

        fn set_code(&self, address: Address, code: Bytes) {
            self.code.borrow_mut().insert(address, code);
        }
    }
}
