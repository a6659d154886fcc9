//! Storage layout of the GenDoug permission/consensus contract (§6). This
//! crate never runs the contract through an EVM (genesis deployment writes
//! the layout directly, per the `GenesisConfig::deploy` supplement); these
//! helpers are the only code that knows where each piece of GenDoug state
//! lives, so every model variant reads and writes through them rather than
//! poking storage slots ad hoc.
//!
//! Slot derivation (`Keccak256` of a tagged name) is this crate's own
//! scheme — the eris-std-lib storage layout `original_source/monkdoug`
//! depends on isn't part of the retrieved sources, so locators and keyed
//! arrays are addressed by hashing rather than by walking real bytecode
//! storage. The externally observable shapes spec.md §6 names — a
//! name-list with a `locator`, a `perms[addr][locator]` keyed array, a
//! `seq:name` ring, and scalar configuration slots — are preserved exactly.

use doug_crypto::keccak256;
use ethereum_types::{Address, H256, U256};

use crate::state::{StateView, StateWriter};

fn slot(tag: &[u8]) -> H256 {
    H256::from(keccak256(tag))
}

fn tagged_slot(prefix: &str, parts: &[&[u8]]) -> H256 {
    let mut buf = prefix.as_bytes().to_vec();
    for part in parts {
        buf.push(b':');
        buf.extend_from_slice(part);
    }
    slot(&buf)
}

fn public_slot(perm: &str) -> H256 {
    tagged_slot("public", &[perm.as_bytes()])
}

fn permnames_len_slot() -> H256 {
    slot(b"permnames:len")
}

/// Stores `locator + 1` so the zero value of an unset slot is
/// distinguishable from a registered locator of `0`.
fn permnames_index_slot(perm: &str) -> H256 {
    tagged_slot("permnames:index", &[perm.as_bytes()])
}

fn perms_slot(addr: Address, locator: u64) -> H256 {
    tagged_slot("perms", &[addr.as_bytes(), &locator.to_be_bytes()])
}

fn seq_head_slot() -> H256 {
    slot(b"seq:name:head")
}

fn seq_len_slot() -> H256 {
    slot(b"seq:name:len")
}

fn seq_next_slot(addr: Address) -> H256 {
    tagged_slot("seq:name:next", &[addr.as_bytes()])
}

fn scalar_slot(name: &str) -> H256 {
    tagged_slot("scalar", &[name.as_bytes()])
}

fn h256_from_u64(v: u64) -> H256 {
    H256::from_low_u64_be(v)
}

fn address_from_h256(v: H256) -> Address {
    Address::from_slice(&v.as_bytes()[12..])
}

fn h256_from_address(addr: Address) -> H256 {
    let mut buf = [0u8; 32];
    buf[12..].copy_from_slice(addr.as_bytes());
    H256::from(buf)
}

/// The 0-based index of `perm` within the `"permnames"` list, or `None`
/// if it was never registered by `deploy`.
pub fn locator(doug: Address, perm: &str, state: &dyn StateView) -> Option<u64> {
    let raw = state.get_storage(doug, permnames_index_slot(perm));
    if raw.is_zero() {
        None
    } else {
        Some(U256::from_big_endian(raw.as_bytes()).as_u64() - 1)
    }
}

/// Registers a new permission name at the next free locator index.
/// Idempotent: re-registering an existing name returns its existing index.
pub fn register_permission(doug: Address, perm: &str, state: &dyn StateWriter) -> u64 {
    if let Some(existing) = locator(doug, perm, state) {
        return existing;
    }
    let len_slot = permnames_len_slot();
    let idx = U256::from_big_endian(state.get_storage(doug, len_slot).as_bytes()).as_u64();
    state.set_storage(doug, permnames_index_slot(perm), h256_from_u64(idx + 1));
    state.set_storage(doug, len_slot, h256_from_u64(idx + 1));
    idx
}

pub fn set_public_permission(doug: Address, perm: &str, state: &dyn StateWriter) {
    state.set_storage(doug, public_slot(perm), h256_from_u64(1));
}

/// Grants or revokes `perm` for `addr`. The permission must already be
/// registered via [`register_permission`].
pub fn set_permission(doug: Address, addr: Address, perm: &str, grant: bool, state: &dyn StateWriter) {
    let idx = register_permission(doug, perm, state);
    state.set_storage(doug, perms_slot(addr, idx), h256_from_u64(grant as u64));
}

/// `public:<perm>` nonzero, or `perms[addr][locator(perm)]` nonzero.
pub fn has_permission(doug: Address, addr: Address, perm: &str, state: &dyn StateView) -> bool {
    if !state.get_storage(doug, public_slot(perm)).is_zero() {
        return true;
    }
    match locator(doug, perm, state) {
        Some(idx) => !state.get_storage(doug, perms_slot(addr, idx)).is_zero(),
        None => false,
    }
}

pub fn set_scalar(doug: Address, name: &str, value: U256, state: &dyn StateWriter) {
    let mut buf = [0u8; 32];
    value.to_big_endian(&mut buf);
    state.set_storage(doug, scalar_slot(name), H256::from(buf));
}

/// `None` when the scalar was never set (the all-zero sentinel).
pub fn get_scalar(doug: Address, name: &str, state: &dyn StateView) -> Option<U256> {
    let raw = state.get_storage(doug, scalar_slot(name));
    if raw.is_zero() {
        None
    } else {
        Some(U256::from_big_endian(raw.as_bytes()))
    }
}

/// Appends `addr` to the `"seq:name"` miner ring, closing the loop so the
/// last entry's `next` always points back to the head.
pub fn push_miner(doug: Address, addr: Address, state: &dyn StateWriter) {
    let len_slot = seq_len_slot();
    let len = U256::from_big_endian(state.get_storage(doug, len_slot).as_bytes()).as_u64();

    if len == 0 {
        state.set_storage(doug, seq_head_slot(), h256_from_address(addr));
        state.set_storage(doug, seq_next_slot(addr), h256_from_address(addr));
    } else {
        let head = address_from_h256(state.get_storage(doug, seq_head_slot()));
        let mut tail = head;
        for _ in 0..len - 1 {
            tail = address_from_h256(state.get_storage(doug, seq_next_slot(tail)));
        }
        state.set_storage(doug, seq_next_slot(tail), h256_from_address(addr));
        state.set_storage(doug, seq_next_slot(addr), h256_from_address(head));
    }
    state.set_storage(doug, len_slot, h256_from_u64(len + 1));
}

pub fn ring_len(doug: Address, state: &dyn StateView) -> u64 {
    U256::from_big_endian(state.get_storage(doug, seq_len_slot()).as_bytes()).as_u64()
}

pub fn ring_head(doug: Address, state: &dyn StateView) -> Option<Address> {
    if ring_len(doug, state) == 0 {
        return None;
    }
    Some(address_from_h256(state.get_storage(doug, seq_head_slot())))
}

pub fn ring_next(doug: Address, addr: Address, state: &dyn StateView) -> Address {
    address_from_h256(state.get_storage(doug, seq_next_slot(addr)))
}

/// Walks `steps` hops forward from the ring head, wrapping via `ring_len`.
pub fn nth_from_head(doug: Address, steps: u64, state: &dyn StateView) -> Option<Address> {
    let len = ring_len(doug, state);
    if len == 0 {
        return None;
    }
    let mut cur = ring_head(doug, state)?;
    for _ in 0..(steps % len) {
        cur = ring_next(doug, cur, state);
    }
    Some(cur)
}

/// Number of forward hops from `from` to `to` around the ring, or `None`
/// if `to` is never reached within one full loop (not a ring member).
pub fn distance(doug: Address, from: Address, to: Address, state: &dyn StateView) -> Option<u64> {
    let len = ring_len(doug, state);
    let mut cur = from;
    for i in 0..len {
        if cur == to {
            return Some(i);
        }
        cur = ring_next(doug, cur, state);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::mock::MockState;

    fn doug() -> Address {
        Address::repeat_byte(0xaa)
    }

    #[test]
    fn locator_assigns_sequential_indices() {
        let state = MockState::default();
        assert_eq!(register_permission(doug(), "mine", &state), 0);
        assert_eq!(register_permission(doug(), "transact", &state), 1);
        assert_eq!(register_permission(doug(), "create", &state), 2);
        assert_eq!(locator(doug(), "transact", &state), Some(1));
        assert_eq!(locator(doug(), "nonexistent", &state), None);
    }

    #[test]
    fn register_permission_is_idempotent() {
        let state = MockState::default();
        let first = register_permission(doug(), "mine", &state);
        let second = register_permission(doug(), "mine", &state);
        assert_eq!(first, second);
    }

    #[test]
    fn has_permission_checks_public_then_per_address() {
        let state = MockState::default();
        register_permission(doug(), "transact", &state);
        let alice = Address::repeat_byte(0x01);
        let bob = Address::repeat_byte(0x02);

        assert!(!has_permission(doug(), alice, "transact", &state));
        set_permission(doug(), alice, "transact", true, &state);
        assert!(has_permission(doug(), alice, "transact", &state));
        assert!(!has_permission(doug(), bob, "transact", &state));

        set_public_permission(doug(), "transact", &state);
        assert!(has_permission(doug(), bob, "transact", &state));
    }

    #[test]
    fn scalars_round_trip_and_are_absent_by_default() {
        let state = MockState::default();
        assert_eq!(get_scalar(doug(), "blocktime", &state), None);
        set_scalar(doug(), "blocktime", U256::from(15u64), &state);
        assert_eq!(get_scalar(doug(), "blocktime", &state), Some(U256::from(15u64)));
    }

    #[test]
    fn ring_is_circular_and_distance_wraps() {
        let state = MockState::default();
        let a = Address::repeat_byte(0x01);
        let b = Address::repeat_byte(0x02);
        let c = Address::repeat_byte(0x03);
        push_miner(doug(), a, &state);
        push_miner(doug(), b, &state);
        push_miner(doug(), c, &state);

        assert_eq!(ring_len(doug(), &state), 3);
        assert_eq!(ring_head(doug(), &state), Some(a));
        assert_eq!(ring_next(doug(), c, &state), a);
        assert_eq!(distance(doug(), a, c, &state), Some(2));
        assert_eq!(distance(doug(), c, a, &state), Some(1));
        assert_eq!(nth_from_head(doug(), 4, &state), Some(b));
    }

    #[test]
    fn single_member_ring_self_loops() {
        let state = MockState::default();
        let a = Address::repeat_byte(0x01);
        push_miner(doug(), a, &state);
        assert_eq!(ring_next(doug(), a, &state), a);
        assert_eq!(distance(doug(), a, a, &state), Some(0));
    }
}
