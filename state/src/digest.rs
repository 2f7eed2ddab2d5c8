//! Deterministic digest of a context's identity and writes.
//!
//! Fields are written in a fixed order, each as `label || len || bytes`.
//! Maps contribute the hash of their canonical encoding; tombstones are
//! enumerated key by key in sorted order. Any change to this layout is a
//! consensus change.

use pof_crypto::{double_hash, hash_of};
use pof_types::Hash256;

use crate::context::ContextIdentity;
use crate::layer::StateLayer;

pub fn state_digest(identity: &ContextIdentity, state: &StateLayer) -> Hash256 {
    let mut buf = Vec::with_capacity(1024);

    field(&mut buf, b"ChainID", &[identity.params.chain_id]);
    field(&mut buf, b"ChainName", identity.params.name.as_bytes());
    field(&mut buf, b"ChainVersion", &identity.params.version.to_le_bytes());
    field(&mut buf, b"Height", &identity.target_height.to_le_bytes());
    field(&mut buf, b"PrevHash", identity.last_hash.as_bytes());

    field(&mut buf, b"SeqMap", hash_of(&state.seqs).as_bytes());
    field(&mut buf, b"AccountMap", hash_of(&state.accounts).as_bytes());
    let deleted: Vec<u8> = state
        .deleted_accounts
        .iter()
        .flat_map(|a| a.as_bytes().to_vec())
        .collect();
    field(&mut buf, b"DeletedAccountMap", &deleted);

    field(&mut buf, b"AccountNameMap", hash_of(&state.account_names).as_bytes());
    let mut deleted = Vec::new();
    for name in &state.deleted_account_names {
        deleted.extend_from_slice(&(name.len() as u32).to_le_bytes());
        deleted.extend_from_slice(name.as_bytes());
    }
    field(&mut buf, b"DeletedAccountNameMap", &deleted);

    field(&mut buf, b"AccountDataMap", hash_of(&state.account_data).as_bytes());
    let deleted: Vec<u8> = state
        .deleted_account_data
        .iter()
        .flat_map(|k| hash_of(k).as_bytes().to_vec())
        .collect();
    field(&mut buf, b"DeletedAccountDataMap", &deleted);

    field(&mut buf, b"CreatedUTXOMap", hash_of(&state.created_utxos).as_bytes());
    let deleted: Vec<u8> = state
        .deleted_utxos
        .iter()
        .flat_map(|id| id.to_le_bytes())
        .collect();
    field(&mut buf, b"DeletedUTXOMap", &deleted);

    let events: Vec<u8> = state
        .events
        .iter()
        .flat_map(|e| hash_of(e).as_bytes().to_vec())
        .collect();
    field(&mut buf, b"Events", &events);

    field(&mut buf, b"ProcessDataMap", hash_of(&state.process_data).as_bytes());
    let deleted: Vec<u8> = state
        .deleted_process_data
        .iter()
        .flat_map(|k| hash_of(k).as_bytes().to_vec())
        .collect();
    field(&mut buf, b"DeletedProcessDataMap", &deleted);

    double_hash(&buf)
}

fn field(buf: &mut Vec<u8>, label: &[u8], value: &[u8]) {
    buf.extend_from_slice(label);
    buf.extend_from_slice(&(value.len() as u32).to_le_bytes());
    buf.extend_from_slice(value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pof_types::{Address, ChainParams, Timestamp};

    fn identity() -> ContextIdentity {
        ContextIdentity {
            params: ChainParams::default(),
            target_height: 3,
            last_hash: Hash256::ZERO,
            last_timestamp: Timestamp::EPOCH,
        }
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let mut a = StateLayer::default();
        a.deleted_accounts.insert(Address::new(1, 2, 0));
        a.deleted_accounts.insert(Address::new(1, 1, 0));
        let mut b = StateLayer::default();
        b.deleted_accounts.insert(Address::new(1, 1, 0));
        b.deleted_accounts.insert(Address::new(1, 2, 0));
        assert_eq!(state_digest(&identity(), &a), state_digest(&identity(), &b));
    }

    #[test]
    fn tombstones_change_the_digest() {
        let empty = StateLayer::default();
        let mut deleted = StateLayer::default();
        deleted.deleted_utxos.insert(5);
        assert_ne!(
            state_digest(&identity(), &empty),
            state_digest(&identity(), &deleted)
        );
    }

    #[test]
    fn read_cache_does_not_change_the_digest() {
        let empty = StateLayer::default();
        let mut cached = StateLayer::default();
        cached.cache.seqs.insert(Address::new(1, 1, 0), 9);
        assert_eq!(
            state_digest(&identity(), &empty),
            state_digest(&identity(), &cached)
        );
    }
}
