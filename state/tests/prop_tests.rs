use std::sync::Arc;

use proptest::prelude::*;

use pof_state::{Context, ContextIdentity, EmptyLoader, Loader, ProcessDataKey, StateError};
use pof_types::{Account, Address, ChainParams, Hash256, Timestamp, Utxo};

/// Root state: every key `k` maps to `[k]`.
struct FilledLoader;

impl Loader for FilledLoader {
    fn load_seq(&self, _address: &Address) -> Result<u64, StateError> {
        Ok(0)
    }
    fn load_account(&self, _address: &Address) -> Result<Option<Account>, StateError> {
        Ok(None)
    }
    fn load_address_by_name(&self, _name: &str) -> Result<Option<Address>, StateError> {
        Ok(None)
    }
    fn load_account_data(
        &self,
        _key: &pof_state::AccountDataKey,
    ) -> Result<Option<Vec<u8>>, StateError> {
        Ok(None)
    }
    fn load_process_data(&self, key: &ProcessDataKey) -> Result<Option<Vec<u8>>, StateError> {
        Ok(Some(key.name.clone()))
    }
    fn load_utxo(&self, _id: u64) -> Result<Option<Utxo>, StateError> {
        Ok(None)
    }
}

fn identity() -> ContextIdentity {
    ContextIdentity {
        params: ChainParams::default(),
        target_height: 10,
        last_hash: Hash256::ZERO,
        last_timestamp: Timestamp::EPOCH,
    }
}

#[derive(Clone, Debug)]
enum Op {
    Set(u8, u8),
    Delete(u8),
    Snapshot,
    Commit,
    Revert,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0u8..8, 1u8..255).prop_map(|(k, v)| Op::Set(k, v)),
        (0u8..8).prop_map(Op::Delete),
        Just(Op::Snapshot),
        Just(Op::Commit),
        Just(Op::Revert),
    ]
}

fn key(k: u8) -> ProcessDataKey {
    ProcessDataKey::new(1, vec![k])
}

fn view(ctx: &mut Context) -> Vec<Option<Vec<u8>>> {
    (0u8..8).map(|k| ctx.process_data(&key(k)).unwrap()).collect()
}

proptest! {
    /// A key never written in any layer reads the loader's value.
    #[test]
    fn untouched_keys_read_through(ops in prop::collection::vec(op(), 0..40)) {
        let mut ctx = Context::new(Arc::new(FilledLoader), identity());
        let mut snapshots = Vec::new();
        for op in ops {
            match op {
                // Only keys below 4 are ever written.
                Op::Set(k, v) => ctx.set_process_data(key(k % 4), vec![v]),
                Op::Delete(k) => ctx.set_process_data(key(k % 4), Vec::new()),
                Op::Snapshot => snapshots.push(ctx.snapshot()),
                Op::Commit => if let Some(sn) = snapshots.pop() { ctx.commit(sn).unwrap() },
                Op::Revert => if let Some(sn) = snapshots.pop() { ctx.revert(sn).unwrap() },
            }
        }
        for k in 4u8..8 {
            prop_assert_eq!(ctx.process_data(&key(k)).unwrap(), Some(vec![k]));
        }
    }

    /// A tombstoned key reads absent even though the loader has it.
    #[test]
    fn tombstones_shadow_loader(k in 0u8..8, depth in 0usize..4) {
        let mut ctx = Context::new(Arc::new(FilledLoader), identity());
        ctx.set_process_data(key(k), Vec::new());
        for _ in 0..depth {
            ctx.snapshot();
        }
        prop_assert_eq!(ctx.process_data(&key(k)).unwrap(), None);
    }

    /// write -> snapshot -> writes -> revert restores the view before the snapshot.
    #[test]
    fn revert_round_trip(
        before in prop::collection::vec((0u8..8, 1u8..255), 0..10),
        after in prop::collection::vec(op(), 0..30),
    ) {
        let mut ctx = Context::new(Arc::new(FilledLoader), identity());
        for (k, v) in before {
            ctx.set_process_data(key(k), vec![v]);
        }
        let expected = view(&mut ctx);
        let hash_before = ctx.hash();

        let sn = ctx.snapshot();
        let mut inner = Vec::new();
        for op in after {
            match op {
                Op::Set(k, v) => ctx.set_process_data(key(k), vec![v]),
                Op::Delete(k) => ctx.set_process_data(key(k), Vec::new()),
                Op::Snapshot => inner.push(ctx.snapshot()),
                Op::Commit => if let Some(s) = inner.pop() { ctx.commit(s).unwrap() },
                Op::Revert => if let Some(s) = inner.pop() { ctx.revert(s).unwrap() },
            }
        }
        ctx.revert(sn).unwrap();

        prop_assert_eq!(view(&mut ctx), expected);
        prop_assert_eq!(ctx.hash(), hash_before);
    }

    /// Committing layers one by one gives the same digest as writing flat.
    #[test]
    fn commit_is_equivalent_to_flat_writes(writes in prop::collection::vec((0u8..8, 0u8..255), 1..20)) {
        let mut layered = Context::new(Arc::new(EmptyLoader), identity());
        let mut flat = Context::new(Arc::new(EmptyLoader), identity());
        for (k, v) in &writes {
            let value = if *v == 0 { Vec::new() } else { vec![*v] };
            let sn = layered.snapshot();
            layered.set_process_data(key(*k), value.clone());
            layered.commit(sn).unwrap();
            flat.set_process_data(key(*k), value);
        }
        prop_assert_eq!(layered.hash(), flat.hash());
    }
}
