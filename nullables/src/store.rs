//! Nullable chain store: thread-safe in-memory storage for testing.

use std::collections::BTreeMap;
use std::sync::Mutex;

use pof_state::layer::Lookup;
use pof_state::{AccountDataKey, ProcessDataKey, StateLayer};
use pof_store::{check_append, ChainStore, StoreError};
use pof_transactions::Block;
use pof_types::{Account, Address, ChainParams, Hash256, Header, Timestamp, Utxo};

#[derive(Clone, Copy)]
struct Tip {
    height: u32,
    hash: Hash256,
    timestamp: Timestamp,
}

#[derive(Default)]
struct Inner {
    tip: Option<Tip>,
    blocks: BTreeMap<u32, Block>,
    /// All committed writes folded into one layer.
    state: StateLayer,
}

/// An in-memory [`ChainStore`].
/// Thread-safe for use with tokio's multi-threaded runtime.
pub struct NullChainStore {
    params: ChainParams,
    inner: Mutex<Inner>,
}

impl NullChainStore {
    pub fn new(params: ChainParams) -> Self {
        Self {
            params,
            inner: Mutex::new(Inner::default()),
        }
    }

    /// A store that reports `height` as its tip without holding the blocks
    /// below it. State starts as `state`.
    pub fn with_tip(
        params: ChainParams,
        height: u32,
        hash: Hash256,
        timestamp: Timestamp,
        state: StateLayer,
    ) -> Self {
        Self {
            params,
            inner: Mutex::new(Inner {
                tip: Some(Tip {
                    height,
                    hash,
                    timestamp,
                }),
                blocks: BTreeMap::new(),
                state,
            }),
        }
    }

    /// Number of blocks actually held.
    pub fn block_count(&self) -> usize {
        self.inner.lock().unwrap().blocks.len()
    }

    fn read<T>(&self, f: impl FnOnce(&StateLayer) -> Option<Lookup<T>>) -> Option<T> {
        match f(&self.inner.lock().unwrap().state) {
            Some(Lookup::Found(v)) => Some(v),
            _ => None,
        }
    }

    fn commit(inner: &mut Inner, block: &Block, state: &StateLayer) {
        inner.blocks.insert(block.height(), block.clone());
        inner.state.merge(state.clone());
        inner.tip = Some(Tip {
            height: block.height(),
            hash: block.hash(),
            timestamp: block.header.timestamp,
        });
    }
}

impl ChainStore for NullChainStore {
    fn params(&self) -> ChainParams {
        self.params.clone()
    }

    fn height(&self) -> u32 {
        self.inner.lock().unwrap().tip.map(|t| t.height).unwrap_or(0)
    }

    fn last_hash(&self) -> Hash256 {
        self.inner
            .lock()
            .unwrap()
            .tip
            .map(|t| t.hash)
            .unwrap_or(Hash256::ZERO)
    }

    fn last_timestamp(&self) -> Timestamp {
        self.inner
            .lock()
            .unwrap()
            .tip
            .map(|t| t.timestamp)
            .unwrap_or(Timestamp::EPOCH)
    }

    fn hash(&self, height: u32) -> Result<Option<Hash256>, StoreError> {
        let inner = self.inner.lock().unwrap();
        if let Some(block) = inner.blocks.get(&height) {
            return Ok(Some(block.hash()));
        }
        Ok(inner.tip.filter(|t| t.height == height).map(|t| t.hash))
    }

    fn header(&self, height: u32) -> Result<Option<Header>, StoreError> {
        Ok(self.block(height)?.map(|b| b.header))
    }

    fn block(&self, height: u32) -> Result<Option<Block>, StoreError> {
        Ok(self.inner.lock().unwrap().blocks.get(&height).cloned())
    }

    fn seq(&self, address: &Address) -> Result<u64, StoreError> {
        Ok(self.inner.lock().unwrap().state.seq(address).unwrap_or(0))
    }

    fn account(&self, address: &Address) -> Result<Option<Account>, StoreError> {
        Ok(self.read(|s| s.account(address).map(|l| l.map(|a| a.clone()))))
    }

    fn address_by_name(&self, name: &str) -> Result<Option<Address>, StoreError> {
        Ok(self.read(|s| s.address_by_name(name)))
    }

    fn account_data(&self, key: &AccountDataKey) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.read(|s| s.account_data(key).map(|l| l.map(|v| v.clone()))))
    }

    fn process_data(&self, key: &ProcessDataKey) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.read(|s| s.process_data(key).map(|l| l.map(|v| v.clone()))))
    }

    fn utxo(&self, id: u64) -> Result<Option<Utxo>, StoreError> {
        Ok(self.read(|s| s.utxo(id)))
    }

    fn init_genesis(&self, block: &Block, state: &StateLayer) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.tip.is_some() {
            return match inner.blocks.get(&0) {
                Some(existing) if existing.hash() == block.hash() => Ok(false),
                _ => Err(StoreError::GenesisMismatch),
            };
        }
        if block.height() != 0 {
            return Err(StoreError::InvalidAppendHeight {
                height: 0,
                got: block.height(),
            });
        }
        Self::commit(&mut inner, block, state);
        Ok(true)
    }

    fn store_block(&self, block: &Block, state: &StateLayer) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().unwrap();
        let tip = inner.tip.ok_or(StoreError::NotInitialized)?;
        check_append(tip.height, &tip.hash, block)?;
        Self::commit(&mut inner, block, state);
        Ok(())
    }
}
