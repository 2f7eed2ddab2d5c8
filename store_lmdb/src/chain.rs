//! LMDB implementation of [`ChainStore`].

use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use heed::types::Bytes;
use heed::Database;

use pof_state::{AccountDataKey, ProcessDataKey, StateLayer};
use pof_store::{check_append, ChainStore, StoreError};
use pof_transactions::Block;
use pof_types::{Account, Address, ChainParams, Hash256, Header, Timestamp, TxOut, Utxo};

use crate::environment::LmdbEnvironment;
use crate::write_batch::{WriteBatch, HEIGHT_KEY};
use crate::LmdbError;

/// Default LMDB map size: 16 GiB.
pub const DEFAULT_MAP_SIZE: usize = 16 * 1024 * 1024 * 1024;

#[derive(Clone, Copy, Debug)]
struct Tip {
    height: u32,
    hash: Hash256,
    timestamp: Timestamp,
}

pub struct LmdbChainStore {
    env: LmdbEnvironment,
    params: ChainParams,
    /// `None` until the genesis block is written.
    tip: RwLock<Option<Tip>>,
}

impl LmdbChainStore {
    pub fn open(path: &Path, params: ChainParams) -> Result<Self, StoreError> {
        Self::open_with_map_size(path, params, DEFAULT_MAP_SIZE)
    }

    pub fn open_with_map_size(path: &Path, params: ChainParams, map_size: usize) -> Result<Self, StoreError> {
        let env = LmdbEnvironment::open(path, map_size)?;
        let store = Self {
            env,
            params,
            tip: RwLock::new(None),
        };
        let tip = store.read_tip()?;
        if let Some(tip) = &tip {
            tracing::info!(height = tip.height, hash = %tip.hash, "opened chain store");
        }
        *store.tip_write() = tip;
        Ok(store)
    }

    fn read_tip(&self) -> Result<Option<Tip>, StoreError> {
        let rtxn = self.env.env().read_txn().map_err(LmdbError::from)?;
        let Some(bytes) = self.env.meta_db.get(&rtxn, HEIGHT_KEY).map_err(LmdbError::from)? else {
            return Ok(None);
        };
        let arr: [u8; 4] = bytes
            .try_into()
            .map_err(|_| StoreError::Corruption("tip height has unexpected length".to_string()))?;
        let height = u32::from_le_bytes(arr);
        drop(rtxn);

        let header = self
            .header(height)?
            .ok_or_else(|| StoreError::Corruption(format!("missing tip block {height}")))?;
        let hash = self
            .hash(height)?
            .ok_or_else(|| StoreError::Corruption(format!("missing tip hash {height}")))?;
        Ok(Some(Tip {
            height,
            hash,
            timestamp: header.timestamp,
        }))
    }

    fn tip_read(&self) -> RwLockReadGuard<'_, Option<Tip>> {
        self.tip.read().unwrap_or_else(|e| e.into_inner())
    }

    fn tip_write(&self) -> RwLockWriteGuard<'_, Option<Tip>> {
        self.tip.write().unwrap_or_else(|e| e.into_inner())
    }

    fn get(&self, db: Database<Bytes, Bytes>, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let rtxn = self.env.env().read_txn().map_err(LmdbError::from)?;
        let value = db.get(&rtxn, key).map_err(LmdbError::from)?;
        Ok(value.map(<[u8]>::to_vec))
    }

    fn write_block(&self, block: &Block, state: &StateLayer) -> Result<(), StoreError> {
        let mut batch = WriteBatch::new(&self.env)?;
        batch.put_block(block)?;
        batch.apply_state(state)?;
        batch.commit()?;
        Ok(())
    }
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn encode<T: serde::Serialize>(value: &T) -> Result<Vec<u8>, StoreError> {
    bincode::serialize(value).map_err(|e| StoreError::Serialization(e.to_string()))
}

impl ChainStore for LmdbChainStore {
    fn params(&self) -> ChainParams {
        self.params.clone()
    }

    fn height(&self) -> u32 {
        self.tip_read().map(|t| t.height).unwrap_or(0)
    }

    fn last_hash(&self) -> Hash256 {
        self.tip_read().map(|t| t.hash).unwrap_or(Hash256::ZERO)
    }

    fn last_timestamp(&self) -> Timestamp {
        self.tip_read().map(|t| t.timestamp).unwrap_or(Timestamp::EPOCH)
    }

    fn hash(&self, height: u32) -> Result<Option<Hash256>, StoreError> {
        let Some(bytes) = self.get(self.env.hashes_db, &height.to_be_bytes())? else {
            return Ok(None);
        };
        let arr: [u8; 32] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| StoreError::Corruption(format!("hash at {height} has unexpected length")))?;
        Ok(Some(Hash256::new(arr)))
    }

    fn header(&self, height: u32) -> Result<Option<Header>, StoreError> {
        Ok(self.block(height)?.map(|b| b.header))
    }

    fn block(&self, height: u32) -> Result<Option<Block>, StoreError> {
        self.get(self.env.blocks_db, &height.to_be_bytes())?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    fn seq(&self, address: &Address) -> Result<u64, StoreError> {
        let Some(bytes) = self.get(self.env.seqs_db, address.as_bytes())? else {
            return Ok(0);
        };
        let arr: [u8; 8] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| StoreError::Corruption(format!("seq of {address} has unexpected length")))?;
        Ok(u64::from_le_bytes(arr))
    }

    fn account(&self, address: &Address) -> Result<Option<Account>, StoreError> {
        self.get(self.env.accounts_db, address.as_bytes())?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    fn address_by_name(&self, name: &str) -> Result<Option<Address>, StoreError> {
        let Some(bytes) = self.get(self.env.names_db, name.as_bytes())? else {
            return Ok(None);
        };
        let arr = bytes
            .as_slice()
            .try_into()
            .map_err(|_| StoreError::Corruption(format!("address of name {name} has unexpected length")))?;
        Ok(Some(Address::from_bytes(arr)))
    }

    fn account_data(&self, key: &AccountDataKey) -> Result<Option<Vec<u8>>, StoreError> {
        self.get(self.env.account_data_db, &encode(key)?)
    }

    fn process_data(&self, key: &ProcessDataKey) -> Result<Option<Vec<u8>>, StoreError> {
        self.get(self.env.process_data_db, &encode(key)?)
    }

    fn utxo(&self, id: u64) -> Result<Option<Utxo>, StoreError> {
        let Some(bytes) = self.get(self.env.utxos_db, &id.to_be_bytes())? else {
            return Ok(None);
        };
        let tx_out: TxOut = decode(&bytes)?;
        Ok(Some(Utxo { id, tx_out }))
    }

    fn init_genesis(&self, block: &Block, state: &StateLayer) -> Result<bool, StoreError> {
        let mut tip = self.tip_write();
        if tip.is_some() {
            return match self.hash(0)? {
                Some(hash) if hash == block.hash() => Ok(false),
                _ => Err(StoreError::GenesisMismatch),
            };
        }
        if block.height() != 0 {
            return Err(StoreError::InvalidAppendHeight {
                height: 0,
                got: block.height(),
            });
        }
        self.write_block(block, state)?;
        *tip = Some(Tip {
            height: 0,
            hash: block.hash(),
            timestamp: block.header.timestamp,
        });
        tracing::info!(hash = %block.hash(), "initialized genesis");
        Ok(true)
    }

    fn store_block(&self, block: &Block, state: &StateLayer) -> Result<(), StoreError> {
        let mut tip = self.tip_write();
        let current = tip.ok_or(StoreError::NotInitialized)?;
        check_append(current.height, &current.hash, block)?;
        self.write_block(block, state)?;
        *tip = Some(Tip {
            height: block.height(),
            hash: block.hash(),
            timestamp: block.header.timestamp,
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pof_types::PublicHash;

    const TEST_MAP_SIZE: usize = 64 * 1024 * 1024;

    fn header(height: u32, prev_hash: Hash256) -> Header {
        Header {
            chain_id: 1,
            version: 1,
            height,
            prev_hash,
            level_root_hash: Hash256::ZERO,
            context_hash: Hash256::ZERO,
            timestamp: Timestamp::from_nanos(u64::from(height) * 1_000),
            generator: Address::ZERO,
            consensus_data: vec![0; 4],
        }
    }

    fn open(dir: &Path) -> LmdbChainStore {
        LmdbChainStore::open_with_map_size(dir, ChainParams::default(), TEST_MAP_SIZE).unwrap()
    }

    fn genesis_state() -> StateLayer {
        let mut state = StateLayer::default();
        let account = Account::single(Address::new(0, 0, 1), "root", PublicHash([1; 32]));
        state.account_names.insert("root".to_string(), account.address);
        state.accounts.insert(account.address, account);
        state
    }

    #[test]
    fn genesis_then_append_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let genesis = Block::new(header(0, Hash256::ZERO));
        let next = Block::new(header(1, genesis.hash()));
        {
            let store = open(dir.path());
            assert!(store.init_genesis(&genesis, &genesis_state()).unwrap());
            let mut state = StateLayer::default();
            state.seqs.insert(Address::new(0, 0, 1), 1);
            state.deleted_account_names.insert("root".to_string());
            store.store_block(&next, &state).unwrap();
            assert_eq!(store.height(), 1);
        }

        let store = open(dir.path());
        assert_eq!(store.height(), 1);
        assert_eq!(store.last_hash(), next.hash());
        assert_eq!(store.last_timestamp(), Timestamp::from_nanos(1_000));
        assert_eq!(store.seq(&Address::new(0, 0, 1)).unwrap(), 1);
        assert!(store.account(&Address::new(0, 0, 1)).unwrap().is_some());
        assert_eq!(store.address_by_name("root").unwrap(), None);
        assert!(!store.init_genesis(&genesis, &StateLayer::default()).unwrap());
    }

    #[test]
    fn rejects_gaps_and_foreign_genesis() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(dir.path());
        let genesis = Block::new(header(0, Hash256::ZERO));
        store.init_genesis(&genesis, &StateLayer::default()).unwrap();

        let gap = Block::new(header(2, genesis.hash()));
        assert!(matches!(
            store.store_block(&gap, &StateLayer::default()),
            Err(StoreError::InvalidAppendHeight { height: 0, got: 2 })
        ));
        let wrong_prev = Block::new(header(1, Hash256::new([7; 32])));
        assert!(matches!(
            store.store_block(&wrong_prev, &StateLayer::default()),
            Err(StoreError::InvalidPrevHash)
        ));

        let mut other = header(0, Hash256::ZERO);
        other.chain_id = 2;
        assert!(matches!(
            store.init_genesis(&Block::new(other), &StateLayer::default()),
            Err(StoreError::GenesisMismatch)
        ));
    }

    #[test]
    fn iter_blocks_stops_when_asked() {
        let dir = tempfile::tempdir().unwrap();
        let store = open(dir.path());
        let genesis = Block::new(header(0, Hash256::ZERO));
        store.init_genesis(&genesis, &StateLayer::default()).unwrap();
        let mut prev = genesis.hash();
        for h in 1..=3 {
            let b = Block::new(header(h, prev));
            prev = b.hash();
            store.store_block(&b, &StateLayer::default()).unwrap();
        }
        let mut seen = Vec::new();
        store
            .iter_blocks(1, &mut |b| {
                seen.push(b.height());
                b.height() < 2
            })
            .unwrap();
        assert_eq!(seen, vec![1, 2]);
    }
}
