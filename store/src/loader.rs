//! Exposes committed state to contexts.

use std::sync::Arc;

use pof_state::{AccountDataKey, Loader, ProcessDataKey, StateError};
use pof_types::{Account, Address, Utxo};

use crate::{ChainStore, StoreError};

/// A [`Loader`] reading the committed state of a [`ChainStore`].
#[derive(Clone)]
pub struct StoreLoader {
    store: Arc<dyn ChainStore>,
}

impl StoreLoader {
    pub fn new(store: Arc<dyn ChainStore>) -> Self {
        Self { store }
    }
}

fn loader_err(e: StoreError) -> StateError {
    StateError::Loader(e.to_string())
}

impl Loader for StoreLoader {
    fn load_seq(&self, address: &Address) -> Result<u64, StateError> {
        self.store.seq(address).map_err(loader_err)
    }

    fn load_account(&self, address: &Address) -> Result<Option<Account>, StateError> {
        self.store.account(address).map_err(loader_err)
    }

    fn load_address_by_name(&self, name: &str) -> Result<Option<Address>, StateError> {
        self.store.address_by_name(name).map_err(loader_err)
    }

    fn load_account_data(&self, key: &AccountDataKey) -> Result<Option<Vec<u8>>, StateError> {
        self.store.account_data(key).map_err(loader_err)
    }

    fn load_process_data(&self, key: &ProcessDataKey) -> Result<Option<Vec<u8>>, StateError> {
        self.store.process_data(key).map_err(loader_err)
    }

    fn load_utxo(&self, id: u64) -> Result<Option<Utxo>, StateError> {
        self.store.utxo(id).map_err(loader_err)
    }
}
