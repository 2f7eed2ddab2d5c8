//! The read-only source a context falls back to.

use pof_types::{Account, Address, Utxo};

use crate::error::StateError;
use crate::keys::{AccountDataKey, ProcessDataKey};

/// Committed (or frozen speculative) state beneath a context.
///
/// `Ok(None)` means the value is absent; errors are reserved for the backing
/// store failing.
pub trait Loader: Send + Sync {
    fn load_seq(&self, address: &Address) -> Result<u64, StateError>;
    fn load_account(&self, address: &Address) -> Result<Option<Account>, StateError>;
    fn load_address_by_name(&self, name: &str) -> Result<Option<Address>, StateError>;
    fn load_account_data(&self, key: &AccountDataKey) -> Result<Option<Vec<u8>>, StateError>;
    fn load_process_data(&self, key: &ProcessDataKey) -> Result<Option<Vec<u8>>, StateError>;
    fn load_utxo(&self, id: u64) -> Result<Option<Utxo>, StateError>;
}

/// A loader with no state at all. Genesis contexts start from it.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptyLoader;

impl Loader for EmptyLoader {
    fn load_seq(&self, _address: &Address) -> Result<u64, StateError> {
        Ok(0)
    }

    fn load_account(&self, _address: &Address) -> Result<Option<Account>, StateError> {
        Ok(None)
    }

    fn load_address_by_name(&self, _name: &str) -> Result<Option<Address>, StateError> {
        Ok(None)
    }

    fn load_account_data(&self, _key: &AccountDataKey) -> Result<Option<Vec<u8>>, StateError> {
        Ok(None)
    }

    fn load_process_data(&self, _key: &ProcessDataKey) -> Result<Option<Vec<u8>>, StateError> {
        Ok(None)
    }

    fn load_utxo(&self, _id: u64) -> Result<Option<Utxo>, StateError> {
        Ok(None)
    }
}
