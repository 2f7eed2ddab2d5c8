//! Composite keys for opaque per-account and per-process data.

use pof_types::Address;
use serde::{Deserialize, Serialize};

/// Data owned by one process for one account.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountDataKey {
    pub address: Address,
    pub pid: u8,
    pub name: Vec<u8>,
}

/// Data owned by one process, not tied to an account.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ProcessDataKey {
    pub pid: u8,
    pub name: Vec<u8>,
}

impl AccountDataKey {
    pub fn new(address: Address, pid: u8, name: impl Into<Vec<u8>>) -> Self {
        Self {
            address,
            pid,
            name: name.into(),
        }
    }
}

impl ProcessDataKey {
    pub fn new(pid: u8, name: impl Into<Vec<u8>>) -> Self {
        Self {
            pid,
            name: name.into(),
        }
    }
}
