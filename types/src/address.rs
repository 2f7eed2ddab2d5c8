//! Account address type.
//!
//! An address is 14 bytes: the big-endian height at which it was created (u32),
//! the index of the creating transaction within that block (u16) and a nonce (u64).
//! Embedding the creation height lets state layers reject addresses that claim
//! to be created at a height other than the one being executed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TypeError;

pub const ADDRESS_SIZE: usize = 14;

#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address([u8; ADDRESS_SIZE]);

impl Address {
    pub const ZERO: Self = Self([0u8; ADDRESS_SIZE]);

    pub fn new(height: u32, index: u16, nonce: u64) -> Self {
        let mut bytes = [0u8; ADDRESS_SIZE];
        bytes[0..4].copy_from_slice(&height.to_be_bytes());
        bytes[4..6].copy_from_slice(&index.to_be_bytes());
        bytes[6..14].copy_from_slice(&nonce.to_be_bytes());
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; ADDRESS_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_SIZE] {
        &self.0
    }

    /// Height of the block whose execution created this address.
    pub fn height(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }

    pub fn index(&self) -> u16 {
        u16::from_be_bytes([self.0[4], self.0[5]])
    }

    pub fn nonce(&self) -> u64 {
        let mut n = [0u8; 8];
        n.copy_from_slice(&self.0[6..14]);
        u64::from_be_bytes(n)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_SIZE]
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", hex::encode(self.0))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidAddress(e.to_string()))?;
        let arr: [u8; ADDRESS_SIZE] = bytes.try_into().map_err(|v: Vec<u8>| {
            TypeError::InvalidAddress(format!("expected {ADDRESS_SIZE} bytes, got {}", v.len()))
        })?;
        Ok(Self(arr))
    }
}
