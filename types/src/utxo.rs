//! Unspent transaction outputs tracked alongside account state.

use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::keys::PublicHash;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    pub public_hash: PublicHash,
    pub amount: Amount,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub id: u64,
    pub tx_out: TxOut,
}

/// Packs the creating block height, transaction index and output index into one id.
pub fn utxo_id(height: u32, index: u16, n: u16) -> u64 {
    (u64::from(height) << 32) | (u64::from(index) << 16) | u64::from(n)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_sort_by_height_then_index() {
        assert!(utxo_id(1, 9, 9) < utxo_id(2, 0, 0));
        assert!(utxo_id(2, 0, 9) < utxo_id(2, 1, 0));
        assert_eq!(utxo_id(0, 0, 7), 7);
    }
}
