//! Chain identity and process identifiers.

use serde::{Deserialize, Serialize};

/// Process id of the consensus pseudo-process that owns the rank schedule.
pub const CONSENSUS_PID: u8 = 0xFF;
/// Process id of the vault (balances and transfers).
pub const VAULT_PID: u8 = 0x01;
/// Process id of the formulator registry.
pub const FORMULATOR_PID: u8 = 0x02;

/// Identity of a chain. Every state digest commits to these fields.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainParams {
    pub chain_id: u8,
    pub name: String,
    pub version: u16,
}

impl Default for ChainParams {
    fn default() -> Self {
        Self {
            chain_id: 0x01,
            name: "pof-mainnet".to_string(),
            version: 1,
        }
    }
}
