//! Block header and the record observers sign to finalize a block.

use serde::{Deserialize, Serialize};

use crate::address::Address;
use crate::hash::Hash256;
use crate::keys::Signature;
use crate::time::Timestamp;

/// Block header. Its hash identifies the block and is what the generator signs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub chain_id: u8,
    pub version: u16,
    pub height: u32,
    pub prev_hash: Hash256,
    /// 16-ary fold of the block's transaction hashes.
    pub level_root_hash: Hash256,
    /// Digest of the state layer produced by executing this block.
    pub context_hash: Hash256,
    pub timestamp: Timestamp,
    pub generator: Address,
    /// Opaque to the chain; the consensus layer stores the timeout count here.
    pub consensus_data: Vec<u8>,
}

/// The generator's commitment to a header. Observers sign the hash of this
/// record, so a finalization signature binds both the header and the generator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSign {
    pub header_hash: Hash256,
    pub generator_signature: Signature,
}
