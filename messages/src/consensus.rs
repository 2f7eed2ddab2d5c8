//! Block request, generation and finalization records.

use pof_transactions::Block;
use pof_types::{Address, BlockSign, Hash256, PublicHash, Signature};
use serde::{Deserialize, Serialize};

/// An observer asks a formulator to generate blocks from `target_height`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockReqMessage {
    pub prev_hash: Hash256,
    pub target_height: u32,
    pub timeout_count: u32,
    pub formulator: Address,
    pub formulator_public_hash: PublicHash,
}

/// A generated block with the generator's signature over its header hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockGenMessage {
    pub block: Block,
    pub generator_signature: Signature,
    pub is_reply: bool,
}

impl BlockGenMessage {
    pub fn target_height(&self) -> u32 {
        self.block.header.height
    }

    pub fn block_sign(&self) -> BlockSign {
        BlockSign {
            header_hash: self.block.hash(),
            generator_signature: self.generator_signature,
        }
    }
}

/// Observer finalization signatures for the block identified by `block_sign`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockObSignMessage {
    pub target_height: u32,
    pub block_sign: BlockSign,
    pub observer_signatures: Vec<Signature>,
}
