//! Committed blocks and the state they produced.

use pof_state::{AccountDataKey, ProcessDataKey, StateLayer};
use pof_transactions::Block;
use pof_types::{Account, Address, ChainParams, Hash256, Header, Timestamp, Utxo};

use crate::StoreError;

/// Append-only block storage together with the committed state.
///
/// The tip accessors are infallible; backends keep the tip in memory and
/// update it only after a block and its state are durably written together.
pub trait ChainStore: Send + Sync {
    fn params(&self) -> ChainParams;

    /// Height of the last committed block. The genesis block is height 0.
    fn height(&self) -> u32;

    fn last_hash(&self) -> Hash256;

    fn last_timestamp(&self) -> Timestamp;

    fn hash(&self, height: u32) -> Result<Option<Hash256>, StoreError>;

    fn header(&self, height: u32) -> Result<Option<Header>, StoreError>;

    fn block(&self, height: u32) -> Result<Option<Block>, StoreError>;

    fn seq(&self, address: &Address) -> Result<u64, StoreError>;

    fn account(&self, address: &Address) -> Result<Option<Account>, StoreError>;

    fn address_by_name(&self, name: &str) -> Result<Option<Address>, StoreError>;

    fn account_data(&self, key: &AccountDataKey) -> Result<Option<Vec<u8>>, StoreError>;

    fn process_data(&self, key: &ProcessDataKey) -> Result<Option<Vec<u8>>, StoreError>;

    fn utxo(&self, id: u64) -> Result<Option<Utxo>, StoreError>;

    /// Write the genesis block and state into an empty store.
    ///
    /// Returns `false` if the store already holds the same genesis block and
    /// [`StoreError::GenesisMismatch`] if it holds a different one.
    fn init_genesis(&self, block: &Block, state: &StateLayer) -> Result<bool, StoreError>;

    /// Commit the block at `height() + 1` and the state it produced in one
    /// atomic write.
    fn store_block(&self, block: &Block, state: &StateLayer) -> Result<(), StoreError>;

    /// Visit committed blocks from `from` upward until the tip or until `f`
    /// returns `false`.
    fn iter_blocks(&self, from: u32, f: &mut dyn FnMut(&Block) -> bool) -> Result<(), StoreError> {
        let mut height = from;
        while height <= self.height() {
            let block = self
                .block(height)?
                .ok_or_else(|| StoreError::NotFound(format!("block {height}")))?;
            if !f(&block) {
                break;
            }
            height += 1;
        }
        Ok(())
    }
}

/// Check that `block` extends the tip described by `height` and `last_hash`.
pub fn check_append(height: u32, last_hash: &Hash256, block: &Block) -> Result<(), StoreError> {
    if block.header.height != height + 1 {
        return Err(StoreError::InvalidAppendHeight {
            height,
            got: block.header.height,
        });
    }
    if block.header.prev_hash != *last_hash {
        return Err(StoreError::InvalidPrevHash);
    }
    Ok(())
}
