//! Reconciliation of generated blocks and observer signatures per height.
//!
//! A `BlockGen` and the matching `BlockObSign` may arrive in either order.
//! The table merges them idempotently; a height becomes committable once its
//! item holds both and the signature references the generated header.

use std::collections::BTreeMap;
use std::sync::Arc;

use pof_messages::{BlockGenMessage, BlockObSignMessage};
use pof_state::Context;
use pof_transactions::Block;

use crate::ConsensusError;

#[derive(Clone, Default)]
pub struct GenItem {
    pub block_gen: Option<BlockGenMessage>,
    pub ob_sign: Option<BlockObSignMessage>,
    /// The context the generated block was executed on, if any.
    pub context: Option<Arc<Context>>,
    /// True when the block came from a peer rather than local generation.
    pub received: bool,
}

impl std::fmt::Debug for GenItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenItem")
            .field("block_gen", &self.block_gen.as_ref().map(|g| g.block.hash()))
            .field("ob_sign", &self.ob_sign.as_ref().map(|s| s.block_sign.header_hash))
            .field("has_context", &self.context.is_some())
            .field("received", &self.received)
            .finish()
    }
}

impl GenItem {
    /// The finalized block, when both halves are present and agree.
    ///
    /// Its signatures are the generator signature the observers signed over,
    /// followed by the observers' own.
    pub fn assemble(&self) -> Option<Block> {
        let gen = self.block_gen.as_ref()?;
        let sign = self.ob_sign.as_ref()?;
        if sign.block_sign.header_hash != gen.block.hash() {
            return None;
        }
        let mut block = gen.block.clone();
        block.signatures = std::iter::once(sign.block_sign.generator_signature)
            .chain(sign.observer_signatures.iter().copied())
            .collect();
        Some(block)
    }
}

/// What merging an observer signature did to the item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ObSignOutcome {
    /// No block was stored yet, or the stored block matches.
    Stored,
    /// The stored block referenced a different header and was dropped.
    InvalidatedBlockGen,
}

#[derive(Default)]
pub struct GenItemTable {
    items: BTreeMap<u32, GenItem>,
}

impl GenItemTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, height: u32) -> Option<&GenItem> {
        self.items.get(&height)
    }

    pub fn get_mut(&mut self, height: u32) -> Option<&mut GenItem> {
        self.items.get_mut(&height)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Record a block this node generated and the context it produced.
    pub fn insert_generated(&mut self, block_gen: BlockGenMessage, context: Arc<Context>) {
        let height = block_gen.target_height();
        let ob_sign = self.items.remove(&height).and_then(|item| item.ob_sign);
        self.items.insert(
            height,
            GenItem {
                block_gen: Some(block_gen),
                ob_sign,
                context: Some(context),
                received: false,
            },
        );
    }

    /// Merge a block received from a peer.
    ///
    /// Fails if observers already signed a different header at this height.
    pub fn merge_block_gen(&mut self, block_gen: BlockGenMessage) -> Result<(), ConsensusError> {
        let height = block_gen.target_height();
        let hash = block_gen.block.hash();
        let item = self.items.entry(height).or_default();
        if let Some(sign) = &item.ob_sign {
            if sign.block_sign.header_hash != hash {
                return Err(ConsensusError::InvalidRequest("block does not match observer signature"));
            }
        }
        let same_block = item
            .block_gen
            .as_ref()
            .is_some_and(|existing| existing.block.hash() == hash);
        if !same_block {
            item.context = None;
        }
        item.block_gen = Some(block_gen);
        item.received = true;
        Ok(())
    }

    /// Merge observer signatures. A stored block with a different header is
    /// dropped together with its context.
    pub fn merge_ob_sign(&mut self, ob_sign: BlockObSignMessage) -> ObSignOutcome {
        let item = self.items.entry(ob_sign.target_height).or_default();
        let mut outcome = ObSignOutcome::Stored;
        if let Some(gen) = &item.block_gen {
            if gen.block.hash() != ob_sign.block_sign.header_hash {
                item.block_gen = None;
                item.context = None;
                outcome = ObSignOutcome::InvalidatedBlockGen;
            }
        }
        item.ob_sign = Some(ob_sign);
        outcome
    }

    pub fn remove(&mut self, height: u32) -> Option<GenItem> {
        self.items.remove(&height)
    }

    /// Drop every item below `height`.
    pub fn prune_below(&mut self, height: u32) {
        self.items = self.items.split_off(&height);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pof_crypto::{keypair_from_seed, sign_hash};
    use pof_types::{Address, BlockSign, Hash256, Header, Timestamp};

    fn gen(height: u32, nonce: u8) -> BlockGenMessage {
        let block = Block::new(Header {
            chain_id: 1,
            version: 1,
            height,
            prev_hash: Hash256::new([nonce; 32]),
            level_root_hash: Hash256::ZERO,
            context_hash: Hash256::ZERO,
            timestamp: Timestamp::from_nanos(1),
            generator: Address::new(0, 0, 1),
            consensus_data: vec![0; 4],
        });
        let generator_signature = sign_hash(&block.hash(), &keypair_from_seed(&[1; 32]));
        BlockGenMessage {
            block,
            generator_signature,
            is_reply: false,
        }
    }

    fn sign_for(g: &BlockGenMessage) -> BlockObSignMessage {
        BlockObSignMessage {
            target_height: g.target_height(),
            block_sign: g.block_sign(),
            observer_signatures: vec![sign_hash(&Hash256::new([2; 32]), &keypair_from_seed(&[2; 32]))],
        }
    }

    #[test]
    fn mismatched_ob_sign_invalidates_block_gen() {
        let mut table = GenItemTable::new();
        let a = gen(5, 1);
        let b = gen(5, 2);
        table.merge_block_gen(a).unwrap();
        assert_eq!(table.merge_ob_sign(sign_for(&b)), ObSignOutcome::InvalidatedBlockGen);
        let item = table.get(5).unwrap();
        assert!(item.block_gen.is_none());
        assert!(item.context.is_none());
        assert!(item.assemble().is_none());
    }

    #[test]
    fn block_gen_must_match_existing_ob_sign() {
        let mut table = GenItemTable::new();
        let a = gen(5, 1);
        table.merge_ob_sign(sign_for(&a));
        assert!(table.merge_block_gen(gen(5, 2)).is_err());
        table.merge_block_gen(a.clone()).unwrap();
        let block = table.get(5).unwrap().assemble().unwrap();
        assert_eq!(block.signatures[0], a.generator_signature);
        assert_eq!(block.signatures.len(), 2);
    }

    #[test]
    fn assemble_rejects_foreign_block_sign() {
        let a = gen(5, 1);
        let item = GenItem {
            block_gen: Some(a),
            ob_sign: Some(BlockObSignMessage {
                target_height: 5,
                block_sign: BlockSign {
                    header_hash: Hash256::new([9; 32]),
                    generator_signature: sign_hash(&Hash256::ZERO, &keypair_from_seed(&[1; 32])),
                },
                observer_signatures: vec![],
            }),
            context: None,
            received: true,
        };
        assert!(item.assemble().is_none());
    }

    #[test]
    fn assemble_uses_the_signature_observers_signed() {
        let mut table = GenItemTable::new();
        let signed = gen(5, 1);
        table.merge_ob_sign(sign_for(&signed));
        let mut rebroadcast = signed.clone();
        rebroadcast.generator_signature = sign_hash(&rebroadcast.block.hash(), &keypair_from_seed(&[3; 32]));
        table.merge_block_gen(rebroadcast).unwrap();
        let block = table.get(5).unwrap().assemble().unwrap();
        assert_eq!(block.signatures[0], signed.generator_signature);
    }

    #[test]
    fn prune_keeps_current_and_later_heights() {
        let mut table = GenItemTable::new();
        for h in 3..8 {
            table.merge_block_gen(gen(h, 1)).unwrap();
        }
        table.prune_below(5);
        assert!(table.get(4).is_none());
        assert!(table.get(5).is_some());
        assert_eq!(table.len(), 3);
    }
}
