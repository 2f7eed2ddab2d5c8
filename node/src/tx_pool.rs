//! Pending transactions, queued per sending account in sequence order.
//!
//! Block generation drains the pool through [`PoolState::pop_for`] while
//! holding the pool-wide guard from [`TransactionPool::lock`]. Inserts take
//! the same guard, so a transaction cannot arrive for an account while that
//! account's next sequence is being judged against the block context.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound::{Excluded, Unbounded};

use pof_ledger::SignerMap;
use pof_state::Context;
use pof_transactions::{Block, Transaction};
use pof_types::{Address, Hash256, PublicHash, Signature};
use tokio::sync::{Mutex, MutexGuard};

use crate::NodeError;

#[derive(Clone, Debug)]
pub struct PoolItem {
    pub transaction: Transaction,
    pub hash: Hash256,
    pub signatures: Vec<Signature>,
    /// Signers recovered when the transaction entered the pool.
    pub signers: Vec<PublicHash>,
}

pub struct PoolState {
    items: HashMap<Hash256, PoolItem>,
    /// account → seq → hash
    queues: BTreeMap<Address, BTreeMap<u64, Hash256>>,
    /// Account served by the last pop; the next pop starts after it.
    cursor: Option<Address>,
    capacity: usize,
}

impl PoolState {
    fn new(capacity: usize) -> Self {
        Self {
            items: HashMap::new(),
            queues: BTreeMap::new(),
            cursor: None,
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, hash: &Hash256) -> bool {
        self.items.contains_key(hash)
    }

    pub fn signers(&self, hash: &Hash256) -> Option<&[PublicHash]> {
        self.items.get(hash).map(|i| i.signers.as_slice())
    }

    pub fn insert(&mut self, item: PoolItem) -> Result<(), NodeError> {
        if self.items.contains_key(&item.hash) {
            return Err(NodeError::TxExists);
        }
        if self.items.len() >= self.capacity {
            return Err(NodeError::TxPoolFull);
        }
        let from = *item.transaction.from();
        let seq = item.transaction.seq();
        let queue = self.queues.entry(from).or_default();
        if queue.contains_key(&seq) {
            return Err(NodeError::TxExists);
        }
        queue.insert(seq, item.hash);
        self.items.insert(item.hash, item);
        Ok(())
    }

    pub fn remove(&mut self, hash: &Hash256) -> Option<PoolItem> {
        let item = self.items.remove(hash)?;
        let from = *item.transaction.from();
        if let Some(queue) = self.queues.get_mut(&from) {
            queue.remove(&item.transaction.seq());
            if queue.is_empty() {
                self.queues.remove(&from);
            }
        }
        Some(item)
    }

    /// Take the next executable transaction for `ctx`: one whose sequence
    /// directly follows its sender's sequence on the context. Accounts are
    /// served round robin. Entries at or below the context's sequence are
    /// dropped on the way.
    ///
    /// Reading sequences may cache values on the context's top layer, so
    /// callers look ahead under a snapshot and revert it afterwards.
    pub fn pop_for(&mut self, ctx: &mut Context) -> Option<PoolItem> {
        let accounts: Vec<Address> = match self.cursor {
            Some(cursor) => self
                .queues
                .range((Excluded(cursor), Unbounded))
                .chain(self.queues.range(..=cursor))
                .map(|(a, _)| *a)
                .collect(),
            None => self.queues.keys().copied().collect(),
        };

        for address in accounts {
            let next_seq = match ctx.seq(&address) {
                Ok(seq) => seq + 1,
                Err(e) => {
                    tracing::debug!(%address, error = %e, "skipping account with unreadable sequence");
                    continue;
                }
            };
            let Some(queue) = self.queues.get_mut(&address) else {
                continue;
            };
            let stale: Vec<u64> = queue.range(..next_seq).map(|(s, _)| *s).collect();
            for seq in stale {
                if let Some(hash) = queue.remove(&seq) {
                    self.items.remove(&hash);
                }
            }
            let hit = queue.remove(&next_seq);
            if queue.is_empty() {
                self.queues.remove(&address);
            }
            if let Some(hash) = hit {
                self.cursor = Some(address);
                if let Some(item) = self.items.remove(&hash) {
                    return Some(item);
                }
            }
        }
        None
    }
}

pub struct TransactionPool {
    state: Mutex<PoolState>,
}

impl TransactionPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(PoolState::new(capacity)),
        }
    }

    /// The pool-wide exclusive section.
    pub async fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().await
    }

    pub async fn push(&self, item: PoolItem) -> Result<(), NodeError> {
        self.state.lock().await.insert(item)
    }

    pub async fn contains(&self, hash: &Hash256) -> bool {
        self.state.lock().await.contains(hash)
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.len()
    }

    /// Known signers for the block's transactions that are still pooled.
    pub async fn signer_map(&self, block: &Block) -> SignerMap {
        let state = self.state.lock().await;
        block
            .transaction_hashes()
            .into_iter()
            .filter_map(|h| state.signers(&h).map(|s| (h, s.to_vec())))
            .collect()
    }

    /// Drop the transactions a committed block included.
    pub async fn clean(&self, block: &Block) {
        let mut state = self.state.lock().await;
        for hash in block.transaction_hashes() {
            state.remove(&hash);
        }
    }
}
