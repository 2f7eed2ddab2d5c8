//! Building a block on a context, one transaction at a time.

use pof_consensus::{encode_timeout_count, RankPolicy};
use pof_state::Context;
use pof_transactions::{Block, Transaction};
use pof_types::{Address, Hash256, Header, PublicHash, Signature, Timestamp};

use crate::chain::finalize_consensus;
use crate::level_root::{level_root, MAX_LEVEL_HASHES};
use crate::LedgerError;

pub struct BlockCreator {
    ctx: Context,
    generator: Address,
    timeout_count: u32,
    policy: RankPolicy,
    transactions: Vec<Transaction>,
    signatures: Vec<Vec<Signature>>,
    hashes: Vec<Hash256>,
}

impl BlockCreator {
    pub fn new(ctx: Context, generator: Address, timeout_count: u32, policy: RankPolicy) -> Self {
        Self {
            ctx,
            generator,
            timeout_count,
            policy,
            transactions: Vec::new(),
            signatures: Vec::new(),
            hashes: Vec::new(),
        }
    }

    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Mutable access for callers that need to inspect state, e.g. the pool
    /// choosing the next transaction. Such reads must be reverted.
    pub fn context_mut(&mut self) -> &mut Context {
        &mut self.ctx
    }

    pub fn tx_count(&self) -> usize {
        self.transactions.len()
    }

    /// Execute `tx` and include it. A failing transaction leaves no trace.
    pub fn add_tx(
        &mut self,
        tx: Transaction,
        hash: Hash256,
        signatures: Vec<Signature>,
        signers: &[PublicHash],
    ) -> Result<(), LedgerError> {
        if self.transactions.len() >= MAX_LEVEL_HASHES {
            return Err(LedgerError::TooManyTransactions(self.transactions.len() + 1));
        }
        let index = u16::try_from(self.transactions.len())
            .map_err(|_| LedgerError::TooManyTransactions(self.transactions.len() + 1))?;
        let snapshot = self.ctx.snapshot();
        let applied = tx
            .validate(&mut self.ctx, signers)
            .and_then(|()| tx.execute(&mut self.ctx, index));
        if let Err(e) = applied {
            self.ctx.revert(snapshot)?;
            return Err(e.into());
        }
        self.ctx.commit(snapshot)?;
        self.transactions.push(tx);
        self.signatures.push(signatures);
        self.hashes.push(hash);
        Ok(())
    }

    /// Close the block at `timestamp`. Returns the unsigned block and the
    /// context holding its writes.
    pub fn finalize(mut self, timestamp: Timestamp) -> Result<(Block, Context), LedgerError> {
        if timestamp <= self.ctx.last_timestamp() {
            return Err(LedgerError::InvalidTimestamp);
        }
        finalize_consensus(&mut self.ctx, &self.generator, self.timeout_count, &self.policy)?;
        let params = self.ctx.chain_params().clone();
        let header = Header {
            chain_id: params.chain_id,
            version: params.version,
            height: self.ctx.target_height(),
            prev_hash: self.ctx.last_hash(),
            level_root_hash: level_root(&self.hashes)?,
            context_hash: self.ctx.hash(),
            timestamp,
            generator: self.generator,
            consensus_data: encode_timeout_count(self.timeout_count),
        };
        let block = Block {
            header,
            transactions: self.transactions,
            transaction_signatures: self.signatures,
            signatures: Vec::new(),
        };
        Ok((block, self.ctx))
    }
}
