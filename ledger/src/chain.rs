//! The committed chain and the rules a block must satisfy to extend it.

use std::collections::HashMap;
use std::sync::Arc;

use pof_consensus::{decode_timeout_count, ObserverSet, Rank, RankPolicy, RankSchedule};
use pof_crypto::recover_signer;
use pof_state::{Context, ContextIdentity};
use pof_store::{ChainStore, StoreLoader};
use pof_transactions::{formulator, recover_signers, Block};
use pof_types::{Address, BlockSign, ChainParams, Hash256, Header, PublicHash, Timestamp};

use crate::level_root::level_root;
use crate::LedgerError;

/// Signers already known for transaction hashes, typically from the pool.
/// Transactions not in the map have their signers recovered from the block.
pub type SignerMap = HashMap<Hash256, Vec<PublicHash>>;

pub struct Chain {
    store: Arc<dyn ChainStore>,
    observers: ObserverSet,
    policy: RankPolicy,
}

impl Chain {
    pub fn new(store: Arc<dyn ChainStore>, observers: ObserverSet, policy: RankPolicy) -> Self {
        Self {
            store,
            observers,
            policy,
        }
    }

    pub fn store(&self) -> &Arc<dyn ChainStore> {
        &self.store
    }

    pub fn observers(&self) -> &ObserverSet {
        &self.observers
    }

    pub fn policy(&self) -> &RankPolicy {
        &self.policy
    }

    pub fn params(&self) -> ChainParams {
        self.store.params()
    }

    pub fn height(&self) -> u32 {
        self.store.height()
    }

    pub fn last_hash(&self) -> Hash256 {
        self.store.last_hash()
    }

    pub fn last_timestamp(&self) -> Timestamp {
        self.store.last_timestamp()
    }

    /// A fresh context for the block after the committed tip.
    pub fn new_context(&self) -> Context {
        Context::new(
            Arc::new(StoreLoader::new(self.store.clone())),
            ContextIdentity {
                params: self.store.params(),
                target_height: self.store.height() + 1,
                last_hash: self.store.last_hash(),
                last_timestamp: self.store.last_timestamp(),
            },
        )
    }

    // ── Rank schedule ───────────────────────────────────────────────────

    /// The schedule as of the committed tip.
    pub fn rank_schedule(&self) -> Result<RankSchedule, LedgerError> {
        Ok(RankSchedule::load(&StoreLoader::new(self.store.clone()))?)
    }

    pub fn top_rank(&self, timeout_count: u32) -> Result<Rank, LedgerError> {
        Ok(self
            .rank_schedule()?
            .top_rank(timeout_count, &self.policy)?
            .clone())
    }

    pub fn is_formulator(&self, address: &Address, public_hash: &PublicHash) -> Result<bool, LedgerError> {
        Ok(self.rank_schedule()?.is_formulator(address, public_hash))
    }

    pub fn remaining_blocks(&self, timeout_count: u32) -> Result<u32, LedgerError> {
        Ok(self
            .rank_schedule()?
            .remaining_blocks(timeout_count, &self.policy))
    }

    // ── Execution ───────────────────────────────────────────────────────

    /// Validate `block` against the context's position and execute it on the
    /// context. On success the context holds exactly the block's writes and
    /// its hash equals the header's context hash.
    pub fn execute_block_on_context(
        &self,
        block: &Block,
        ctx: &mut Context,
        signers: &SignerMap,
    ) -> Result<(), LedgerError> {
        validate_header(&block.header, ctx.identity())?;
        let timeout_count = decode_timeout_count(&block.header.consensus_data)?;
        let schedule = RankSchedule::from_context(ctx)?;
        let top = schedule.top_rank(timeout_count, &self.policy)?;
        if top.address != block.header.generator {
            return Err(pof_consensus::ConsensusError::UnexpectedGenerator {
                expected: top.address,
                got: block.header.generator,
            }
            .into());
        }

        if block.transactions.len() != block.transaction_signatures.len() {
            return Err(LedgerError::InvalidBlock("transaction signature count mismatch"));
        }
        let hashes = block.transaction_hashes();
        if level_root(&hashes)? != block.header.level_root_hash {
            return Err(LedgerError::InvalidLevelRootHash);
        }

        for (i, ((tx, sigs), hash)) in block
            .transactions
            .iter()
            .zip(&block.transaction_signatures)
            .zip(&hashes)
            .enumerate()
        {
            let index = u16::try_from(i).map_err(|_| LedgerError::TooManyTransactions(hashes.len()))?;
            let tx_signers = match signers.get(hash) {
                Some(known) => known.clone(),
                None => recover_signers(hash, sigs)?,
            };
            let snapshot = ctx.snapshot();
            let applied = tx
                .validate(ctx, &tx_signers)
                .and_then(|()| tx.execute(ctx, index));
            if let Err(e) = applied {
                ctx.revert(snapshot)?;
                return Err(e.into());
            }
            ctx.commit(snapshot)?;
        }

        finalize_consensus(ctx, &block.header.generator, timeout_count, &self.policy)?;

        if ctx.hash() != block.header.context_hash {
            return Err(LedgerError::InvalidContextHash);
        }
        Ok(())
    }

    // ── Connection ──────────────────────────────────────────────────────

    /// Execute `block` against the committed state and commit it.
    pub fn connect_block(&self, block: &Block, signers: &SignerMap) -> Result<(), LedgerError> {
        self.check_next(block)?;
        self.validate_signatures(block)?;
        let mut ctx = self.new_context();
        self.execute_block_on_context(block, &mut ctx, signers)?;
        self.store.store_block(block, &ctx.state())?;
        tracing::info!(height = block.height(), hash = %block.hash(), txs = block.transactions.len(), "block connected");
        Ok(())
    }

    /// Commit `block` using a context it was already executed on.
    pub fn connect_block_with_context(&self, block: &Block, ctx: &Context) -> Result<(), LedgerError> {
        self.check_next(block)?;
        let identity = ctx.identity();
        if identity.target_height != block.height() || identity.last_hash != self.store.last_hash() {
            return Err(LedgerError::StaleContext);
        }
        if ctx.hash() != block.header.context_hash {
            return Err(LedgerError::InvalidContextHash);
        }
        self.validate_signatures(block)?;
        self.store.store_block(block, &ctx.state())?;
        tracing::info!(height = block.height(), hash = %block.hash(), txs = block.transactions.len(), "block connected with context");
        Ok(())
    }

    /// `block` must sit right after the tip. A block at or below the tip is
    /// either already connected or, once an observer quorum has signed it, a
    /// fork. Without the quorum it is an ordinary invalid block.
    fn check_next(&self, block: &Block) -> Result<(), LedgerError> {
        let height = self.store.height();
        let got = block.height();
        if got <= height {
            return match self.store.hash(got)? {
                Some(hash) if hash == block.hash() => Err(LedgerError::AlreadyConnected(got)),
                _ => {
                    self.verify_finalized(block)?;
                    tracing::error!(height = got, hash = %block.hash(), "found forked block");
                    Err(LedgerError::ForkedBlock { height: got })
                }
            };
        }
        if got != height + 1 {
            return Err(LedgerError::InvalidHeight {
                expected: height + 1,
                got,
            });
        }
        Ok(())
    }

    /// Observer quorum over the block's [`BlockSign`]. The leader is not
    /// checked, since the rank at an old height is no longer known.
    fn verify_finalized(&self, block: &Block) -> Result<(), LedgerError> {
        let Some((generator_signature, observer_signatures)) = block.signatures.split_first() else {
            return Err(LedgerError::InvalidGeneratorSignature);
        };
        let block_sign = BlockSign {
            header_hash: block.hash(),
            generator_signature: *generator_signature,
        };
        self.observers.verify(&block_sign, observer_signatures)?;
        Ok(())
    }

    /// The first signature must be the leader's over the header hash; the
    /// rest must be an observer quorum over the resulting [`BlockSign`].
    pub fn validate_signatures(&self, block: &Block) -> Result<(), LedgerError> {
        let Some((generator_signature, observer_signatures)) = block.signatures.split_first() else {
            return Err(LedgerError::InvalidGeneratorSignature);
        };
        let timeout_count = decode_timeout_count(&block.header.consensus_data)?;
        let top = self.top_rank(timeout_count)?;
        let header_hash = block.hash();
        let signer =
            recover_signer(&header_hash, generator_signature).map_err(|_| LedgerError::InvalidGeneratorSignature)?;
        if top.address != block.header.generator || top.public_hash != signer {
            return Err(LedgerError::InvalidGeneratorSignature);
        }
        let block_sign = BlockSign {
            header_hash,
            generator_signature: *generator_signature,
        };
        self.observers.verify(&block_sign, observer_signatures)?;
        Ok(())
    }
}

/// Header fields must match the position the context executes at.
pub fn validate_header(header: &Header, identity: &ContextIdentity) -> Result<(), LedgerError> {
    if header.chain_id != identity.params.chain_id {
        return Err(LedgerError::InvalidChainId);
    }
    if header.version != identity.params.version {
        return Err(LedgerError::InvalidVersion);
    }
    if header.height != identity.target_height {
        return Err(LedgerError::InvalidHeight {
            expected: identity.target_height,
            got: header.height,
        });
    }
    if header.prev_hash != identity.last_hash {
        return Err(LedgerError::InvalidPrevHash);
    }
    if header.timestamp <= identity.last_timestamp {
        return Err(LedgerError::InvalidTimestamp);
    }
    Ok(())
}

/// End-of-block consensus step: rotate the schedule for this block's
/// generator and apply pending formulator joins and leaves.
pub(crate) fn finalize_consensus(
    ctx: &mut Context,
    generator: &Address,
    timeout_count: u32,
    policy: &RankPolicy,
) -> Result<(), LedgerError> {
    let mut schedule = RankSchedule::from_context(ctx)?;
    schedule.advance(generator, timeout_count, policy)?;
    let changes = formulator::take_rank_changes(ctx)?;
    if !changes.is_empty() {
        tracing::debug!(changes = changes.len(), "applying rank changes");
        schedule.apply_changes(&changes);
    }
    schedule.save(ctx)?;
    Ok(())
}
