//! The block generation session.
//!
//! An accepted request starts a session that produces up to
//! `remaining_blocks` chained sub-blocks. Each sub-block collects pool
//! transactions for at most the collect timeout, is signed, sent to the
//! requesting observer and recorded as a generated gen item. Between
//! sub-blocks the session releases the reconciliation lock, paces itself
//! against wall-clock targets and stops once its request is no longer
//! the active one.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn, Instrument};

use pof_consensus::GenerationPhase;
use pof_crypto::sign_hash;
use pof_ledger::BlockCreator;
use pof_messages::{BlockGenMessage, BlockReqMessage, Message};
use pof_network::Peer;
use pof_state::Context;
use pof_types::{Hash256, Timestamp};

use crate::formulator::FormulatorNode;
use crate::tracing_spans::generation_span;
use crate::NodeError;

/// Sub-blocks paced at the full block interval; later ones follow at the
/// collect timeout.
const PACED_SUB_BLOCKS: u32 = 8;

/// Time since session start by which sub-block `index` should be out.
pub(crate) fn expected_elapsed(index: u32, interval: Duration, collect: Duration) -> Duration {
    collect + interval * index.min(PACED_SUB_BLOCKS) + collect * index.saturating_sub(PACED_SUB_BLOCKS)
}

impl FormulatorNode {
    pub(crate) async fn generate(self: Arc<Self>, peer: Arc<dyn Peer>, req: BlockReqMessage) {
        let span = generation_span(req.target_height, req.timeout_count);
        let target_height = req.target_height;
        if let Err(e) = self.run_session(peer, req).instrument(span).await {
            warn!(target_height, error = %e, "block generation failed");
        }
    }

    /// The session may keep going while its request is still the active one.
    fn session_active(&self, req: &BlockReqMessage) -> bool {
        if self.is_halted() {
            return false;
        }
        self.session()
            .last_req
            .as_ref()
            .is_some_and(|last| last.target_height == req.target_height)
    }

    async fn run_session(&self, peer: Arc<dyn Peer>, req: BlockReqMessage) -> Result<(), NodeError> {
        let _gen = self.gen_lock.lock().await;
        let mut rec = self.reconcile.lock().await;

        if req.target_height != self.chain.height() + 1 || !self.session_active(&req) {
            debug!(target_height = req.target_height, "generation session superseded before start");
            return Ok(());
        }

        let remaining = self.chain.remaining_blocks(req.timeout_count)?;
        let interval = self.config.block_interval();
        let collect = self.config.tx_collect_timeout();

        let started = Instant::now();
        let last_ts = self.chain.last_timestamp();
        let now = self.clock.now();
        let start_ts = if now <= last_ts {
            last_ts.saturating_add(Duration::from_millis(1))
        } else {
            now
        };
        let end_ts = start_ts.saturating_add(interval * remaining);
        info!(target_height = req.target_height, remaining, "block generation started");

        let mut parent: Option<(Arc<Context>, Hash256, Timestamp)> = None;
        for index in 0..remaining {
            let sub_started = Instant::now();
            let (ctx, timeout_count) = match &parent {
                Some((p, hash, ts)) => (p.next_context(*hash, *ts), 0),
                None => (self.chain.new_context(), req.timeout_count),
            };
            let height = ctx.target_height();

            let mut timestamp = start_ts.saturating_add(interval * index).min(end_ts);
            if timestamp <= ctx.last_timestamp() {
                timestamp = Timestamp::from_nanos(ctx.last_timestamp().as_nanos() + 1);
            }

            {
                let mut session = self.session();
                session.advance_phase(height, GenerationPhase::Requested);
                session.advance_phase(height, GenerationPhase::Generating);
            }

            let mut creator = BlockCreator::new(ctx, self.address, timeout_count, *self.chain.policy());
            self.collect_transactions(&mut creator, collect).await;
            let (block, ctx) = creator.finalize(timestamp)?;

            let header_hash = block.hash();
            let msg = BlockGenMessage {
                generator_signature: sign_hash(&header_hash, &self.key),
                block,
                is_reply: true,
            };
            self.send(peer.as_ref(), &Message::BlockGen(msg.clone()))?;

            let tx_count = msg.block.transactions.len();
            let ctx = Arc::new(ctx);
            rec.items.insert_generated(msg, Arc::clone(&ctx));
            parent = Some((ctx, header_hash, timestamp));
            {
                let mut session = self.session();
                session.last_gen_height = height;
                session.last_gen_time = Some(self.clock.now());
                session.advance_phase(height, GenerationPhase::Proposed);
            }

            self.metrics.blocks_generated.inc();
            self.metrics.gen_items_pending.set(rec.items.len() as i64);
            self.metrics
                .subblock_latency_ms
                .observe(sub_started.elapsed().as_secs_f64() * 1000.0);
            info!(height, index, txs = tx_count, hash = %header_hash, "block generated");

            if index + 1 == remaining {
                break;
            }

            drop(rec);
            if !self.session_active(&req) {
                debug!(height, "generation session ended");
                return Ok(());
            }
            let expected = expected_elapsed(index, interval, collect);
            let elapsed = started.elapsed();
            if expected > elapsed {
                tokio::time::sleep(expected - elapsed).await;
                if !self.session_active(&req) {
                    debug!(height, "generation session ended");
                    return Ok(());
                }
            }
            rec = self.reconcile.lock().await;
        }
        Ok(())
    }

    /// Fill the block from the pool until it is empty, the collect timeout
    /// passes or the transaction cap is reached. The pool stays locked for
    /// the whole collection so inserts cannot interleave with the
    /// sequence checks.
    async fn collect_transactions(&self, creator: &mut BlockCreator, collect: Duration) {
        let deadline = Instant::now() + collect;
        let mut pool = self.pool.lock().await;
        while Instant::now() < deadline && creator.tx_count() < self.config.max_transactions_per_block {
            let snapshot = creator.context_mut().snapshot();
            let item = pool.pop_for(creator.context_mut());
            if let Err(e) = creator.context_mut().revert(snapshot) {
                warn!(error = %e, "failed to revert pool lookup");
                break;
            }
            let Some(item) = item else {
                break;
            };
            if let Err(e) = creator.add_tx(item.transaction, item.hash, item.signatures, &item.signers) {
                debug!(hash = %item.hash, error = %e, "transaction skipped");
            }
        }
        self.metrics.txpool_size.set(pool.len() as i64);
    }
}
