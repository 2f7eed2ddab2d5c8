//! The formulator node's consensus coordinator.
//!
//! A formulator keeps one link per observer. Observers ask it for blocks
//! with `BlockReq`, broadcast every formulator's `BlockGen`, and finalize
//! blocks with `BlockObSign`. The node reconciles those streams per height
//! in a [`GenItemTable`], executes pending heights speculatively, and
//! commits each height once its finalization signatures arrive.
//!
//! Lock order: `gen_lock` → `reconcile` → `pool` / `peers` → `session`.
//! `request_lock` is taken before `reconcile` and never while holding it.
//! `session` is a leaf lock and is never held across an await.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard as StdMutexGuard};

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn, Instrument};

use pof_consensus::{GenItemTable, GenerationPhase, ObSignOutcome, ObserverSet};
use pof_crypto::public_hash;
use pof_ledger::{genesis_block, Chain, GenesisConfig, LedgerError};
use pof_messages::{
    BlockGenMessage, BlockMessage, BlockObSignMessage, BlockReqMessage, Message, RequestMessage,
    StatusMessage, TransactionMessage,
};
use pof_messages::sync::MAX_REQUEST_COUNT;
use pof_network::Peer;
use pof_state::Context;
use pof_store::ChainStore;
use pof_store_lmdb::LmdbChainStore;
use pof_transactions::{recover_signers, Block};
use pof_types::{Address, Clock, Hash256, KeyPair, PublicHash, Timestamp};

use crate::config::FormulatorConfig;
use crate::metrics::NodeMetrics;
use crate::request_timer::RequestTimer;
use crate::shutdown::{ShutdownController, ShutdownReason};
use crate::tracing_spans::{peer_recv_span, reconcile_span};
use crate::tx_pool::{PoolItem, TransactionPool};
use crate::NodeError;

/// Generation phases kept for this many heights below the newest one.
const PHASE_HISTORY: usize = 32;

/// What an observer told us about its chain.
pub struct ObserverStatus {
    pub peer: Arc<dyn Peer>,
    pub height: u32,
}

/// State guarded by the reconciliation lock.
#[derive(Default)]
pub(crate) struct Reconciler {
    pub(crate) items: GenItemTable,
    /// Finalized blocks received ahead of the tip, drained in height order.
    pub(crate) block_queue: BTreeMap<u32, Block>,
}

/// Producer-session liveness. Guarded separately from reconciliation so a
/// generation loop can poll for cancellation without waiting on it.
#[derive(Default)]
pub(crate) struct Session {
    pub(crate) last_req: Option<BlockReqMessage>,
    pub(crate) last_gen_height: u32,
    pub(crate) last_gen_time: Option<Timestamp>,
    phases: BTreeMap<u32, GenerationPhase>,
}

impl Session {
    pub(crate) fn advance_phase(&mut self, height: u32, next: GenerationPhase) {
        let phase = self.phases.entry(height).or_insert(GenerationPhase::Idle);
        if !phase.advance(next) {
            debug!(height, from = ?*phase, to = ?next, "ignored phase transition");
        }
        while self.phases.len() > PHASE_HISTORY {
            self.phases.pop_first();
        }
    }

    fn phase(&self, height: u32) -> GenerationPhase {
        self.phases
            .get(&height)
            .copied()
            .unwrap_or(GenerationPhase::Idle)
    }
}

/// Outcome of checking a block request against the committed tip.
enum Readiness {
    Ready,
    /// The request is ahead of the tip; wait for the missing blocks.
    Wait,
    Drop(&'static str),
}

pub struct FormulatorNode {
    pub(crate) config: FormulatorConfig,
    pub(crate) key: KeyPair,
    pub(crate) address: Address,
    pub(crate) public_hash: PublicHash,
    pub(crate) chain: Arc<Chain>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) pool: TransactionPool,
    pub(crate) metrics: Arc<NodeMetrics>,
    pub(crate) shutdown: Arc<ShutdownController>,
    halted: AtomicBool,

    pub(crate) reconcile: Mutex<Reconciler>,
    session: StdMutex<Session>,
    peers: Mutex<HashMap<String, ObserverStatus>>,
    request_timer: RequestTimer,
    request_lock: Mutex<()>,
    pub(crate) gen_lock: Mutex<()>,
}

impl FormulatorNode {
    pub fn new(
        config: FormulatorConfig,
        key: KeyPair,
        chain: Arc<Chain>,
        clock: Arc<dyn Clock>,
        metrics: Arc<NodeMetrics>,
        shutdown: Arc<ShutdownController>,
    ) -> Result<Arc<Self>, NodeError> {
        config.validate()?;
        let address = config.formulator_address()?;
        let public_hash = public_hash(&key.public);
        metrics.chain_height.set(i64::from(chain.height()));
        Ok(Arc::new(Self {
            pool: TransactionPool::new(config.txpool_capacity),
            request_timer: RequestTimer::new(config.request_timeout()),
            config,
            key,
            address,
            public_hash,
            chain,
            clock,
            metrics,
            shutdown,
            halted: AtomicBool::new(false),
            reconcile: Mutex::new(Reconciler::default()),
            session: StdMutex::new(Session::default()),
            peers: Mutex::new(HashMap::new()),
            request_lock: Mutex::new(()),
            gen_lock: Mutex::new(()),
        }))
    }

    /// Open the LMDB chain store at `config.data_dir`, write the genesis
    /// block if the store is empty, and build a node on top of it.
    pub fn open(
        config: FormulatorConfig,
        key: KeyPair,
        genesis: &GenesisConfig,
        clock: Arc<dyn Clock>,
        metrics: Arc<NodeMetrics>,
        shutdown: Arc<ShutdownController>,
    ) -> Result<Arc<Self>, NodeError> {
        config.validate()?;
        let store = Arc::new(LmdbChainStore::open(&config.data_dir, config.chain.clone())?);
        let (block, state) = genesis_block(genesis)?;
        if store.init_genesis(&block, &state)? {
            info!(hash = %block.hash(), "wrote genesis block");
        }
        let observers = ObserverSet::new(config.observer_hashes()?);
        let chain = Arc::new(Chain::new(store, observers, config.rank_policy()));
        info!(
            data_dir = %config.data_dir.display(),
            height = chain.height(),
            "chain store opened"
        );
        Self::new(config, key, chain, clock, metrics, shutdown)
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn public_hash(&self) -> PublicHash {
        self.public_hash
    }

    pub fn chain(&self) -> &Arc<Chain> {
        &self.chain
    }

    pub fn height(&self) -> u32 {
        self.chain.height()
    }

    pub fn pool(&self) -> &TransactionPool {
        &self.pool
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    pub fn generation_phase(&self, height: u32) -> GenerationPhase {
        self.session().phase(height)
    }

    /// Received blocks waiting for their parent.
    pub async fn queued_blocks(&self) -> usize {
        self.reconcile.lock().await.block_queue.len()
    }

    pub async fn observer_count(&self) -> usize {
        self.peers.lock().await.len()
    }

    pub(crate) fn session(&self) -> StdMutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Stop accepting work after a fork. The process must not continue on
    /// a chain that disagrees with the finalized one.
    fn halt(&self, height: u32) {
        if !self.halted.swap(true, Ordering::SeqCst) {
            error!(height, "forked block detected, halting node");
            self.session().last_req = None;
            self.shutdown.shutdown_with(ShutdownReason::Fork { height });
        }
    }

    pub(crate) fn send(&self, peer: &dyn Peer, msg: &Message) -> Result<(), NodeError> {
        peer.send_packet(msg.to_packet()?);
        Ok(())
    }

    fn status_message(&self) -> StatusMessage {
        StatusMessage {
            version: self.chain.params().version,
            height: self.chain.height(),
            last_hash: self.chain.last_hash(),
        }
    }

    // ── Observer links ─────────────────────────────────────────────────

    pub async fn on_observer_connected(&self, peer: Arc<dyn Peer>) {
        let status = Message::Status(self.status_message());
        if let Err(e) = self.send(peer.as_ref(), &status) {
            warn!(peer = %peer.id(), error = %e, "failed to send status");
        }
        let mut peers = self.peers.lock().await;
        info!(peer = %peer.id(), name = %peer.name(), "observer connected");
        peers.insert(peer.id().to_string(), ObserverStatus { peer, height: 0 });
        self.metrics.connected_observers.set(peers.len() as i64);
    }

    pub async fn on_observer_disconnected(&self, peer_id: &str) {
        {
            let mut peers = self.peers.lock().await;
            if peers.remove(peer_id).is_some() {
                info!(peer = %peer_id, "observer disconnected");
            }
            self.metrics.connected_observers.set(peers.len() as i64);
        }
        let freed = self.request_timer.remove_by_peer(peer_id);
        if !freed.is_empty() {
            debug!(peer = %peer_id, heights = ?freed, "dropped outstanding requests");
        }
        self.try_request_next().await;
    }

    // ── Message dispatch ────────────────────────────────────────────────

    pub async fn handle_packet(self: &Arc<Self>, peer: &Arc<dyn Peer>, packet: &[u8]) -> Result<(), NodeError> {
        let msg = Message::from_packet(packet)?;
        let span = peer_recv_span(peer.id(), msg.name());
        self.handle_message(peer, msg).instrument(span).await
    }

    pub async fn handle_message(self: &Arc<Self>, peer: &Arc<dyn Peer>, msg: Message) -> Result<(), NodeError> {
        if self.is_halted() {
            return Err(NodeError::Halted);
        }
        match msg {
            Message::BlockReq(m) => self.on_block_req(Arc::clone(peer), m).await,
            Message::BlockGen(m) => self.on_block_gen(m).await,
            Message::BlockObSign(m) => self.on_ob_sign(peer.id(), m).await,
            Message::Block(m) => self.on_blocks(peer.id(), m).await,
            Message::Status(m) => {
                self.on_status(peer.id(), &m).await;
                Ok(())
            }
            Message::Transaction(m) => self.on_transactions(m).await,
            other => Err(NodeError::UnexpectedMessage(other.name())),
        }
    }

    // ── Block requests ──────────────────────────────────────────────────

    fn check_block_req(&self, msg: &BlockReqMessage, retry: u32) -> Readiness {
        let target = self.chain.height() + 1;
        if msg.target_height < target {
            return Readiness::Drop("stale target height");
        }
        {
            let mut session = self.session();
            if msg.target_height <= session.last_gen_height {
                let recent = session.last_gen_time.is_some_and(|t| {
                    self.clock.now().abs_diff(t) < self.config.regeneration_guard()
                });
                if recent {
                    return Readiness::Drop("height was generated recently");
                }
                session.last_req = None;
            }
            if let Some(last) = &session.last_req {
                if msg.target_height <= last.target_height {
                    return Readiness::Drop("a newer request is active");
                }
            }
        }
        if msg.target_height > target {
            if msg.target_height > target + self.config.request_lookahead {
                return Readiness::Drop("target height too far ahead");
            }
            if retry >= self.config.request_retry_limit {
                return Readiness::Drop("missing blocks did not arrive");
            }
            return Readiness::Wait;
        }
        Readiness::Ready
    }

    async fn on_block_req(self: &Arc<Self>, peer: Arc<dyn Peer>, msg: BlockReqMessage) -> Result<(), NodeError> {
        match self.check_block_req(&msg, 0) {
            Readiness::Drop(reason) => {
                debug!(target_height = msg.target_height, reason, "block request dropped");
                Ok(())
            }
            Readiness::Wait => {
                let from = self.chain.height() + 1;
                let count = (msg.target_height - from).min(u32::from(MAX_REQUEST_COUNT)) as u8;
                self.send(peer.as_ref(), &Message::Request(RequestMessage { height: from, count }))?;
                self.spawn_block_req_retry(peer, msg);
                Ok(())
            }
            Readiness::Ready => self.accept_block_req(peer, msg).await,
        }
    }

    /// Re-check a request that was ahead of the tip until the missing
    /// blocks arrive or the retry limit is reached.
    fn spawn_block_req_retry(self: &Arc<Self>, peer: Arc<dyn Peer>, msg: BlockReqMessage) {
        let node = Arc::clone(self);
        tokio::spawn(async move {
            let mut shutdown = node.shutdown.subscribe();
            for retry in 1..=node.config.request_retry_limit {
                tokio::select! {
                    _ = tokio::time::sleep(node.config.request_retry_backoff()) => {}
                    _ = shutdown.recv() => return,
                }
                if node.is_halted() {
                    return;
                }
                match node.check_block_req(&msg, retry) {
                    Readiness::Wait => continue,
                    Readiness::Drop(reason) => {
                        debug!(target_height = msg.target_height, retry, reason, "block request dropped");
                        return;
                    }
                    Readiness::Ready => {
                        if let Err(e) = node.accept_block_req(peer, msg).await {
                            debug!(error = %e, "block request rejected after retry");
                        }
                        return;
                    }
                }
            }
        });
    }

    fn reject_request(&self, target_height: u32, reason: &'static str) -> NodeError {
        self.metrics.block_requests_rejected.inc();
        warn!(target_height, reason, "block request rejected");
        NodeError::InvalidRequest(reason)
    }

    async fn accept_block_req(self: &Arc<Self>, peer: Arc<dyn Peer>, msg: BlockReqMessage) -> Result<(), NodeError> {
        if msg.formulator != self.address {
            return Err(self.reject_request(msg.target_height, "formulator mismatch"));
        }
        if msg.formulator_public_hash != self.public_hash {
            return Err(self.reject_request(msg.target_height, "public hash mismatch"));
        }
        if msg.prev_hash != self.chain.last_hash() {
            return Err(self.reject_request(msg.target_height, "previous hash mismatch"));
        }
        let top = match self.chain.top_rank(msg.timeout_count) {
            Ok(top) => top,
            Err(e) => {
                debug!(timeout_count = msg.timeout_count, error = %e, "no rank for timeout count");
                return Err(self.reject_request(msg.target_height, "invalid rank"));
            }
        };
        if top.address != msg.formulator {
            return Err(self.reject_request(msg.target_height, "not the top ranked formulator"));
        }

        {
            let mut session = self.session();
            session.last_req = Some(msg.clone());
            session.advance_phase(msg.target_height, GenerationPhase::Requested);
        }
        info!(
            target_height = msg.target_height,
            timeout_count = msg.timeout_count,
            peer = %peer.id(),
            "block request accepted"
        );

        let node = Arc::clone(self);
        tokio::spawn(async move { node.generate(peer, msg).await });
        Ok(())
    }

    // ── Reconciliation ──────────────────────────────────────────────────

    /// Heights further than `request_lookahead` above the tip are not held.
    fn beyond_window(&self, height: u32) -> bool {
        height > self.chain.height().saturating_add(self.config.request_lookahead)
    }

    async fn on_block_gen(&self, msg: BlockGenMessage) -> Result<(), NodeError> {
        let height = msg.target_height();
        if height <= self.chain.height() {
            return Ok(());
        }
        if self.beyond_window(height) {
            debug!(height, tip = self.chain.height(), "block gen too far ahead, dropped");
            return Ok(());
        }
        if msg.block.header.generator != self.address {
            self.session().last_req = None;
        }
        let needs_request = {
            let mut rec = self.reconcile.lock().await;
            rec.items.merge_block_gen(msg)?;
            self.update_by_gen_items(&mut rec).await
        };
        if needs_request {
            self.try_request_next().await;
        }
        Ok(())
    }

    async fn on_ob_sign(&self, peer_id: &str, msg: BlockObSignMessage) -> Result<(), NodeError> {
        let height = msg.target_height;
        if height <= self.chain.height() {
            return Ok(());
        }
        if self.beyond_window(height) {
            debug!(height, tip = self.chain.height(), "observer signature too far ahead, dropped");
            return Ok(());
        }
        let needs_request = {
            let mut rec = self.reconcile.lock().await;
            if rec.items.merge_ob_sign(msg) == ObSignOutcome::InvalidatedBlockGen {
                warn!(height, "observers signed a different block, dropped generated block");
                let mut session = self.session();
                if session.phase(height) == GenerationPhase::Proposed {
                    session.advance_phase(height, GenerationPhase::Superseded);
                }
            }
            {
                let mut peers = self.peers.lock().await;
                if let Some(status) = peers.get_mut(peer_id) {
                    status.height = status.height.max(height);
                }
            }
            self.update_by_gen_items(&mut rec).await
        };
        if needs_request {
            self.try_request_next().await;
        }
        Ok(())
    }

    /// Walk pending heights from the tip. Heights holding both halves are
    /// committed in order; the first height still waiting for signatures
    /// starts a speculative run over the generated blocks above it.
    ///
    /// Returns true when a height was evicted and must be requested again.
    pub(crate) async fn update_by_gen_items(&self, rec: &mut Reconciler) -> bool {
        let from = self.chain.height() + 1;
        let span = reconcile_span(from);
        let needs_request = self.reconcile_from(rec, from).instrument(span).await;
        self.metrics.gen_items_pending.set(rec.items.len() as i64);
        needs_request
    }

    async fn reconcile_from(&self, rec: &mut Reconciler, mut height: u32) -> bool {
        loop {
            let Some(item) = rec.items.get(height) else {
                return false;
            };
            if item.block_gen.is_none() {
                return false;
            }
            if item.ob_sign.is_none() {
                self.speculate(rec, height).await;
                return false;
            }
            let Some(block) = item.assemble() else {
                warn!(height, "finalization does not match generated block");
                rec.items.remove(height);
                return true;
            };
            let context = item.context.clone();

            let result = match &context {
                Some(ctx) => self.chain.connect_block_with_context(&block, ctx).map(|()| true),
                None => {
                    let signers = self.pool.signer_map(&block).await;
                    self.chain.connect_block(&block, &signers).map(|()| false)
                }
            };
            match result {
                Ok(fast) => {
                    if fast {
                        self.metrics.blocks_committed_fast.inc();
                    } else {
                        self.metrics.blocks_committed_slow.inc();
                    }
                    rec.items.remove(height);
                    self.after_commit(rec, &block).await;
                }
                Err(LedgerError::AlreadyConnected(_)) => {
                    rec.items.remove(height);
                }
                Err(e) if e.is_fatal() => {
                    self.halt(height);
                    return false;
                }
                Err(e) => {
                    warn!(height, error = %e, "failed to commit finalized block");
                    rec.items.remove(height);
                    let mut session = self.session();
                    if session.phase(height) == GenerationPhase::Proposed {
                        session.advance_phase(height, GenerationPhase::Rejected);
                    }
                    return true;
                }
            }
            height += 1;
        }
    }

    /// Execute generated blocks ahead of finalization, threading each
    /// height's context into the next.
    async fn speculate(&self, rec: &mut Reconciler, from: u32) {
        let mut parent: Option<(Arc<Context>, Hash256, Timestamp)> = None;
        let mut height = from;
        loop {
            let Some(item) = rec.items.get(height) else {
                return;
            };
            let Some(gen) = &item.block_gen else {
                return;
            };
            let header_hash = gen.block.hash();
            let header_ts = gen.block.header.timestamp;
            if let Some(ctx) = &item.context {
                parent = Some((Arc::clone(ctx), header_hash, header_ts));
                height += 1;
                continue;
            }

            let block = gen.block.clone();
            let mut ctx = match &parent {
                Some((p, hash, ts)) => p.next_context(*hash, *ts),
                None if height == self.chain.height() + 1 => self.chain.new_context(),
                None => return,
            };
            let signers = self.pool.signer_map(&block).await;
            if let Err(e) = self.chain.execute_block_on_context(&block, &mut ctx, &signers) {
                debug!(height, error = %e, "speculative execution failed");
                return;
            }
            let ctx = Arc::new(ctx);
            if let Some(item) = rec.items.get_mut(height) {
                item.context = Some(Arc::clone(&ctx));
            }
            debug!(height, "block executed speculatively");
            parent = Some((ctx, header_hash, header_ts));
            height += 1;
        }
    }

    /// Bookkeeping shared by every commit path.
    async fn after_commit(&self, rec: &mut Reconciler, block: &Block) {
        let height = block.height();
        rec.block_queue = rec.block_queue.split_off(&(height + 1));
        rec.items.prune_below(height + 1);
        self.request_timer.remove(height);
        self.pool.clean(block).await;
        self.metrics.txpool_size.set(self.pool.len().await as i64);
        self.metrics.chain_height.set(i64::from(height));
        {
            let mut session = self.session();
            if session.phase(height) == GenerationPhase::Proposed {
                let next = if block.header.generator == self.address {
                    GenerationPhase::Finalized
                } else {
                    GenerationPhase::Superseded
                };
                session.advance_phase(height, next);
            }
        }
        self.broadcast_status().await;
        info!(
            height,
            generator = %block.header.generator,
            txs = block.transactions.len(),
            "block committed"
        );
    }

    async fn broadcast_status(&self) {
        let msg = Message::Status(self.status_message());
        let packet = match msg.to_packet() {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "failed to encode status");
                return;
            }
        };
        let peers = self.peers.lock().await;
        for status in peers.values() {
            status.peer.send_packet(packet.clone());
        }
    }

    // ── Sync ────────────────────────────────────────────────────────────

    async fn on_blocks(&self, peer_id: &str, msg: BlockMessage) -> Result<(), NodeError> {
        let Some(last) = msg.blocks.last().map(Block::height) else {
            return Ok(());
        };
        {
            let mut rec = self.reconcile.lock().await;
            let tip = self.chain.height();
            for block in msg.blocks {
                let height = block.height();
                if height > tip {
                    if self.beyond_window(height) {
                        debug!(height, tip, "block too far ahead, dropped");
                    } else {
                        rec.block_queue.insert(height, block);
                    }
                    continue;
                }
                // At or below the tip: the committed block, or a fork once an
                // observer quorum signed it.
                match self.chain.connect_block(&block, &HashMap::new()) {
                    Err(LedgerError::AlreadyConnected(_)) => {}
                    Err(e) if e.is_fatal() => {
                        self.halt(height);
                        return Err(NodeError::Halted);
                    }
                    Err(e) => debug!(height, error = %e, "ignored old block"),
                    Ok(()) => {}
                }
            }
            self.drain_block_queue(&mut rec).await?;
            // Evicted heights are covered by the request below.
            self.update_by_gen_items(&mut rec).await;
        }
        {
            let mut peers = self.peers.lock().await;
            if let Some(status) = peers.get_mut(peer_id) {
                status.height = status.height.max(last);
            }
        }
        self.try_request_next().await;
        Ok(())
    }

    async fn drain_block_queue(&self, rec: &mut Reconciler) -> Result<(), NodeError> {
        loop {
            let next = self.chain.height() + 1;
            let Some(block) = rec.block_queue.remove(&next) else {
                return Ok(());
            };
            let signers = self.pool.signer_map(&block).await;
            match self.chain.connect_block(&block, &signers) {
                Ok(()) => {
                    self.metrics.blocks_committed_slow.inc();
                    self.after_commit(rec, &block).await;
                }
                Err(e) if e.is_fatal() => {
                    self.halt(next);
                    return Err(NodeError::Halted);
                }
                Err(e) => {
                    warn!(height = next, error = %e, "received block failed to connect");
                    self.request_timer.remove(next);
                    return Ok(());
                }
            }
        }
    }

    async fn on_status(&self, peer_id: &str, msg: &StatusMessage) {
        {
            let mut peers = self.peers.lock().await;
            if let Some(status) = peers.get_mut(peer_id) {
                status.height = status.height.max(msg.height);
            }
        }
        self.try_request_next().await;
    }

    /// Ask an observer for the block after the tip, unless it is already
    /// pending locally or requested.
    pub async fn try_request_next(&self) {
        if self.is_halted() {
            return;
        }
        let _guard = self.request_lock.lock().await;
        let target = self.chain.height() + 1;
        {
            let rec = self.reconcile.lock().await;
            if rec
                .items
                .get(target)
                .is_some_and(|item| item.received && item.block_gen.is_some())
            {
                return;
            }
            if rec.block_queue.contains_key(&target) {
                return;
            }
        }
        if self.request_timer.exists(target) {
            return;
        }
        let peers = self.peers.lock().await;
        let Some(status) = peers
            .values()
            .filter(|s| s.height >= target)
            .max_by_key(|s| s.height)
        else {
            return;
        };
        let msg = Message::Request(RequestMessage {
            height: target,
            count: 1,
        });
        match self.send(status.peer.as_ref(), &msg) {
            Ok(()) => {
                self.request_timer.add(target, status.peer.id());
                debug!(height = target, peer = %status.peer.id(), "requested block");
            }
            Err(e) => warn!(height = target, error = %e, "failed to request block"),
        }
    }

    /// Retry requests whose peers never answered.
    pub async fn expire_requests(&self) {
        let expired = self.request_timer.expire();
        if !expired.is_empty() {
            debug!(heights = ?expired, "block requests expired");
            self.try_request_next().await;
        }
    }

    // ── Transactions ────────────────────────────────────────────────────

    async fn on_transactions(&self, msg: TransactionMessage) -> Result<(), NodeError> {
        if msg.transactions.len() != msg.signatures.len() {
            return Err(NodeError::UnexpectedMessage("transaction"));
        }
        let chain_id = self.chain.params().chain_id;
        for (transaction, signatures) in msg.transactions.into_iter().zip(msg.signatures) {
            let hash = transaction.hash(chain_id);
            if self.pool.contains(&hash).await {
                continue;
            }
            let signers = match recover_signers(&hash, &signatures) {
                Ok(s) => s,
                Err(e) => {
                    debug!(%hash, error = %e, "dropped transaction with bad signature");
                    continue;
                }
            };
            let item = PoolItem {
                transaction,
                hash,
                signatures,
                signers,
            };
            match self.pool.push(item).await {
                Ok(()) => self.metrics.transactions_received.inc(),
                Err(NodeError::TxExists) => {}
                Err(e) => {
                    debug!(%hash, error = %e, "transaction not pooled");
                    break;
                }
            }
        }
        self.metrics.txpool_size.set(self.pool.len().await as i64);
        Ok(())
    }
}

impl FormulatorNode {
    /// Dial every observer and serve until shutdown.
    pub async fn run(self: &Arc<Self>) -> Result<(), NodeError> {
        let mut shutdown = self.shutdown.subscribe();
        let links = crate::observer_link::spawn_observer_links(self)?;
        info!(
            formulator = %self.address,
            observers = links.len(),
            height = self.chain.height(),
            "formulator node started"
        );

        let mut ticker = tokio::time::interval(self.config.request_timeout() / 2);
        while !self.shutdown.is_triggered() {
            tokio::select! {
                _ = ticker.tick() => self.expire_requests().await,
                _ = shutdown.recv() => break,
            }
        }

        for link in links {
            let _ = link.await;
        }
        info!(height = self.chain.height(), halted = self.is_halted(), "formulator node stopped");
        if self.is_halted() {
            return Err(NodeError::Halted);
        }
        Ok(())
    }
}
