//! Prometheus metrics for the formulator node.
//!
//! Exposes counters, gauges, and histograms covering block generation,
//! reconciliation, and observer connectivity.  The [`NodeMetrics`] struct
//! owns a dedicated [`Registry`] that can be encoded into the Prometheus
//! text exposition format with [`NodeMetrics::gather`].

use prometheus::{
    register_histogram_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, Encoder, Histogram, HistogramOpts, IntCounter, IntGauge,
    Opts, Registry, TextEncoder,
};

/// Central collection of all node-level Prometheus metrics.
pub struct NodeMetrics {
    /// The Prometheus registry that owns every metric below.
    pub registry: Registry,

    // ── Counters ────────────────────────────────────────────────────────
    /// Sub-blocks this node generated and sent to an observer.
    pub blocks_generated: IntCounter,
    /// Blocks committed with a context cached from speculative execution.
    pub blocks_committed_fast: IntCounter,
    /// Blocks committed by executing against committed state.
    pub blocks_committed_slow: IntCounter,
    /// Block requests that failed authentication.
    pub block_requests_rejected: IntCounter,
    pub transactions_received: IntCounter,

    // ── Gauges ──────────────────────────────────────────────────────────
    pub chain_height: IntGauge,
    /// Heights with a pending gen item.
    pub gen_items_pending: IntGauge,
    pub connected_observers: IntGauge,
    pub txpool_size: IntGauge,

    // ── Histograms ──────────────────────────────────────────────────────
    /// Time to build, sign and send one sub-block, in milliseconds.
    pub subblock_latency_ms: Histogram,
}

impl NodeMetrics {
    /// Create a fresh set of metrics, all registered under a new
    /// [`Registry`].
    pub fn new() -> Self {
        let registry = Registry::new();

        // Counters
        let blocks_generated = register_int_counter_with_registry!(
            Opts::new("pof_blocks_generated_total", "Sub-blocks generated by this node"),
            registry
        )
        .expect("failed to register blocks_generated counter");

        let blocks_committed_fast = register_int_counter_with_registry!(
            Opts::new(
                "pof_blocks_committed_fast_total",
                "Blocks committed with a speculative context"
            ),
            registry
        )
        .expect("failed to register blocks_committed_fast counter");

        let blocks_committed_slow = register_int_counter_with_registry!(
            Opts::new(
                "pof_blocks_committed_slow_total",
                "Blocks committed by fresh execution"
            ),
            registry
        )
        .expect("failed to register blocks_committed_slow counter");

        let block_requests_rejected = register_int_counter_with_registry!(
            Opts::new(
                "pof_block_requests_rejected_total",
                "Block requests that failed authentication"
            ),
            registry
        )
        .expect("failed to register block_requests_rejected counter");

        let transactions_received = register_int_counter_with_registry!(
            Opts::new("pof_transactions_received_total", "Transactions received"),
            registry
        )
        .expect("failed to register transactions_received counter");

        // Gauges
        let chain_height = register_int_gauge_with_registry!(
            Opts::new("pof_chain_height", "Height of the committed chain"),
            registry
        )
        .expect("failed to register chain_height gauge");

        let gen_items_pending = register_int_gauge_with_registry!(
            Opts::new("pof_gen_items_pending", "Heights awaiting reconciliation"),
            registry
        )
        .expect("failed to register gen_items_pending gauge");

        let connected_observers = register_int_gauge_with_registry!(
            Opts::new("pof_connected_observers", "Connected observer peers"),
            registry
        )
        .expect("failed to register connected_observers gauge");

        let txpool_size = register_int_gauge_with_registry!(
            Opts::new("pof_txpool_size", "Transactions waiting in the pool"),
            registry
        )
        .expect("failed to register txpool_size gauge");

        // 1 ms → ~16 s.
        let subblock_latency_ms = register_histogram_with_registry!(
            HistogramOpts::new(
                "pof_subblock_latency_ms",
                "Sub-block generation latency in milliseconds"
            )
            .buckets(prometheus::exponential_buckets(1.0, 2.0, 15).unwrap()),
            registry
        )
        .expect("failed to register subblock_latency_ms histogram");

        Self {
            registry,
            blocks_generated,
            blocks_committed_fast,
            blocks_committed_slow,
            block_requests_rejected,
            transactions_received,
            chain_height,
            gen_items_pending,
            connected_observers,
            txpool_size,
            subblock_latency_ms,
        }
    }

    /// Render every metric in the text exposition format.
    pub fn gather(&self) -> String {
        let mut buf = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buf) {
            tracing::warn!(error = %e, "failed to encode metrics");
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gather_renders_registered_metrics() {
        let metrics = NodeMetrics::new();
        metrics.blocks_generated.inc();
        metrics.chain_height.set(7);
        let text = metrics.gather();
        assert!(text.contains("pof_blocks_generated_total 1"));
        assert!(text.contains("pof_chain_height 7"));
    }

    #[test]
    fn separate_instances_do_not_collide() {
        let a = NodeMetrics::new();
        let b = NodeMetrics::new();
        a.txpool_size.set(3);
        assert_eq!(b.txpool_size.get(), 0);
    }
}
