//! Pre-built [`tracing::Span`] constructors for common node operations.
//!
//! Consistent span names and field sets make it easy to filter and
//! correlate a block's path from request to commit.

use tracing::{info_span, Span};

/// Span covering one generation session started by a block request.
pub fn generation_span(target_height: u32, timeout_count: u32) -> Span {
    info_span!("generation", target_height, timeout_count)
}

/// Span covering a reconciliation pass over the pending gen items.
pub fn reconcile_span(from_height: u32) -> Span {
    info_span!("reconcile", from_height)
}

/// Span covering the handling of a single inbound message.
pub fn peer_recv_span(peer: &str, msg_type: &str) -> Span {
    info_span!("peer_recv", peer = %peer, msg_type = %msg_type)
}

/// Span covering one formulator connection on the observer side.
pub fn formulator_session_span(peer: &str) -> Span {
    info_span!("formulator_session", peer = %peer)
}
