//! Nullable infrastructure for deterministic testing.
//!
//! External dependencies (clock, chain storage, peers) sit behind traits.
//! This crate provides test-friendly implementations that:
//! - Return deterministic values
//! - Can be controlled programmatically
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod clock;
pub mod peer;
pub mod store;

pub use clock::NullClock;
pub use peer::NullPeer;
pub use store::NullChainStore;
