//! Layered, copy-on-write state for speculative block execution.
//!
//! A [`Context`] is an arena of [`StateLayer`]s stacked on top of a [`Loader`]
//! (committed chain state or a previous, frozen context). Each layer holds
//! deltas only. Reads walk from the most recently pushed layer down to the
//! loader and memoize into the top layer's read cache; writes always land in
//! the top layer. Snapshots push a layer, reverts drop layers, commits fold
//! layers back into their parent.

pub mod context;
pub mod digest;
pub mod error;
pub mod keys;
pub mod layer;
pub mod loader;
pub mod process;

pub use context::{Context, ContextIdentity, Snapshot};
pub use digest::state_digest;
pub use error::StateError;
pub use keys::{AccountDataKey, ProcessDataKey};
pub use layer::StateLayer;
pub use loader::{EmptyLoader, Loader};
pub use process::ProcessScope;
