//! Storage trait for committed chain data.
//!
//! Every backend (LMDB, in-memory for testing) implements [`ChainStore`].
//! The rest of the codebase depends only on the trait.

pub mod chain;
pub mod error;
pub mod loader;

pub use chain::{check_append, ChainStore};
pub use error::StoreError;
pub use loader::StoreLoader;
