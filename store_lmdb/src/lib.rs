//! LMDB chain store for the Proof-of-Formulation node.
//!
//! One `heed` environment holds a named database per record kind. A block
//! and the state layer it produced are written in a single write
//! transaction, so the committed height never runs ahead of the state.

pub mod chain;
pub mod environment;
pub mod error;
pub mod write_batch;

pub use chain::LmdbChainStore;
pub use environment::LmdbEnvironment;
pub use error::LmdbError;
