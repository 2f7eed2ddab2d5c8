//! The chain: block validation, execution and connection.
//!
//! - [`chain`]: header checks, execution on a context, slow and fast connect, fork detection.
//! - [`creator`]: building a block transaction by transaction.
//! - [`level_root`]: the 16-ary transaction hash tree.
//! - [`genesis`]: the height-0 block and initial state.
//! - [`error`]: ledger error types.

pub mod chain;
pub mod creator;
pub mod error;
pub mod genesis;
pub mod level_root;

pub use chain::{Chain, SignerMap};
pub use creator::BlockCreator;
pub use error::LedgerError;
pub use genesis::{genesis_address, genesis_block, GenesisAccount, GenesisConfig, GenesisFormulator};
pub use level_root::level_root;
