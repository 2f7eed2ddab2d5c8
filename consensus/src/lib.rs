//! Proof-of-Formulation consensus.
//!
//! Formulators produce blocks in a round-robin order that escalates past a
//! silent leader with every timeout; observers finalize blocks by signing
//! them.
//!
//! ## Module overview
//!
//! - [`rank`]: the deterministic leader schedule stored in chain state.
//! - [`consensus_data`]: the timeout count carried in block headers.
//! - [`observer`]: the observer key set and its finalization quorum.
//! - [`gen_item`]: per-height reconciliation of generated blocks and observer signatures.
//! - [`phase`]: the producer-side generation state machine.
//! - [`error`]: consensus error types.

pub mod consensus_data;
pub mod error;
pub mod gen_item;
pub mod observer;
pub mod phase;
pub mod rank;

pub use consensus_data::{decode_timeout_count, encode_timeout_count};
pub use error::ConsensusError;
pub use gen_item::{GenItem, GenItemTable, ObSignOutcome};
pub use observer::{observer_sign, ObserverSet};
pub use phase::GenerationPhase;
pub use rank::{Rank, RankPolicy, RankSchedule};
