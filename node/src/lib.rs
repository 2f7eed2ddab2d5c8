//! Proof-of-Formulation formulator node.
//!
//! The node answers observers' block requests by generating chained
//! sub-blocks, reconciles generated blocks with observer finalization
//! signatures per height, and commits finalized blocks to its chain:
//! - [`formulator`]: the consensus coordinator and its message handlers
//! - [`generation`]: the paced block generation session
//! - [`tx_pool`]: pending transactions ordered per account
//! - [`request_timer`]: outstanding block requests and their expiry
//! - [`observer_link`]: outbound connections to observers
//! - [`formulator_service`]: the observer-side acceptor for formulators

pub mod config;
pub mod error;
pub mod formulator;
pub mod formulator_service;
pub mod generation;
pub mod logging;
pub mod metrics;
pub mod observer_link;
pub mod request_timer;
pub mod shutdown;
pub mod tracing_spans;
pub mod tx_pool;

pub use config::{FormulatorConfig, ObserverConfig};
pub use error::NodeError;
pub use formulator::{FormulatorNode, ObserverStatus};
pub use formulator_service::{chain_authorizer, Authorizer, FormulatorEvent, FormulatorService};
pub use logging::{init_logging, LogFormat};
pub use metrics::NodeMetrics;
pub use request_timer::RequestTimer;
pub use shutdown::{ShutdownController, ShutdownReason};
pub use tx_pool::{PoolItem, PoolState, TransactionPool};
