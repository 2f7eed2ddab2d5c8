//! Fundamental types for the Proof-of-Formulation chain.
//!
//! This crate defines the core types shared across every other crate in the workspace:
//! addresses, hashes, keys, block headers, accounts, unspent outputs, events and
//! chain parameters.

pub mod account;
pub mod address;
pub mod amount;
pub mod block;
pub mod error;
pub mod event;
pub mod hash;
pub mod keys;
pub mod params;
pub mod time;
pub mod utxo;

pub use account::{Account, AccountKind};
pub use address::Address;
pub use amount::Amount;
pub use block::{BlockSign, Header};
pub use error::TypeError;
pub use event::Event;
pub use hash::Hash256;
pub use keys::{KeyPair, PrivateKey, PublicHash, PublicKey, RawSignature, Signature};
pub use params::{ChainParams, CONSENSUS_PID, FORMULATOR_PID, VAULT_PID};
pub use time::{Clock, SystemClock, Timestamp};
pub use utxo::{utxo_id, TxOut, Utxo};
