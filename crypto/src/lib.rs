//! Cryptographic primitives for the Proof-of-Formulation chain.
//!
//! - **Ed25519** for signing and signature verification
//! - **Blake2b** for hashing (headers, transactions, state digests)

pub mod error;
pub mod hash;
pub mod keys;
pub mod sign;

pub use error::CryptoError;
pub use hash::{blake2b_256, blake2b_256_multi, double_hash, hash_of};
pub use keys::{generate_keypair, keypair_from_seed, public_from_private, public_hash};
pub use sign::{recover_signer, sign_hash, sign_message, verify_signature};
