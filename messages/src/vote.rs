//! Leader negotiation records used between observers.
//!
//! Each record is sent inside [`Signed`], whose signature covers the hash of
//! the record so it can be relayed without re-encoding.

use pof_crypto::{hash_of, recover_signer, sign_hash};
use pof_types::{Address, Hash256, Header, KeyPair, PublicHash, Signature};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signed<T> {
    pub payload: T,
    pub signature: Signature,
}

impl<T: Serialize> Signed<T> {
    pub fn sign(payload: T, keypair: &KeyPair) -> Self {
        let signature = sign_hash(&hash_of(&payload), keypair);
        Self { payload, signature }
    }

    /// The public hash of the signer, if the signature is valid for the payload.
    pub fn verify(&self) -> Option<PublicHash> {
        recover_signer(&hash_of(&self.payload), &self.signature).ok()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundVote {
    pub chain_id: u8,
    pub last_hash: Hash256,
    pub target_height: u32,
    pub timeout_count: u32,
    pub formulator: Address,
    pub formulator_public_hash: PublicHash,
    pub timestamp: u64,
    pub is_reply: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundVoteAck {
    pub chain_id: u8,
    pub last_hash: Hash256,
    pub target_height: u32,
    pub timeout_count: u32,
    pub formulator: Address,
    pub formulator_public_hash: PublicHash,
    pub public_hash: PublicHash,
    pub timestamp: u64,
    pub is_reply: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextRoundVote {
    pub chain_id: u8,
    pub timeout_count: u32,
    pub formulator: Address,
    pub formulator_public_hash: PublicHash,
    pub timestamp: u64,
    pub is_reply: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NextRoundVoteAck {
    pub chain_id: u8,
    pub timeout_count: u32,
    pub formulator: Address,
    pub formulator_public_hash: PublicHash,
    pub public_hash: PublicHash,
    pub timestamp: u64,
    pub is_reply: bool,
}

/// An observer's signature on a generated header, shared with the other observers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockVote {
    pub target_height: u32,
    pub header: Header,
    pub generator_signature: Signature,
    pub observer_signature: Signature,
    pub is_reply: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockGenRequest {
    pub chain_id: u8,
    pub last_hash: Hash256,
    pub target_height: u32,
    pub timeout_count: u32,
    pub formulator: Address,
    pub formulator_public_hash: PublicHash,
    pub public_hash: PublicHash,
    pub timestamp: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pof_crypto::{keypair_from_seed, public_hash};

    fn vote() -> RoundVote {
        RoundVote {
            chain_id: 1,
            last_hash: Hash256::new([1; 32]),
            target_height: 9,
            timeout_count: 2,
            formulator: Address::new(1, 0, 1),
            formulator_public_hash: PublicHash([4; 32]),
            timestamp: 77,
            is_reply: false,
        }
    }

    #[test]
    fn signed_record_verifies_to_signer() {
        let kp = keypair_from_seed(&[3; 32]);
        let signed = Signed::sign(vote(), &kp);
        assert_eq!(signed.verify(), Some(public_hash(&kp.public)));
    }

    #[test]
    fn tampered_record_fails_verification() {
        let kp = keypair_from_seed(&[3; 32]);
        let mut signed = Signed::sign(vote(), &kp);
        signed.payload.timeout_count = 3;
        assert_eq!(signed.verify(), None);
    }
}
