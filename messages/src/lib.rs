//! Messages exchanged between formulators and observers.
//!
//! Every packet on the wire is one bincode-encoded [`Message`]. Leader
//! negotiation records travel inside [`Signed`], which carries a detached
//! signature over the hash of the record.

pub mod consensus;
pub mod sync;
pub mod vote;

pub use consensus::{BlockGenMessage, BlockObSignMessage, BlockReqMessage};
pub use sync::{BlockMessage, RequestMessage, StatusMessage, TransactionMessage};
pub use vote::{BlockGenRequest, BlockVote, NextRoundVote, NextRoundVoteAck, RoundVote, RoundVoteAck, Signed};

use serde::{Deserialize, Serialize};

/// Largest packet a peer may send.
pub const MAX_PACKET_SIZE: usize = 32 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum MessageError {
    #[error("malformed packet: {0}")]
    Malformed(String),

    #[error("packet of {0} bytes exceeds the size limit")]
    TooLarge(usize),
}

/// Top-level wire message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Message {
    // Consensus
    BlockReq(BlockReqMessage),
    BlockGen(BlockGenMessage),
    BlockObSign(BlockObSignMessage),

    // Leader negotiation between observers
    RoundVote(Signed<RoundVote>),
    RoundVoteAck(Signed<RoundVoteAck>),
    NextRoundVote(Signed<NextRoundVote>),
    NextRoundVoteAck(Signed<NextRoundVoteAck>),
    BlockVote(Signed<BlockVote>),
    BlockGenRequest(Signed<BlockGenRequest>),

    // Sync
    Status(StatusMessage),
    Request(RequestMessage),
    Block(BlockMessage),
    Transaction(TransactionMessage),
}

impl Message {
    /// Short name for logs and metrics labels.
    pub fn name(&self) -> &'static str {
        match self {
            Self::BlockReq(_) => "block_req",
            Self::BlockGen(_) => "block_gen",
            Self::BlockObSign(_) => "block_ob_sign",
            Self::RoundVote(_) => "round_vote",
            Self::RoundVoteAck(_) => "round_vote_ack",
            Self::NextRoundVote(_) => "next_round_vote",
            Self::NextRoundVoteAck(_) => "next_round_vote_ack",
            Self::BlockVote(_) => "block_vote",
            Self::BlockGenRequest(_) => "block_gen_request",
            Self::Status(_) => "status",
            Self::Request(_) => "request",
            Self::Block(_) => "block",
            Self::Transaction(_) => "transaction",
        }
    }

    pub fn to_packet(&self) -> Result<Vec<u8>, MessageError> {
        let bytes = bincode::serialize(self).map_err(|e| MessageError::Malformed(e.to_string()))?;
        if bytes.len() > MAX_PACKET_SIZE {
            return Err(MessageError::TooLarge(bytes.len()));
        }
        Ok(bytes)
    }

    pub fn from_packet(packet: &[u8]) -> Result<Self, MessageError> {
        if packet.len() > MAX_PACKET_SIZE {
            return Err(MessageError::TooLarge(packet.len()));
        }
        bincode::deserialize(packet).map_err(|e| MessageError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pof_types::{Address, Hash256, PublicHash};

    #[test]
    fn block_req_packet_decodes_to_same_message() {
        let msg = Message::BlockReq(BlockReqMessage {
            prev_hash: Hash256::new([3; 32]),
            target_height: 101,
            timeout_count: 0,
            formulator: Address::new(1, 0, 1),
            formulator_public_hash: PublicHash([9; 32]),
        });
        let packet = msg.to_packet().unwrap();
        assert_eq!(Message::from_packet(&packet).unwrap(), msg);
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            Message::from_packet(&[0xff, 0xff, 0xff, 0xff, 1]),
            Err(MessageError::Malformed(_))
        ));
    }
}
