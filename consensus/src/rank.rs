//! The leader schedule.
//!
//! The schedule is an ordered list of formulators stored as process data of
//! the consensus process, so every node derives it from committed state
//! alone. `top_rank(t)` is the formulator at position `t mod n`. After each
//! block the schedule rotates: a timeout skips past the silent leaders, and a
//! leader that has produced its quota of consecutive blocks moves to the back.

use pof_state::{Loader, ProcessDataKey, ProcessScope};
use pof_state::Context;
use pof_transactions::RankChange;
use pof_types::{Address, PublicHash, CONSENSUS_PID};
use serde::{Deserialize, Serialize};

use crate::ConsensusError;

const SCHEDULE_KEY: &[u8] = b"rank_schedule";

/// One formulator slot: its address and the hash of its generator key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rank {
    pub address: Address,
    pub public_hash: PublicHash,
}

impl Rank {
    pub fn new(address: Address, public_hash: PublicHash) -> Self {
        Self {
            address,
            public_hash,
        }
    }
}

/// Chain-wide limits of the schedule.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RankPolicy {
    /// Consecutive blocks a leader may produce before yielding.
    pub max_blocks_per_formulator: u32,
    /// Highest timeout count a block request may carry.
    pub max_timeout_count: u32,
}

impl Default for RankPolicy {
    fn default() -> Self {
        Self {
            max_blocks_per_formulator: 10,
            max_timeout_count: 64,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankSchedule {
    ranks: Vec<Rank>,
    /// Blocks produced in a row by the current leader.
    blocks_by_same_formulator: u32,
}

impl RankSchedule {
    pub fn new(ranks: Vec<Rank>) -> Self {
        Self {
            ranks,
            blocks_by_same_formulator: 0,
        }
    }

    /// Read the schedule beneath a loader. An absent schedule is empty.
    pub fn load(loader: &dyn Loader) -> Result<Self, ConsensusError> {
        match loader.load_process_data(&ProcessDataKey::new(CONSENSUS_PID, SCHEDULE_KEY))? {
            Some(bytes) => Self::decode(&bytes),
            None => Ok(Self::default()),
        }
    }

    /// Read the schedule as seen by a context, including its own writes.
    pub fn from_context(ctx: &mut Context) -> Result<Self, ConsensusError> {
        match ProcessScope::new(ctx, CONSENSUS_PID).process_data(SCHEDULE_KEY)? {
            Some(bytes) => Self::decode(&bytes),
            None => Ok(Self::default()),
        }
    }

    pub fn save(&self, ctx: &mut Context) -> Result<(), ConsensusError> {
        let bytes = bincode::serialize(self).map_err(|e| ConsensusError::CorruptSchedule(e.to_string()))?;
        ProcessScope::new(ctx, CONSENSUS_PID).set_process_data(SCHEDULE_KEY, bytes);
        Ok(())
    }

    fn decode(bytes: &[u8]) -> Result<Self, ConsensusError> {
        bincode::deserialize(bytes).map_err(|e| ConsensusError::CorruptSchedule(e.to_string()))
    }

    pub fn ranks(&self) -> &[Rank] {
        &self.ranks
    }

    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranks.is_empty()
    }

    pub fn blocks_by_same_formulator(&self) -> u32 {
        self.blocks_by_same_formulator
    }

    /// The leader for `timeout_count`.
    pub fn top_rank(&self, timeout_count: u32, policy: &RankPolicy) -> Result<&Rank, ConsensusError> {
        if timeout_count > policy.max_timeout_count {
            return Err(ConsensusError::InvalidRank(timeout_count));
        }
        if self.ranks.is_empty() {
            return Err(ConsensusError::EmptyRankSchedule);
        }
        Ok(&self.ranks[timeout_count as usize % self.ranks.len()])
    }

    pub fn is_formulator(&self, address: &Address, public_hash: &PublicHash) -> bool {
        self.ranks
            .iter()
            .any(|r| r.address == *address && r.public_hash == *public_hash)
    }

    /// Blocks the leader for `timeout_count` may still produce in its session.
    pub fn remaining_blocks(&self, timeout_count: u32, policy: &RankPolicy) -> u32 {
        if timeout_count > 0 {
            policy.max_blocks_per_formulator
        } else {
            policy
                .max_blocks_per_formulator
                .saturating_sub(self.blocks_by_same_formulator)
        }
    }

    /// Rotate the schedule after `generator` produced a block at `timeout_count`.
    pub fn advance(
        &mut self,
        generator: &Address,
        timeout_count: u32,
        policy: &RankPolicy,
    ) -> Result<(), ConsensusError> {
        let expected = self.top_rank(timeout_count, policy)?.address;
        if expected != *generator {
            return Err(ConsensusError::UnexpectedGenerator {
                expected,
                got: *generator,
            });
        }
        if timeout_count > 0 {
            let skip = timeout_count as usize % self.ranks.len();
            self.ranks.rotate_left(skip);
            self.blocks_by_same_formulator = 0;
        }
        self.blocks_by_same_formulator += 1;
        if self.blocks_by_same_formulator >= policy.max_blocks_per_formulator {
            self.ranks.rotate_left(1);
            self.blocks_by_same_formulator = 0;
            tracing::debug!(leader = %self.ranks[0].address, "leader slots used up, rank rotated");
        }
        Ok(())
    }

    /// Apply formulator joins and leaves. Joins go to the back; a leaving
    /// leader hands over to the next rank.
    pub fn apply_changes(&mut self, changes: &[RankChange]) {
        for change in changes {
            match change {
                RankChange::Join {
                    address,
                    generator_hash,
                } => {
                    if !self.ranks.iter().any(|r| r.address == *address) {
                        self.ranks.push(Rank::new(*address, *generator_hash));
                    }
                }
                RankChange::Leave { address } => {
                    if let Some(pos) = self.ranks.iter().position(|r| r.address == *address) {
                        self.ranks.remove(pos);
                        if pos == 0 {
                            self.blocks_by_same_formulator = 0;
                        }
                    }
                }
            }
        }
    }
}
