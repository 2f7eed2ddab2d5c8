//! Formulator process: registration and revocation of block generators.
//!
//! Registration locks a stake from the sender's vault balance into the new
//! formulator account. Both transactions record a [`RankChange`]; the
//! consensus layer applies pending changes to the rank schedule when the
//! block is finalized.

use pof_state::{Context, ProcessScope};
use pof_types::{Account, Address, Amount, PublicHash, Timestamp, FORMULATOR_PID};
use serde::{Deserialize, Serialize};

use crate::error::TransactionError;
use crate::vault;

/// Stake locked by a formulator registration.
pub const FORMULATOR_STAKE: Amount = Amount::new(1_000);

const PENDING_CHANGES: &[u8] = b"pending_rank_changes";
const STAKE: &[u8] = b"stake";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormulatorTx {
    Create(CreateFormulator),
    Revoke(RevokeFormulator),
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateFormulator {
    pub timestamp: Timestamp,
    pub seq: u64,
    pub from: Address,
    pub name: String,
    pub key_hash: PublicHash,
    pub generator_hash: PublicHash,
}

/// Revoke the sending formulator; its stake goes to `heritor`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevokeFormulator {
    pub timestamp: Timestamp,
    pub seq: u64,
    pub from: Address,
    pub heritor: Address,
}

/// A change to the formulator set awaiting the end of the block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RankChange {
    Join {
        address: Address,
        generator_hash: PublicHash,
    },
    Leave {
        address: Address,
    },
}

impl FormulatorTx {
    pub fn kind(&self) -> u8 {
        match self {
            Self::Create(_) => 1,
            Self::Revoke(_) => 2,
        }
    }

    pub fn from(&self) -> &Address {
        match self {
            Self::Create(tx) => &tx.from,
            Self::Revoke(tx) => &tx.from,
        }
    }

    pub fn seq(&self) -> u64 {
        match self {
            Self::Create(tx) => tx.seq,
            Self::Revoke(tx) => tx.seq,
        }
    }

    pub fn timestamp(&self) -> Timestamp {
        match self {
            Self::Create(tx) => tx.timestamp,
            Self::Revoke(tx) => tx.timestamp,
        }
    }

    pub fn validate(&self, ctx: &mut Context) -> Result<(), TransactionError> {
        match self {
            Self::Create(tx) => {
                let available = vault::balance(ctx, tx.from)?;
                if available < FORMULATOR_STAKE {
                    return Err(TransactionError::InsufficientBalance {
                        needed: FORMULATOR_STAKE.raw(),
                        available: available.raw(),
                    });
                }
                if ctx.has_account_name(&tx.name)? {
                    return Err(pof_state::StateError::ExistAccountName(tx.name.clone()).into());
                }
                Ok(())
            }
            Self::Revoke(tx) => {
                let account = ctx.account(&tx.from)?;
                if !account.is_formulator() {
                    return Err(TransactionError::NotFormulator(tx.from));
                }
                ctx.account(&tx.heritor)?;
                Ok(())
            }
        }
    }

    pub fn execute(&self, ctx: &mut Context, index: u16) -> Result<(), TransactionError> {
        match self {
            Self::Create(tx) => {
                let address = Address::new(ctx.target_height(), index, tx.seq);
                vault::sub_balance(ctx, tx.from, FORMULATOR_STAKE)?;
                ctx.create_account(Account::formulator(
                    address,
                    tx.name.clone(),
                    tx.key_hash,
                    tx.generator_hash,
                ))?;
                ProcessScope::new(ctx, FORMULATOR_PID).set_account_data(
                    address,
                    STAKE,
                    FORMULATOR_STAKE.to_le_bytes().to_vec(),
                );
                push_rank_change(
                    ctx,
                    RankChange::Join {
                        address,
                        generator_hash: tx.generator_hash,
                    },
                )?;
                tracing::debug!(%address, name = %tx.name, "formulator registered");
                Ok(())
            }
            Self::Revoke(tx) => {
                let stake = {
                    let mut scope = ProcessScope::new(ctx, FORMULATOR_PID);
                    let raw = scope.account_data(tx.from, STAKE)?.unwrap_or_default();
                    scope.set_account_data(tx.from, STAKE, Vec::new());
                    Amount::from_le_slice(&raw).ok_or_else(|| {
                        TransactionError::CorruptData(format!("stake of {}", tx.from))
                    })?
                };
                if !stake.is_zero() {
                    vault::add_balance(ctx, tx.heritor, stake)?;
                }
                ctx.delete_account(&tx.from)?;
                push_rank_change(ctx, RankChange::Leave { address: tx.from })?;
                tracing::debug!(address = %tx.from, "formulator revoked");
                Ok(())
            }
        }
    }
}

fn push_rank_change(ctx: &mut Context, change: RankChange) -> Result<(), TransactionError> {
    let mut changes = pending_rank_changes(ctx)?;
    changes.push(change);
    let bytes = bincode::serialize(&changes).map_err(|e| TransactionError::CorruptData(e.to_string()))?;
    ProcessScope::new(ctx, FORMULATOR_PID).set_process_data(PENDING_CHANGES, bytes);
    Ok(())
}

/// Rank changes recorded since the last time they were taken.
pub fn pending_rank_changes(ctx: &mut Context) -> Result<Vec<RankChange>, TransactionError> {
    match ProcessScope::new(ctx, FORMULATOR_PID).process_data(PENDING_CHANGES)? {
        Some(bytes) => bincode::deserialize(&bytes).map_err(|e| TransactionError::CorruptData(e.to_string())),
        None => Ok(Vec::new()),
    }
}

/// Return and clear the pending rank changes.
pub fn take_rank_changes(ctx: &mut Context) -> Result<Vec<RankChange>, TransactionError> {
    let changes = pending_rank_changes(ctx)?;
    if !changes.is_empty() {
        ProcessScope::new(ctx, FORMULATOR_PID).set_process_data(PENDING_CHANGES, Vec::new());
    }
    Ok(changes)
}
