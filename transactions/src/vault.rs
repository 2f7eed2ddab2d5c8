//! Vault process: account creation and balance transfers.
//!
//! Balances live in account data under the vault's process id.

use pof_state::{Context, ProcessScope};
use pof_types::{Account, Address, Amount, PublicHash, Timestamp, VAULT_PID};
use serde::{Deserialize, Serialize};

use crate::error::TransactionError;

const BALANCE: &[u8] = b"balance";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VaultTx {
    CreateAccount(CreateAccount),
    Transfer(Transfer),
}

/// Create a single-key account. The new address is derived from the
/// executing height and the transaction's index in the block.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateAccount {
    pub timestamp: Timestamp,
    pub seq: u64,
    pub from: Address,
    pub name: String,
    pub key_hash: PublicHash,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub timestamp: Timestamp,
    pub seq: u64,
    pub from: Address,
    pub to: Address,
    pub amount: Amount,
}

impl VaultTx {
    pub fn kind(&self) -> u8 {
        match self {
            Self::CreateAccount(_) => 1,
            Self::Transfer(_) => 2,
        }
    }

    pub fn from(&self) -> &Address {
        match self {
            Self::CreateAccount(tx) => &tx.from,
            Self::Transfer(tx) => &tx.from,
        }
    }

    pub fn seq(&self) -> u64 {
        match self {
            Self::CreateAccount(tx) => tx.seq,
            Self::Transfer(tx) => tx.seq,
        }
    }

    pub fn timestamp(&self) -> Timestamp {
        match self {
            Self::CreateAccount(tx) => tx.timestamp,
            Self::Transfer(tx) => tx.timestamp,
        }
    }

    pub fn validate(&self, ctx: &mut Context) -> Result<(), TransactionError> {
        match self {
            Self::CreateAccount(tx) => {
                if ctx.has_account_name(&tx.name)? {
                    return Err(pof_state::StateError::ExistAccountName(tx.name.clone()).into());
                }
                Ok(())
            }
            Self::Transfer(tx) => {
                if tx.amount.is_zero() {
                    return Err(TransactionError::ZeroAmount);
                }
                if tx.from == tx.to {
                    return Err(TransactionError::SelfTransfer);
                }
                ctx.account(&tx.to)?;
                let available = balance(ctx, tx.from)?;
                if available < tx.amount {
                    return Err(TransactionError::InsufficientBalance {
                        needed: tx.amount.raw(),
                        available: available.raw(),
                    });
                }
                Ok(())
            }
        }
    }

    pub fn execute(&self, ctx: &mut Context, index: u16) -> Result<(), TransactionError> {
        match self {
            Self::CreateAccount(tx) => {
                let address = Address::new(ctx.target_height(), index, tx.seq);
                ctx.create_account(Account::single(address, tx.name.clone(), tx.key_hash))?;
                tracing::trace!(%address, name = %tx.name, "vault account created");
                Ok(())
            }
            Self::Transfer(tx) => {
                sub_balance(ctx, tx.from, tx.amount)?;
                add_balance(ctx, tx.to, tx.amount)?;
                let mut payload = tx.to.as_bytes().to_vec();
                payload.extend_from_slice(&tx.amount.to_le_bytes());
                ProcessScope::new(ctx, VAULT_PID).emit(index, payload)?;
                Ok(())
            }
        }
    }
}

pub fn balance(ctx: &mut Context, address: Address) -> Result<Amount, TransactionError> {
    let raw = ProcessScope::new(ctx, VAULT_PID).account_data(address, BALANCE)?;
    let bytes = raw.unwrap_or_default();
    Amount::from_le_slice(&bytes)
        .ok_or_else(|| TransactionError::CorruptData(format!("balance of {address}")))
}

pub fn add_balance(ctx: &mut Context, address: Address, amount: Amount) -> Result<(), TransactionError> {
    let current = balance(ctx, address)?;
    let next = current
        .checked_add(amount)
        .ok_or_else(|| TransactionError::CorruptData(format!("balance overflow for {address}")))?;
    store_balance(ctx, address, next);
    Ok(())
}

pub fn sub_balance(ctx: &mut Context, address: Address, amount: Amount) -> Result<(), TransactionError> {
    let current = balance(ctx, address)?;
    let next = current
        .checked_sub(amount)
        .ok_or(TransactionError::InsufficientBalance {
            needed: amount.raw(),
            available: current.raw(),
        })?;
    store_balance(ctx, address, next);
    Ok(())
}

fn store_balance(ctx: &mut Context, address: Address, amount: Amount) {
    // Zero balances are removed rather than stored.
    let value = if amount.is_zero() {
        Vec::new()
    } else {
        amount.to_le_bytes().to_vec()
    };
    ProcessScope::new(ctx, VAULT_PID).set_account_data(address, BALANCE, value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::context_with_account;

    #[test]
    fn transfer_moves_balance_and_emits() {
        let (mut ctx, from) = context_with_account(4, "alice", PublicHash([1; 32]));
        let bob = Account::single(Address::new(4, 0, 1), "bob", PublicHash([2; 32]));
        let to = bob.address;
        ctx.create_account(bob).unwrap();
        add_balance(&mut ctx, from, Amount::new(30)).unwrap();

        let tx = VaultTx::Transfer(Transfer {
            timestamp: Timestamp::from_nanos(1),
            seq: 1,
            from,
            to,
            amount: Amount::new(12),
        });
        tx.validate(&mut ctx).unwrap();
        tx.execute(&mut ctx, 3).unwrap();

        assert_eq!(balance(&mut ctx, from).unwrap(), Amount::new(18));
        assert_eq!(balance(&mut ctx, to).unwrap(), Amount::new(12));
        let events = ctx.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].index, 3);
        assert_eq!(events[0].pid, VAULT_PID);
    }

    #[test]
    fn transfer_checks_balance_and_target() {
        let (mut ctx, from) = context_with_account(4, "alice", PublicHash([1; 32]));
        let missing = Address::new(2, 2, 2);
        let to_missing = VaultTx::Transfer(Transfer {
            timestamp: Timestamp::EPOCH,
            seq: 1,
            from,
            to: missing,
            amount: Amount::new(1),
        });
        assert!(matches!(
            to_missing.validate(&mut ctx),
            Err(TransactionError::State(pof_state::StateError::NotExistAccount(_)))
        ));

        let to_self = VaultTx::Transfer(Transfer {
            timestamp: Timestamp::EPOCH,
            seq: 1,
            from,
            to: from,
            amount: Amount::new(1),
        });
        assert_eq!(to_self.validate(&mut ctx), Err(TransactionError::SelfTransfer));
    }

    #[test]
    fn create_account_uses_height_and_index() {
        let (mut ctx, from) = context_with_account(4, "alice", PublicHash([1; 32]));
        let tx = VaultTx::CreateAccount(CreateAccount {
            timestamp: Timestamp::EPOCH,
            seq: 1,
            from,
            name: "carol".to_string(),
            key_hash: PublicHash([3; 32]),
        });
        tx.validate(&mut ctx).unwrap();
        tx.execute(&mut ctx, 2).unwrap();
        let address = ctx.address_by_name("carol").unwrap();
        assert_eq!(address, Address::new(4, 2, 1));
        assert!(tx.validate(&mut ctx).is_err());
    }

    #[test]
    fn emptied_balance_is_removed() {
        let (mut ctx, from) = context_with_account(4, "alice", PublicHash([1; 32]));
        add_balance(&mut ctx, from, Amount::new(5)).unwrap();
        sub_balance(&mut ctx, from, Amount::new(5)).unwrap();
        assert_eq!(balance(&mut ctx, from).unwrap(), Amount::ZERO);
        assert!(sub_balance(&mut ctx, from, Amount::new(1)).is_err());
    }
}
