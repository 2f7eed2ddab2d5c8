//! Genesis: the height-0 block and the state it commits.
//!
//! The genesis block has no transactions and no signatures. Its state holds
//! the initial formulators, funded accounts and the initial rank schedule,
//! and its context hash commits to all of them, so every node configured
//! with the same genesis derives the same genesis hash.

use std::sync::Arc;

use pof_consensus::{encode_timeout_count, Rank, RankSchedule};
use pof_state::{Context, ContextIdentity, EmptyLoader, StateLayer};
use pof_transactions::{vault, Block};
use pof_types::{Account, Address, Amount, ChainParams, Hash256, Header, PublicHash, Timestamp};
use serde::{Deserialize, Serialize};

use crate::LedgerError;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenesisFormulator {
    pub name: String,
    pub key_hash: PublicHash,
    pub generator_hash: PublicHash,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenesisAccount {
    pub name: String,
    pub key_hash: PublicHash,
    pub balance: Amount,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GenesisConfig {
    pub params: ChainParams,
    pub timestamp: Timestamp,
    /// Initial formulators in rank order.
    pub formulators: Vec<GenesisFormulator>,
    pub accounts: Vec<GenesisAccount>,
}

/// Address of the `index`-th genesis account. Formulators come first.
pub fn genesis_address(index: u16) -> Address {
    Address::new(0, index, 1)
}

/// Build the genesis block and its state.
pub fn genesis_block(config: &GenesisConfig) -> Result<(Block, StateLayer), LedgerError> {
    let mut ctx = Context::new(
        Arc::new(EmptyLoader),
        ContextIdentity {
            params: config.params.clone(),
            target_height: 0,
            last_hash: Hash256::ZERO,
            last_timestamp: Timestamp::EPOCH,
        },
    );

    let count = config.formulators.len() + config.accounts.len();
    if count > usize::from(u16::MAX) {
        return Err(LedgerError::InvalidBlock("too many genesis accounts"));
    }

    let mut ranks = Vec::with_capacity(config.formulators.len());
    let mut index = 0u16;
    for f in &config.formulators {
        let address = genesis_address(index);
        ctx.create_account(Account::formulator(
            address,
            f.name.clone(),
            f.key_hash,
            f.generator_hash,
        ))?;
        ranks.push(Rank::new(address, f.generator_hash));
        index += 1;
    }
    for a in &config.accounts {
        let address = genesis_address(index);
        ctx.create_account(Account::single(address, a.name.clone(), a.key_hash))?;
        if !a.balance.is_zero() {
            vault::add_balance(&mut ctx, address, a.balance)?;
        }
        index += 1;
    }
    RankSchedule::new(ranks).save(&mut ctx)?;

    let header = Header {
        chain_id: config.params.chain_id,
        version: config.params.version,
        height: 0,
        prev_hash: Hash256::ZERO,
        level_root_hash: Hash256::ZERO,
        context_hash: ctx.hash(),
        timestamp: config.timestamp,
        generator: Address::ZERO,
        consensus_data: encode_timeout_count(0),
    };
    Ok((Block::new(header), ctx.state()))
}
