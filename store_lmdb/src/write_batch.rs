//! Write batching: a block and its state layer go into one LMDB write
//! transaction.
//!
//! If the batch is dropped without calling [`WriteBatch::commit`], all
//! operations are rolled back (the underlying LMDB transaction is aborted).

use heed::RwTxn;

use pof_state::StateLayer;
use pof_transactions::Block;

use crate::environment::LmdbEnvironment;
use crate::LmdbError;

pub(crate) const HEIGHT_KEY: &[u8] = b"height";

pub struct WriteBatch<'a> {
    txn: RwTxn<'a>,
    env: &'a LmdbEnvironment,
}

impl<'a> WriteBatch<'a> {
    pub(crate) fn new(env: &'a LmdbEnvironment) -> Result<Self, LmdbError> {
        let txn = env.env().write_txn()?;
        Ok(Self { txn, env })
    }

    // ── Block operations ────────────────────────────────────────────────

    /// Put a block, its hash index and the new tip height.
    pub fn put_block(&mut self, block: &Block) -> Result<(), LmdbError> {
        let key = block.height().to_be_bytes();
        let bytes = bincode::serialize(block)?;
        self.env.blocks_db.put(&mut self.txn, &key, &bytes)?;
        self.env
            .hashes_db
            .put(&mut self.txn, &key, block.hash().as_bytes())?;
        self.env
            .meta_db
            .put(&mut self.txn, HEIGHT_KEY, &block.height().to_le_bytes())?;
        Ok(())
    }

    // ── State operations ────────────────────────────────────────────────

    /// Apply the writes and tombstones of a state layer.
    pub fn apply_state(&mut self, state: &StateLayer) -> Result<(), LmdbError> {
        let env = self.env;
        let txn = &mut self.txn;

        for (address, seq) in &state.seqs {
            env.seqs_db.put(txn, address.as_bytes(), &seq.to_le_bytes())?;
        }

        for address in &state.deleted_accounts {
            env.accounts_db.delete(txn, address.as_bytes())?;
        }
        for (address, account) in &state.accounts {
            env.accounts_db
                .put(txn, address.as_bytes(), &bincode::serialize(account)?)?;
        }

        for name in &state.deleted_account_names {
            env.names_db.delete(txn, name.as_bytes())?;
        }
        for (name, address) in &state.account_names {
            env.names_db.put(txn, name.as_bytes(), address.as_bytes())?;
        }

        for key in &state.deleted_account_data {
            env.account_data_db.delete(txn, &bincode::serialize(key)?)?;
        }
        for (key, value) in &state.account_data {
            env.account_data_db.put(txn, &bincode::serialize(key)?, value)?;
        }

        for key in &state.deleted_process_data {
            env.process_data_db.delete(txn, &bincode::serialize(key)?)?;
        }
        for (key, value) in &state.process_data {
            env.process_data_db.put(txn, &bincode::serialize(key)?, value)?;
        }

        for id in &state.deleted_utxos {
            env.utxos_db.delete(txn, &id.to_be_bytes())?;
        }
        for (id, tx_out) in &state.created_utxos {
            env.utxos_db
                .put(txn, &id.to_be_bytes(), &bincode::serialize(tx_out)?)?;
        }

        for event in &state.events {
            let mut key = event.height.to_be_bytes().to_vec();
            key.extend_from_slice(&event.n.to_be_bytes());
            env.events_db.put(txn, &key, &bincode::serialize(event)?)?;
        }
        Ok(())
    }

    // ── Commit ──────────────────────────────────────────────────────────

    pub fn commit(self) -> Result<(), LmdbError> {
        self.txn.commit()?;
        Ok(())
    }
}
