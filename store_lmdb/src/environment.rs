//! LMDB environment setup.

use std::path::Path;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};

use crate::LmdbError;

const MAX_DBS: u32 = 16;

/// Wraps the LMDB environment and all database handles.
pub struct LmdbEnvironment {
    env: Env,
    /// height (BE u32) -> bincode block
    pub(crate) blocks_db: Database<Bytes, Bytes>,
    /// height (BE u32) -> header hash
    pub(crate) hashes_db: Database<Bytes, Bytes>,
    pub(crate) meta_db: Database<Bytes, Bytes>,
    /// address -> sequence (LE u64)
    pub(crate) seqs_db: Database<Bytes, Bytes>,
    /// address -> bincode account
    pub(crate) accounts_db: Database<Bytes, Bytes>,
    /// account name -> address
    pub(crate) names_db: Database<Bytes, Bytes>,
    /// bincode AccountDataKey -> value
    pub(crate) account_data_db: Database<Bytes, Bytes>,
    /// bincode ProcessDataKey -> value
    pub(crate) process_data_db: Database<Bytes, Bytes>,
    /// utxo id (BE u64) -> bincode TxOut
    pub(crate) utxos_db: Database<Bytes, Bytes>,
    /// height (BE u32) ++ event number (BE u16) -> bincode event
    pub(crate) events_db: Database<Bytes, Bytes>,
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given path.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;
        // SAFETY: the environment is opened once per process and path.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(MAX_DBS)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let blocks_db = env.create_database(&mut wtxn, Some("blocks"))?;
        let hashes_db = env.create_database(&mut wtxn, Some("hashes"))?;
        let meta_db = env.create_database(&mut wtxn, Some("meta"))?;
        let seqs_db = env.create_database(&mut wtxn, Some("seqs"))?;
        let accounts_db = env.create_database(&mut wtxn, Some("accounts"))?;
        let names_db = env.create_database(&mut wtxn, Some("account_names"))?;
        let account_data_db = env.create_database(&mut wtxn, Some("account_data"))?;
        let process_data_db = env.create_database(&mut wtxn, Some("process_data"))?;
        let utxos_db = env.create_database(&mut wtxn, Some("utxos"))?;
        let events_db = env.create_database(&mut wtxn, Some("events"))?;
        wtxn.commit()?;

        tracing::debug!(path = %path.display(), map_size, "opened LMDB environment");

        Ok(Self {
            env,
            blocks_db,
            hashes_db,
            meta_db,
            seqs_db,
            accounts_db,
            names_db,
            account_data_db,
            process_data_db,
            utxos_db,
            events_db,
        })
    }

    pub fn env(&self) -> &Env {
        &self.env
    }
}
