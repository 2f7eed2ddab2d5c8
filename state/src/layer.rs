//! A single layer of state deltas.

use std::collections::{BTreeMap, BTreeSet};

use pof_types::{Account, Address, Event, TxOut, Utxo};

use crate::keys::{AccountDataKey, ProcessDataKey};

/// Result of looking a key up in one layer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    Deleted,
}

impl<T> Lookup<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Lookup::Found(v) => Lookup::Found(f(v)),
            Lookup::Deleted => Lookup::Deleted,
        }
    }
}

/// Values read through this layer while it was the top layer.
///
/// The cache never feeds the state digest and is dropped when the layer is
/// folded into its parent.
#[derive(Clone, Debug, Default)]
pub struct ReadCache {
    pub seqs: BTreeMap<Address, u64>,
    pub accounts: BTreeMap<Address, Account>,
    pub account_names: BTreeMap<String, Address>,
    pub account_data: BTreeMap<AccountDataKey, Vec<u8>>,
    pub process_data: BTreeMap<ProcessDataKey, Vec<u8>>,
    pub utxos: BTreeMap<u64, Utxo>,
}

/// Writes performed in one layer. Deletions are explicit tombstones that
/// shadow anything beneath.
///
/// Every map is ordered, so the digest enumerates keys in sorted order on
/// every node.
#[derive(Clone, Debug, Default)]
pub struct StateLayer {
    pub seqs: BTreeMap<Address, u64>,
    pub accounts: BTreeMap<Address, Account>,
    pub deleted_accounts: BTreeSet<Address>,
    pub account_names: BTreeMap<String, Address>,
    pub deleted_account_names: BTreeSet<String>,
    pub account_data: BTreeMap<AccountDataKey, Vec<u8>>,
    pub deleted_account_data: BTreeSet<AccountDataKey>,
    pub process_data: BTreeMap<ProcessDataKey, Vec<u8>>,
    pub deleted_process_data: BTreeSet<ProcessDataKey>,
    pub created_utxos: BTreeMap<u64, TxOut>,
    pub deleted_utxos: BTreeSet<u64>,
    pub events: Vec<Event>,
    /// Next event number. Inherited from the parent when the layer is pushed.
    pub event_n: u16,
    pub cache: ReadCache,
}

impl StateLayer {
    /// A fresh layer continuing the parent's event numbering.
    pub fn child_of(parent: &StateLayer) -> Self {
        Self {
            event_n: parent.event_n,
            ..Self::default()
        }
    }

    pub fn seq(&self, address: &Address) -> Option<u64> {
        self.seqs
            .get(address)
            .or_else(|| self.cache.seqs.get(address))
            .copied()
    }

    pub fn account(&self, address: &Address) -> Option<Lookup<&Account>> {
        if self.deleted_accounts.contains(address) {
            return Some(Lookup::Deleted);
        }
        self.accounts
            .get(address)
            .or_else(|| self.cache.accounts.get(address))
            .map(Lookup::Found)
    }

    pub fn address_by_name(&self, name: &str) -> Option<Lookup<Address>> {
        if self.deleted_account_names.contains(name) {
            return Some(Lookup::Deleted);
        }
        self.account_names
            .get(name)
            .or_else(|| self.cache.account_names.get(name))
            .map(|a| Lookup::Found(*a))
    }

    pub fn account_data(&self, key: &AccountDataKey) -> Option<Lookup<&Vec<u8>>> {
        if self.deleted_account_data.contains(key) {
            return Some(Lookup::Deleted);
        }
        self.account_data
            .get(key)
            .or_else(|| self.cache.account_data.get(key))
            .map(Lookup::Found)
    }

    pub fn process_data(&self, key: &ProcessDataKey) -> Option<Lookup<&Vec<u8>>> {
        if self.deleted_process_data.contains(key) {
            return Some(Lookup::Deleted);
        }
        self.process_data
            .get(key)
            .or_else(|| self.cache.process_data.get(key))
            .map(Lookup::Found)
    }

    pub fn utxo(&self, id: u64) -> Option<Lookup<Utxo>> {
        if self.deleted_utxos.contains(&id) {
            return Some(Lookup::Deleted);
        }
        if let Some(tx_out) = self.created_utxos.get(&id) {
            return Some(Lookup::Found(Utxo {
                id,
                tx_out: tx_out.clone(),
            }));
        }
        self.cache.utxos.get(&id).cloned().map(Lookup::Found)
    }

    /// Fold a child layer's writes into this one. The child's read cache is discarded.
    pub fn merge(&mut self, child: StateLayer) {
        self.seqs.extend(child.seqs);

        for (address, account) in child.accounts {
            self.deleted_accounts.remove(&address);
            self.accounts.insert(address, account);
        }
        for address in child.deleted_accounts {
            self.accounts.remove(&address);
            self.cache.accounts.remove(&address);
            self.deleted_accounts.insert(address);
        }

        for (name, address) in child.account_names {
            self.deleted_account_names.remove(&name);
            self.account_names.insert(name, address);
        }
        for name in child.deleted_account_names {
            self.account_names.remove(&name);
            self.cache.account_names.remove(&name);
            self.deleted_account_names.insert(name);
        }

        for (key, value) in child.account_data {
            self.deleted_account_data.remove(&key);
            self.account_data.insert(key, value);
        }
        for key in child.deleted_account_data {
            self.account_data.remove(&key);
            self.cache.account_data.remove(&key);
            self.deleted_account_data.insert(key);
        }

        for (key, value) in child.process_data {
            self.deleted_process_data.remove(&key);
            self.process_data.insert(key, value);
        }
        for key in child.deleted_process_data {
            self.process_data.remove(&key);
            self.cache.process_data.remove(&key);
            self.deleted_process_data.insert(key);
        }

        for (id, tx_out) in child.created_utxos {
            self.deleted_utxos.remove(&id);
            self.created_utxos.insert(id, tx_out);
        }
        for id in child.deleted_utxos {
            self.cache.utxos.remove(&id);
            // An output created and spent before reaching this layer leaves no trace.
            if self.created_utxos.remove(&id).is_none() {
                self.deleted_utxos.insert(id);
            }
        }

        self.events.extend(child.events);
        self.event_n = child.event_n;
    }

    /// True when the layer carries no writes.
    pub fn is_empty(&self) -> bool {
        self.seqs.is_empty()
            && self.accounts.is_empty()
            && self.deleted_accounts.is_empty()
            && self.account_names.is_empty()
            && self.deleted_account_names.is_empty()
            && self.account_data.is_empty()
            && self.deleted_account_data.is_empty()
            && self.process_data.is_empty()
            && self.deleted_process_data.is_empty()
            && self.created_utxos.is_empty()
            && self.deleted_utxos.is_empty()
            && self.events.is_empty()
    }
}
