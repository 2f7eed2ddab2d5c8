//! The layered state context.

use std::sync::Arc;

use pof_types::{Account, Address, ChainParams, Event, Hash256, Timestamp, TxOut, Utxo};

use crate::digest::state_digest;
use crate::error::StateError;
use crate::keys::{AccountDataKey, ProcessDataKey};
use crate::layer::{Lookup, ReadCache, StateLayer};
use crate::loader::Loader;

/// The chain position a context executes at. Captured when the context is
/// created, so it stays fixed even if the committed chain moves on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContextIdentity {
    pub params: ChainParams,
    /// Height of the block this context executes.
    pub target_height: u32,
    /// Hash of the header at `target_height - 1`.
    pub last_hash: Hash256,
    pub last_timestamp: Timestamp,
}

/// Handle returned by [`Context::snapshot`]: the arena index of the pushed layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Snapshot(usize);

/// An arena of state layers over a loader.
///
/// Layer 0 is the base; the last layer is the top. Reads memoize into the
/// top layer only. A context is owned by one execution path; to build on a
/// finished context, freeze it in an `Arc` and call [`Context::next_context`].
pub struct Context {
    identity: ContextIdentity,
    loader: Arc<dyn Loader>,
    layers: Vec<StateLayer>,
}

impl Context {
    pub fn new(loader: Arc<dyn Loader>, identity: ContextIdentity) -> Self {
        Self {
            identity,
            loader,
            layers: vec![StateLayer::default()],
        }
    }

    /// A context for the following height that reads through this one.
    pub fn next_context(self: &Arc<Self>, last_hash: Hash256, last_timestamp: Timestamp) -> Context {
        let identity = ContextIdentity {
            params: self.identity.params.clone(),
            target_height: self.identity.target_height + 1,
            last_hash,
            last_timestamp,
        };
        let loader: Arc<dyn Loader> = self.clone();
        Context::new(loader, identity)
    }

    pub fn identity(&self) -> &ContextIdentity {
        &self.identity
    }

    pub fn chain_params(&self) -> &ChainParams {
        &self.identity.params
    }

    pub fn target_height(&self) -> u32 {
        self.identity.target_height
    }

    pub fn last_hash(&self) -> Hash256 {
        self.identity.last_hash
    }

    pub fn last_timestamp(&self) -> Timestamp {
        self.identity.last_timestamp
    }

    // ── Layers ──────────────────────────────────────────────────────────

    pub fn depth(&self) -> usize {
        self.layers.len()
    }

    /// True while an unresolved snapshot is open.
    pub fn is_dirty(&self) -> bool {
        self.layers.len() > 1
    }

    /// Push a new top layer.
    pub fn snapshot(&mut self) -> Snapshot {
        let layer = StateLayer::child_of(self.top());
        self.layers.push(layer);
        Snapshot(self.layers.len() - 1)
    }

    /// Drop every layer pushed at or after `snapshot`.
    pub fn revert(&mut self, snapshot: Snapshot) -> Result<(), StateError> {
        self.check_snapshot(snapshot)?;
        self.layers.truncate(snapshot.0);
        Ok(())
    }

    /// Fold every layer pushed at or after `snapshot` into the layer below it.
    pub fn commit(&mut self, snapshot: Snapshot) -> Result<(), StateError> {
        self.check_snapshot(snapshot)?;
        while self.layers.len() > snapshot.0 {
            let Some(child) = self.layers.pop() else {
                break;
            };
            self.top_mut().merge(child);
        }
        Ok(())
    }

    fn check_snapshot(&self, snapshot: Snapshot) -> Result<(), StateError> {
        if snapshot.0 == 0 || snapshot.0 >= self.layers.len() {
            return Err(StateError::InvalidSnapshot(snapshot.0));
        }
        Ok(())
    }

    fn top(&self) -> &StateLayer {
        &self.layers[self.layers.len() - 1]
    }

    fn top_mut(&mut self) -> &mut StateLayer {
        let top = self.layers.len() - 1;
        &mut self.layers[top]
    }

    /// Walk from the top layer down. The flag tells whether the hit was in the top layer.
    fn lookup<T>(&self, local: impl Fn(&StateLayer) -> Option<Lookup<T>>) -> Option<(bool, Lookup<T>)> {
        let top = self.layers.len() - 1;
        self.layers
            .iter()
            .enumerate()
            .rev()
            .find_map(|(i, layer)| local(layer).map(|hit| (i == top, hit)))
    }

    /// Read through the layers and the loader, caching anything found below
    /// the top layer into the top layer.
    fn resolve<T: Clone>(
        &mut self,
        local: impl Fn(&StateLayer) -> Option<Lookup<T>>,
        load: impl FnOnce(&dyn Loader) -> Result<Option<T>, StateError>,
        cache: impl FnOnce(&mut ReadCache, T),
    ) -> Result<Option<Lookup<T>>, StateError> {
        match self.lookup(local) {
            Some((true, hit)) | Some((false, hit @ Lookup::Deleted)) => Ok(Some(hit)),
            Some((false, Lookup::Found(value))) => {
                cache(&mut self.top_mut().cache, value.clone());
                Ok(Some(Lookup::Found(value)))
            }
            None => match load(self.loader.as_ref())? {
                Some(value) => {
                    cache(&mut self.top_mut().cache, value.clone());
                    Ok(Some(Lookup::Found(value)))
                }
                None => Ok(None),
            },
        }
    }

    /// Read without touching any cache.
    fn peek<T>(
        &self,
        local: impl Fn(&StateLayer) -> Option<Lookup<T>>,
        load: impl FnOnce(&dyn Loader) -> Result<Option<T>, StateError>,
    ) -> Result<Option<T>, StateError> {
        match self.lookup(local) {
            Some((_, Lookup::Found(value))) => Ok(Some(value)),
            Some((_, Lookup::Deleted)) => Ok(None),
            None => load(self.loader.as_ref()),
        }
    }

    // ── Sequences ───────────────────────────────────────────────────────

    pub fn seq(&mut self, address: &Address) -> Result<u64, StateError> {
        let found = self.resolve(
            |l| l.seq(address).map(Lookup::Found),
            |loader| loader.load_seq(address).map(|s| (s > 0).then_some(s)),
            |cache, seq| {
                cache.seqs.insert(*address, seq);
            },
        )?;
        Ok(match found {
            Some(Lookup::Found(seq)) => seq,
            _ => 0,
        })
    }

    pub fn add_seq(&mut self, address: &Address) -> Result<u64, StateError> {
        let next = self.seq(address)? + 1;
        self.top_mut().seqs.insert(*address, next);
        Ok(next)
    }

    // ── Accounts ────────────────────────────────────────────────────────

    pub fn account(&mut self, address: &Address) -> Result<Account, StateError> {
        let found = self.resolve(
            |l| l.account(address).map(|hit| hit.map(Account::clone)),
            |loader| loader.load_account(address),
            |cache, account| {
                cache.accounts.insert(*address, account);
            },
        )?;
        match found {
            Some(Lookup::Found(account)) => Ok(account),
            Some(Lookup::Deleted) => Err(StateError::DeletedAccount(*address)),
            None => Err(StateError::NotExistAccount(*address)),
        }
    }

    pub fn has_account(&mut self, address: &Address) -> Result<bool, StateError> {
        match self.account(address) {
            Ok(_) => Ok(true),
            Err(StateError::NotExistAccount(_)) | Err(StateError::DeletedAccount(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn address_by_name(&mut self, name: &str) -> Result<Address, StateError> {
        let found = self.resolve(
            |l| l.address_by_name(name),
            |loader| loader.load_address_by_name(name),
            |cache, address| {
                cache.account_names.insert(name.to_string(), address);
            },
        )?;
        match found {
            Some(Lookup::Found(address)) => Ok(address),
            _ => Err(StateError::NotExistAccountName(name.to_string())),
        }
    }

    pub fn has_account_name(&mut self, name: &str) -> Result<bool, StateError> {
        match self.address_by_name(name) {
            Ok(_) => Ok(true),
            Err(StateError::NotExistAccountName(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Create an account at the height being executed.
    ///
    /// Fails with `ExistAccount`/`ExistAccountName` if the address or name
    /// resolves, or was deleted in the current top layer.
    pub fn create_account(&mut self, account: Account) -> Result<(), StateError> {
        self.insert_account(account, false)
    }

    /// Like [`Context::create_account`], but reuses an address or name
    /// deleted in the current top layer.
    pub fn create_account_ignore_delete(&mut self, account: Account) -> Result<(), StateError> {
        self.insert_account(account, true)
    }

    fn insert_account(&mut self, account: Account, ignore_delete: bool) -> Result<(), StateError> {
        let address = account.address;
        if address.height() != self.identity.target_height {
            return Err(StateError::InvalidAddressHeight {
                address,
                expected: self.identity.target_height,
            });
        }
        if address.is_zero() {
            return Err(StateError::EmptyAddressAccount);
        }
        if account.name.parse::<Address>().is_ok() {
            return Err(StateError::AddressAsAccountName(account.name));
        }
        if !ignore_delete {
            let top = self.top();
            if top.deleted_accounts.contains(&address) {
                return Err(StateError::ExistAccount(address));
            }
            if top.deleted_account_names.contains(&account.name) {
                return Err(StateError::ExistAccountName(account.name));
            }
        }
        if self.has_account(&address)? {
            return Err(StateError::ExistAccount(address));
        }
        if self.has_account_name(&account.name)? {
            return Err(StateError::ExistAccountName(account.name));
        }

        let top = self.top_mut();
        top.deleted_accounts.remove(&address);
        top.deleted_account_names.remove(&account.name);
        top.account_names.insert(account.name.clone(), address);
        top.accounts.insert(address, account);
        Ok(())
    }

    /// Delete an account and its name. The account must currently resolve.
    pub fn delete_account(&mut self, address: &Address) -> Result<(), StateError> {
        let account = self.account(address)?;
        let top = self.top_mut();
        top.accounts.remove(address);
        top.cache.accounts.remove(address);
        top.deleted_accounts.insert(*address);
        top.account_names.remove(&account.name);
        top.cache.account_names.remove(&account.name);
        top.deleted_account_names.insert(account.name);
        Ok(())
    }

    // ── Opaque data ─────────────────────────────────────────────────────

    pub fn account_data(&mut self, key: &AccountDataKey) -> Result<Option<Vec<u8>>, StateError> {
        let found = self.resolve(
            |l| l.account_data(key).map(|hit| hit.map(Vec::clone)),
            |loader| loader.load_account_data(key),
            |cache, value| {
                cache.account_data.insert(key.clone(), value);
            },
        )?;
        Ok(match found {
            Some(Lookup::Found(value)) => Some(value),
            _ => None,
        })
    }

    /// An empty value deletes the key.
    pub fn set_account_data(&mut self, key: AccountDataKey, value: Vec<u8>) {
        let top = self.top_mut();
        top.cache.account_data.remove(&key);
        if value.is_empty() {
            top.account_data.remove(&key);
            top.deleted_account_data.insert(key);
        } else {
            top.deleted_account_data.remove(&key);
            top.account_data.insert(key, value);
        }
    }

    pub fn process_data(&mut self, key: &ProcessDataKey) -> Result<Option<Vec<u8>>, StateError> {
        let found = self.resolve(
            |l| l.process_data(key).map(|hit| hit.map(Vec::clone)),
            |loader| loader.load_process_data(key),
            |cache, value| {
                cache.process_data.insert(key.clone(), value);
            },
        )?;
        Ok(match found {
            Some(Lookup::Found(value)) => Some(value),
            _ => None,
        })
    }

    /// An empty value deletes the key.
    pub fn set_process_data(&mut self, key: ProcessDataKey, value: Vec<u8>) {
        let top = self.top_mut();
        top.cache.process_data.remove(&key);
        if value.is_empty() {
            top.process_data.remove(&key);
            top.deleted_process_data.insert(key);
        } else {
            top.deleted_process_data.remove(&key);
            top.process_data.insert(key, value);
        }
    }

    // ── Unspent outputs ─────────────────────────────────────────────────

    pub fn utxo(&mut self, id: u64) -> Result<Utxo, StateError> {
        let found = self.resolve(
            |l| l.utxo(id),
            |loader| loader.load_utxo(id),
            |cache, utxo| {
                cache.utxos.insert(id, utxo);
            },
        )?;
        match found {
            Some(Lookup::Found(utxo)) => Ok(utxo),
            Some(Lookup::Deleted) => Err(StateError::UsedUtxo(id)),
            None => Err(StateError::NotExistUtxo(id)),
        }
    }

    pub fn has_utxo(&mut self, id: u64) -> Result<bool, StateError> {
        match self.utxo(id) {
            Ok(_) => Ok(true),
            Err(StateError::NotExistUtxo(_)) | Err(StateError::UsedUtxo(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn create_utxo(&mut self, id: u64, tx_out: TxOut) -> Result<(), StateError> {
        if self.has_utxo(id)? {
            return Err(StateError::ExistUtxo(id));
        }
        let top = self.top_mut();
        top.deleted_utxos.remove(&id);
        top.created_utxos.insert(id, tx_out);
        Ok(())
    }

    /// Spend an output. It must currently resolve.
    pub fn delete_utxo(&mut self, id: u64) -> Result<(), StateError> {
        self.utxo(id)?;
        let top = self.top_mut();
        top.cache.utxos.remove(&id);
        if top.created_utxos.remove(&id).is_none() {
            top.deleted_utxos.insert(id);
        }
        Ok(())
    }

    // ── Events ──────────────────────────────────────────────────────────

    /// Append an event, stamping it with the next event number.
    pub fn emit_event(&mut self, mut event: Event) -> Result<u16, StateError> {
        let top = self.top_mut();
        let n = top.event_n;
        top.event_n = n.checked_add(1).ok_or(StateError::TooManyEvents)?;
        event.n = n;
        top.events.push(event);
        Ok(n)
    }

    /// All events across layers, oldest first.
    pub fn events(&self) -> Vec<Event> {
        self.layers
            .iter()
            .flat_map(|layer| layer.events.iter().cloned())
            .collect()
    }

    // ── Results ─────────────────────────────────────────────────────────

    /// Every layer's writes folded into one layer, without read caches.
    pub fn state(&self) -> StateLayer {
        let mut base = self.layers[0].clone();
        base.cache = ReadCache::default();
        for layer in &self.layers[1..] {
            base.merge(layer.clone());
        }
        base
    }

    /// Deterministic digest of the identity and all writes.
    pub fn hash(&self) -> Hash256 {
        if self.is_dirty() {
            state_digest(&self.identity, &self.state())
        } else {
            state_digest(&self.identity, &self.layers[0])
        }
    }
}

impl Loader for Context {
    fn load_seq(&self, address: &Address) -> Result<u64, StateError> {
        let seq = self.peek(
            |l| l.seq(address).map(Lookup::Found),
            |loader| loader.load_seq(address).map(Some),
        )?;
        Ok(seq.unwrap_or(0))
    }

    fn load_account(&self, address: &Address) -> Result<Option<Account>, StateError> {
        self.peek(
            |l| l.account(address).map(|hit| hit.map(Account::clone)),
            |loader| loader.load_account(address),
        )
    }

    fn load_address_by_name(&self, name: &str) -> Result<Option<Address>, StateError> {
        self.peek(|l| l.address_by_name(name), |loader| loader.load_address_by_name(name))
    }

    fn load_account_data(&self, key: &AccountDataKey) -> Result<Option<Vec<u8>>, StateError> {
        self.peek(
            |l| l.account_data(key).map(|hit| hit.map(Vec::clone)),
            |loader| loader.load_account_data(key),
        )
    }

    fn load_process_data(&self, key: &ProcessDataKey) -> Result<Option<Vec<u8>>, StateError> {
        self.peek(
            |l| l.process_data(key).map(|hit| hit.map(Vec::clone)),
            |loader| loader.load_process_data(key),
        )
    }

    fn load_utxo(&self, id: u64) -> Result<Option<Utxo>, StateError> {
        self.peek(|l| l.utxo(id), |loader| loader.load_utxo(id))
    }
}
