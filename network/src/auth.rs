//! Authenticated formulator sessions on the observer side.
//!
//! After a successful handshake, a peer id is mapped to the formulator
//! address and key hash it proved. One session per address: a newer
//! connection from the same address supersedes the old one.

use std::collections::HashMap;

use pof_types::{Address, PublicHash};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FormulatorIdentity {
    pub address: Address,
    pub public_hash: PublicHash,
}

pub struct PeerAuth {
    authenticated_peers: HashMap<String, FormulatorIdentity>,
}

impl PeerAuth {
    pub fn new() -> Self {
        Self {
            authenticated_peers: HashMap::new(),
        }
    }

    /// Record a successful handshake. Returns the id of a previous session
    /// for the same address, which the caller should close.
    pub fn authenticate(&mut self, peer_id: &str, identity: FormulatorIdentity) -> Option<String> {
        let replaced = self.peer_for(&identity.address).map(str::to_owned);
        if let Some(old) = &replaced {
            self.authenticated_peers.remove(old);
        }
        self.authenticated_peers.insert(peer_id.to_owned(), identity);
        replaced.filter(|old| old != peer_id)
    }

    pub fn is_authenticated(&self, peer_id: &str) -> bool {
        self.authenticated_peers.contains_key(peer_id)
    }

    pub fn identity(&self, peer_id: &str) -> Option<&FormulatorIdentity> {
        self.authenticated_peers.get(peer_id)
    }

    /// The session currently bound to a formulator address.
    pub fn peer_for(&self, address: &Address) -> Option<&str> {
        self.authenticated_peers
            .iter()
            .find(|(_, id)| id.address == *address)
            .map(|(peer, _)| peer.as_str())
    }

    pub fn deauthenticate(&mut self, peer_id: &str) {
        self.authenticated_peers.remove(peer_id);
    }

    pub fn count(&self) -> usize {
        self.authenticated_peers.len()
    }
}

impl Default for PeerAuth {
    fn default() -> Self {
        Self::new()
    }
}
