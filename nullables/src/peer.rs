//! Nullable peer: records packets instead of sending them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use pof_messages::Message;
use pof_network::Peer;

pub struct NullPeer {
    id: String,
    name: String,
    sent: Mutex<Vec<Vec<u8>>>,
    closed: AtomicBool,
}

impl NullPeer {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            sent: Mutex::new(Vec::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Raw packets sent so far.
    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }

    /// Sent packets decoded as protocol messages. Undecodable packets are skipped.
    pub fn sent_messages(&self) -> Vec<Message> {
        self.sent()
            .iter()
            .filter_map(|p| Message::from_packet(p).ok())
            .collect()
    }

    /// Drain and decode everything sent so far.
    pub fn take_messages(&self) -> Vec<Message> {
        let packets = std::mem::take(&mut *self.sent.lock().unwrap());
        packets
            .iter()
            .filter_map(|p| Message::from_packet(p).ok())
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Peer for NullPeer {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn send_packet(&self, packet: Vec<u8>) {
        if !self.is_closed() {
            self.sent.lock().unwrap().push(packet);
        }
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pof_messages::sync::StatusMessage;
    use pof_types::Hash256;

    #[test]
    fn records_and_decodes() {
        let peer = NullPeer::new("p");
        let msg = Message::Status(StatusMessage {
            version: 1,
            height: 3,
            last_hash: Hash256::ZERO,
        });
        peer.send_packet(msg.to_packet().unwrap());
        assert_eq!(peer.sent_messages().len(), 1);
        assert_eq!(peer.take_messages().len(), 1);
        assert!(peer.sent().is_empty());
    }

    #[test]
    fn closed_peer_drops_packets() {
        let peer = NullPeer::new("p");
        peer.close();
        peer.send_packet(vec![1, 2, 3]);
        assert!(peer.sent().is_empty());
    }
}
