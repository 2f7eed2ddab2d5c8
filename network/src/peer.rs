//! Connected peers.
//!
//! Handlers send to peers while holding node locks, so `send_packet` only
//! enqueues; a per-peer writer task owns the socket's write half.

use std::sync::{Arc, Mutex};

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::debug;

use crate::framing::write_framed;

/// A remote node that packets can be sent to.
pub trait Peer: Send + Sync {
    /// Connection-unique identifier.
    fn id(&self) -> &str;

    /// Human-readable label, usually the authenticated address.
    fn name(&self) -> &str;

    /// Queue a packet. Packets sent after `close` are dropped.
    fn send_packet(&self, packet: Vec<u8>);

    fn close(&self);
}

/// A peer backed by any async byte stream, typically a TCP write half.
pub struct TcpPeer {
    id: String,
    name: String,
    outbound: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
}

impl TcpPeer {
    /// Start the writer task and return the handle.
    pub fn spawn<W>(id: impl Into<String>, name: impl Into<String>, writer: W) -> Arc<Self>
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let id = id.into();
        let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();

        let peer_id = id.clone();
        tokio::spawn(async move {
            let mut writer = writer;
            while let Some(packet) = rx.recv().await {
                if let Err(e) = write_framed(&mut writer, &packet).await {
                    debug!(peer = %peer_id, error = %e, "peer write failed");
                    break;
                }
            }
            let _ = writer.shutdown().await;
        });

        Arc::new(Self {
            id,
            name: name.into(),
            outbound: Mutex::new(Some(tx)),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.outbound
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map_or(true, |tx| tx.is_closed())
    }
}

impl Peer for TcpPeer {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn send_packet(&self, packet: Vec<u8>) {
        let guard = self.outbound.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(tx) = guard.as_ref() {
            if tx.send(packet).is_err() {
                debug!(peer = %self.id, "dropping packet for closed peer");
            }
        }
    }

    fn close(&self) {
        self.outbound
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
    }
}
