//! Outbound links from the formulator to each configured observer.
//!
//! A link dials the observer, runs the formulator side of the handshake,
//! and feeds every received packet to the [`FormulatorNode`]. A dropped
//! link is redialed after the reconnect delay until shutdown.

use std::sync::Arc;

use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn, Instrument};

use pof_messages::MAX_PACKET_SIZE;
use pof_network::{connect_observer, read_framed, NetworkError, Peer, TcpPeer};
use pof_types::PublicHash;

use crate::formulator::FormulatorNode;
use crate::tracing_spans::formulator_session_span;
use crate::NodeError;

/// Start one link task per configured observer.
pub fn spawn_observer_links(node: &Arc<FormulatorNode>) -> Result<Vec<JoinHandle<()>>, NodeError> {
    let hashes = node.config.observer_hashes()?;
    let handles = node
        .config
        .observers
        .iter()
        .zip(hashes)
        .map(|(observer, public_hash)| {
            let node = Arc::clone(node);
            let addr = observer.address.clone();
            tokio::spawn(async move { run_link(node, public_hash, addr).await })
        })
        .collect();
    Ok(handles)
}

async fn run_link(node: Arc<FormulatorNode>, observer: PublicHash, addr: String) {
    let mut shutdown = node.shutdown.subscribe();
    loop {
        if node.shutdown.is_triggered() {
            return;
        }
        let span = formulator_session_span(&addr);
        match connect_once(&node, observer, &addr, &mut shutdown).instrument(span).await {
            Ok(()) => debug!(observer = %addr, "observer link closed"),
            Err(e) => warn!(observer = %addr, error = %e, "observer link failed"),
        }
        tokio::select! {
            _ = tokio::time::sleep(node.config.reconnect_delay()) => {}
            _ = shutdown.recv() => return,
        }
    }
}

async fn connect_once(
    node: &Arc<FormulatorNode>,
    observer: PublicHash,
    addr: &str,
    shutdown: &mut broadcast::Receiver<()>,
) -> Result<(), NodeError> {
    let mut stream = TcpStream::connect(addr).await?;
    stream.set_nodelay(true)?;
    let handshake = node.config.handshake();
    connect_observer(
        &mut stream,
        &node.key,
        node.address,
        &handshake,
        node.clock.as_ref(),
        |public_hash| *public_hash == observer,
    )
    .await?;

    let (mut reader, writer) = stream.into_split();
    let peer: Arc<dyn Peer> = TcpPeer::spawn(hex::encode(observer.0), addr, writer);
    info!(observer = %addr, "observer link established");
    node.on_observer_connected(Arc::clone(&peer)).await;

    let result = loop {
        tokio::select! {
            frame = read_framed(&mut reader, MAX_PACKET_SIZE) => match frame {
                Ok(packet) => match node.handle_packet(&peer, &packet).await {
                    Ok(()) => {}
                    Err(NodeError::Halted) => break Err(NodeError::Halted),
                    Err(e) => debug!(peer = %peer.id(), error = %e, "packet handling failed"),
                },
                Err(NetworkError::Closed) => break Ok(()),
                Err(e) => break Err(e.into()),
            },
            _ = shutdown.recv() => break Ok(()),
        }
    };

    peer.close();
    node.on_observer_disconnected(peer.id()).await;
    result
}
