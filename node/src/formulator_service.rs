//! Observer-side service accepting formulator connections.
//!
//! Each connection runs the observer side of the handshake, is authorized
//! against the rank schedule, and then forwards its packets to the
//! observer as [`FormulatorEvent`]s. A formulator holds at most one
//! session: a new connection from the same address closes the old one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{debug, info, warn, Instrument};

use pof_ledger::Chain;
use pof_messages::MAX_PACKET_SIZE;
use pof_network::{
    accept_formulator, read_framed, FormulatorIdentity, HandshakeConfig, NetworkError, Peer, PeerAuth, TcpPeer,
};
use pof_types::{Address, Clock, KeyPair, PublicHash};

use crate::shutdown::ShutdownController;
use crate::tracing_spans::formulator_session_span;
use crate::NodeError;

/// Decides whether a handshaken formulator may hold a session.
pub type Authorizer = Arc<dyn Fn(&Address, &PublicHash) -> bool + Send + Sync>;

/// Authorize formulators by membership in the chain's rank schedule.
pub fn chain_authorizer(chain: Arc<Chain>) -> Authorizer {
    Arc::new(move |address, public_hash| match chain.is_formulator(address, public_hash) {
        Ok(member) => member,
        Err(e) => {
            warn!(%address, error = %e, "failed to read rank schedule");
            false
        }
    })
}

pub enum FormulatorEvent {
    Connected {
        address: Address,
        peer: Arc<dyn Peer>,
    },
    Packet {
        address: Address,
        peer_id: String,
        packet: Vec<u8>,
    },
    Disconnected {
        address: Address,
        peer_id: String,
    },
}

#[derive(Default)]
struct Sessions {
    auth: PeerAuth,
    peers: HashMap<String, Arc<TcpPeer>>,
}

pub struct FormulatorService {
    key: KeyPair,
    handshake: HandshakeConfig,
    clock: Arc<dyn Clock>,
    authorize: Authorizer,
    events: mpsc::UnboundedSender<FormulatorEvent>,
    sessions: Mutex<Sessions>,
    next_conn: AtomicU64,
}

impl FormulatorService {
    pub fn new(
        key: KeyPair,
        handshake: HandshakeConfig,
        clock: Arc<dyn Clock>,
        authorize: Authorizer,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<FormulatorEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let service = Arc::new(Self {
            key,
            handshake,
            clock,
            authorize,
            events,
            sessions: Mutex::new(Sessions::default()),
            next_conn: AtomicU64::new(0),
        });
        (service, rx)
    }

    /// Accept formulator connections on `bind` until shutdown.
    pub async fn run(self: &Arc<Self>, bind: &str, shutdown: Arc<ShutdownController>) -> Result<(), NodeError> {
        let listener = TcpListener::bind(bind).await?;
        info!(%bind, "formulator service listening");
        let mut stop = shutdown.subscribe();
        while !shutdown.is_triggered() {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, remote) = match accepted {
                        Ok(conn) => conn,
                        Err(e) => {
                            warn!(error = %e, "accept failed");
                            continue;
                        }
                    };
                    if let Err(e) = stream.set_nodelay(true) {
                        debug!(%remote, error = %e, "failed to set nodelay");
                    }
                    let service = Arc::clone(self);
                    let conn_shutdown = shutdown.subscribe();
                    let span = formulator_session_span(&remote.to_string());
                    tokio::spawn(
                        async move {
                            if let Err(e) = service.serve_connection(stream, conn_shutdown).await {
                                debug!(error = %e, "formulator session ended");
                            }
                        }
                        .instrument(span),
                    );
                }
                _ = stop.recv() => break,
            }
        }
        Ok(())
    }

    /// Handshake, register and read packets from one connection.
    pub async fn serve_connection<S>(&self, stream: S, mut shutdown: broadcast::Receiver<()>) -> Result<(), NodeError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let mut stream = stream;
        let (address, public_hash) = accept_formulator(
            &mut stream,
            &self.key,
            &self.handshake,
            self.clock.as_ref(),
            |address, public_hash| (self.authorize)(address, public_hash),
        )
        .await?;

        let peer_id = format!("{address}#{}", self.next_conn.fetch_add(1, Ordering::Relaxed));
        let (mut reader, writer) = tokio::io::split(stream);
        let peer = TcpPeer::spawn(peer_id.clone(), address.to_string(), writer);
        {
            let mut sessions = self.sessions.lock().await;
            let identity = FormulatorIdentity { address, public_hash };
            if let Some(old) = sessions.auth.authenticate(&peer_id, identity) {
                if let Some(old_peer) = sessions.peers.remove(&old) {
                    old_peer.close();
                }
                info!(%address, old = %old, "formulator session replaced");
            }
            sessions.peers.insert(peer_id.clone(), Arc::clone(&peer));
        }
        info!(%address, peer = %peer_id, "formulator connected");
        let _ = self.events.send(FormulatorEvent::Connected {
            address,
            peer: peer.clone(),
        });

        let result = loop {
            tokio::select! {
                frame = read_framed(&mut reader, MAX_PACKET_SIZE) => match frame {
                    Ok(packet) => {
                        if peer.is_closed() {
                            break Ok(());
                        }
                        let _ = self.events.send(FormulatorEvent::Packet {
                            address,
                            peer_id: peer_id.clone(),
                            packet,
                        });
                    }
                    Err(NetworkError::Closed) => break Ok(()),
                    Err(e) => break Err(NodeError::from(e)),
                },
                _ = shutdown.recv() => break Ok(()),
            }
        };

        peer.close();
        if self.remove_peer(&peer_id).await {
            info!(%address, peer = %peer_id, "formulator disconnected");
            let _ = self.events.send(FormulatorEvent::Disconnected { address, peer_id });
        }
        result
    }

    /// Forget a session. Returns false if it was already gone or replaced.
    pub async fn remove_peer(&self, peer_id: &str) -> bool {
        let mut sessions = self.sessions.lock().await;
        sessions.auth.deauthenticate(peer_id);
        match sessions.peers.remove(peer_id) {
            Some(peer) => {
                peer.close();
                true
            }
            None => false,
        }
    }

    pub async fn send_to(&self, address: &Address, packet: Vec<u8>) -> Result<(), NodeError> {
        let sessions = self.sessions.lock().await;
        let peer = sessions
            .auth
            .peer_for(address)
            .and_then(|id| sessions.peers.get(id))
            .ok_or(NodeError::UnknownFormulator(*address))?;
        peer.send_packet(packet);
        Ok(())
    }

    pub async fn peer_count(&self) -> usize {
        self.sessions.lock().await.peers.len()
    }

    /// Addresses of the formulators currently connected.
    pub async fn formulators(&self) -> Vec<Address> {
        let sessions = self.sessions.lock().await;
        let mut addresses: Vec<Address> = sessions
            .peers
            .keys()
            .filter_map(|id| sessions.auth.identity(id).map(|i| i.address))
            .collect();
        addresses.sort();
        addresses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pof_crypto::{keypair_from_seed, public_hash};
    use pof_network::{connect_observer, write_framed};
    use pof_types::SystemClock;
    use tokio::io::DuplexStream;

    const CHAIN_ID: u8 = 7;

    struct Fixture {
        service: Arc<FormulatorService>,
        events: mpsc::UnboundedReceiver<FormulatorEvent>,
        observer_hash: PublicHash,
        shutdown: ShutdownController,
    }

    fn fixture(allowed: Address) -> Fixture {
        let key = keypair_from_seed(&[1; 32]);
        let observer_hash = public_hash(&key.public);
        let (service, events) = FormulatorService::new(
            key,
            HandshakeConfig::new(CHAIN_ID),
            Arc::new(SystemClock),
            Arc::new(move |address, _| *address == allowed),
        );
        Fixture {
            service,
            events,
            observer_hash,
            shutdown: ShutdownController::new(),
        }
    }

    /// Connect a formulator over an in-memory stream and finish the handshake.
    async fn connect(f: &Fixture, seed: u8, address: Address) -> (DuplexStream, tokio::task::JoinHandle<Result<(), NodeError>>) {
        let (mut formulator_side, observer_side) = tokio::io::duplex(64 * 1024);
        let service = Arc::clone(&f.service);
        let stop = f.shutdown.subscribe();
        let serve = tokio::spawn(async move { service.serve_connection(observer_side, stop).await });
        let key = keypair_from_seed(&[seed; 32]);
        let expected = f.observer_hash;
        connect_observer(
            &mut formulator_side,
            &key,
            address,
            &HandshakeConfig::new(CHAIN_ID),
            &SystemClock,
            |hash| *hash == expected,
        )
        .await
        .unwrap();
        (formulator_side, serve)
    }

    #[tokio::test]
    async fn session_forwards_packets_both_ways() {
        let address = Address::new(0, 1, 1);
        let mut f = fixture(address);
        let (mut stream, serve) = connect(&f, 2, address).await;

        match f.events.recv().await.unwrap() {
            FormulatorEvent::Connected { address: a, .. } => assert_eq!(a, address),
            _ => panic!("expected connected event"),
        }
        assert_eq!(f.service.formulators().await, vec![address]);

        write_framed(&mut stream, b"hello").await.unwrap();
        match f.events.recv().await.unwrap() {
            FormulatorEvent::Packet { packet, .. } => assert_eq!(packet, b"hello"),
            _ => panic!("expected packet event"),
        }

        f.service.send_to(&address, b"reply".to_vec()).await.unwrap();
        assert_eq!(read_framed(&mut stream, 1024).await.unwrap(), b"reply");

        drop(stream);
        serve.await.unwrap().unwrap();
        assert!(matches!(
            f.events.recv().await.unwrap(),
            FormulatorEvent::Disconnected { .. }
        ));
        assert_eq!(f.service.peer_count().await, 0);
    }

    #[tokio::test]
    async fn newer_connection_replaces_older() {
        let address = Address::new(0, 1, 1);
        let f = fixture(address);
        let (mut first, _first_serve) = connect(&f, 2, address).await;
        let (_second, _second_serve) = connect(&f, 2, address).await;

        // The first session's writer is shut down.
        assert!(matches!(read_framed(&mut first, 1024).await, Err(NetworkError::Closed)));
        assert_eq!(f.service.peer_count().await, 1);
        f.service.send_to(&address, b"x".to_vec()).await.unwrap();
    }

    #[tokio::test]
    async fn unauthorized_formulator_is_refused() {
        let f = fixture(Address::new(0, 1, 1));
        let (mut formulator_side, observer_side) = tokio::io::duplex(64 * 1024);
        let service = Arc::clone(&f.service);
        let stop = f.shutdown.subscribe();
        let serve = tokio::spawn(async move { service.serve_connection(observer_side, stop).await });

        let key = keypair_from_seed(&[2; 32]);
        let result = connect_observer(
            &mut formulator_side,
            &key,
            Address::new(0, 9, 9),
            &HandshakeConfig::new(CHAIN_ID),
            &SystemClock,
            |_| true,
        )
        .await;
        assert!(result.is_err());
        assert!(serve.await.unwrap().is_err());
        assert_eq!(f.service.peer_count().await, 0);
    }

    #[tokio::test]
    async fn send_to_unknown_formulator_fails() {
        let f = fixture(Address::new(0, 1, 1));
        assert!(matches!(
            f.service.send_to(&Address::new(0, 2, 2), vec![1]).await,
            Err(NodeError::UnknownFormulator(_))
        ));
    }

    #[tokio::test]
    async fn shutdown_ends_sessions() {
        let address = Address::new(0, 1, 1);
        let f = fixture(address);
        let (_stream, serve) = connect(&f, 2, address).await;
        f.shutdown.shutdown();
        serve.await.unwrap().unwrap();
        assert_eq!(f.service.peer_count().await, 0);
    }
}
