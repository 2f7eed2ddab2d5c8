//! Peer transport for the formulator/observer overlay.
//!
//! Packets travel as length-prefixed frames. Connections are mutually
//! authenticated by a signed-challenge handshake before any protocol
//! message is exchanged.

pub mod auth;
pub mod error;
pub mod framing;
pub mod handshake;
pub mod peer;

pub use auth::{FormulatorIdentity, PeerAuth};
pub use error::NetworkError;
pub use framing::{read_framed, read_framed_timeout, write_framed, READ_TIMEOUT};
pub use handshake::{
    accept_formulator, check_challenge, connect_observer, new_challenge, HandshakeConfig,
};
pub use peer::{Peer, TcpPeer};
