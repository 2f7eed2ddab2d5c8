//! Mutual authentication between a formulator and an observer.
//!
//! Each side sends a 40-byte challenge: byte 0 is the chain id, bytes 1..32
//! are random and bytes 32..40 carry the sender's timestamp (nanoseconds,
//! little-endian). The other side answers with a signature over the
//! challenge hash. The formulator's challenge is followed by its 14-byte
//! address so the observer can check it against the rank table.
//!
//! Exchange, observer first:
//! 1. observer → challenge
//! 2. formulator → signature
//! 3. formulator → challenge ++ address
//! 4. observer → signature

use std::time::Duration;

use pof_crypto::{blake2b_256, recover_signer, sign_hash};
use pof_types::address::ADDRESS_SIZE;
use pof_types::{
    Address, Clock, Hash256, KeyPair, PublicHash, PublicKey, RawSignature, Signature, Timestamp,
};
use rand::RngCore;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use crate::framing::{read_framed_timeout, write_framed};
use crate::NetworkError;

pub const CHALLENGE_SIZE: usize = 40;

/// Default largest tolerated difference between a challenge's timestamp and local time.
pub const MAX_CLOCK_SKEW: Duration = Duration::from_secs(30);

#[derive(Clone, Copy, Debug)]
pub struct HandshakeConfig {
    pub chain_id: u8,
    pub max_skew: Duration,
}

impl HandshakeConfig {
    pub fn new(chain_id: u8) -> Self {
        Self {
            chain_id,
            max_skew: MAX_CLOCK_SKEW,
        }
    }
}

const SIGNATURE_SIZE: usize = 96;
const HANDSHAKE_FRAME_LIMIT: usize = 256;

pub fn new_challenge(chain_id: u8, now: Timestamp) -> [u8; CHALLENGE_SIZE] {
    let mut challenge = [0u8; CHALLENGE_SIZE];
    challenge[0] = chain_id;
    rand::thread_rng().fill_bytes(&mut challenge[1..32]);
    challenge[32..40].copy_from_slice(&now.as_nanos().to_le_bytes());
    challenge
}

/// Verify a received challenge is for this chain and was issued recently.
pub fn check_challenge(
    challenge: &[u8],
    chain_id: u8,
    now: Timestamp,
    max_skew: Duration,
) -> Result<(), NetworkError> {
    if challenge.len() != CHALLENGE_SIZE {
        return Err(NetworkError::Handshake("challenge has the wrong length"));
    }
    if challenge[0] != chain_id {
        return Err(NetworkError::ChainMismatch {
            expected: chain_id,
            got: challenge[0],
        });
    }
    let mut ts = [0u8; 8];
    ts.copy_from_slice(&challenge[32..40]);
    let drift = now.abs_diff(Timestamp::from_nanos(u64::from_le_bytes(ts)));
    if drift > max_skew {
        return Err(NetworkError::ClockDrift {
            drift_ms: drift.as_millis() as u64,
        });
    }
    Ok(())
}

fn challenge_hash(challenge: &[u8]) -> Hash256 {
    Hash256::new(blake2b_256(challenge))
}

fn encode_signature(signature: &Signature) -> [u8; SIGNATURE_SIZE] {
    let mut out = [0u8; SIGNATURE_SIZE];
    out[..32].copy_from_slice(signature.signer.as_bytes());
    out[32..].copy_from_slice(signature.raw.as_bytes());
    out
}

fn decode_signature(bytes: &[u8]) -> Result<Signature, NetworkError> {
    if bytes.len() != SIGNATURE_SIZE {
        return Err(NetworkError::Handshake("signature has the wrong length"));
    }
    let mut signer = [0u8; 32];
    signer.copy_from_slice(&bytes[..32]);
    let mut raw = [0u8; 64];
    raw.copy_from_slice(&bytes[32..]);
    Ok(Signature {
        signer: PublicKey(signer),
        raw: RawSignature(raw),
    })
}

async fn read_signer<S: AsyncRead + Unpin>(
    stream: &mut S,
    challenge: &[u8],
) -> Result<PublicHash, NetworkError> {
    let frame = read_framed_timeout(stream, HANDSHAKE_FRAME_LIMIT).await?;
    let signature = decode_signature(&frame)?;
    recover_signer(&challenge_hash(challenge), &signature).map_err(|_| NetworkError::InvalidSignature)
}

async fn answer<S: AsyncWrite + Unpin>(
    stream: &mut S,
    challenge: &[u8],
    keypair: &KeyPair,
) -> Result<(), NetworkError> {
    let signature = sign_hash(&challenge_hash(challenge), keypair);
    write_framed(stream, &encode_signature(&signature)).await
}

/// Observer side. `authorize` decides whether the claimed formulator
/// address may connect with the proven key hash.
pub async fn accept_formulator<S, F>(
    stream: &mut S,
    keypair: &KeyPair,
    config: &HandshakeConfig,
    clock: &dyn Clock,
    authorize: F,
) -> Result<(Address, PublicHash), NetworkError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    F: FnOnce(&Address, &PublicHash) -> bool,
{
    let challenge = new_challenge(config.chain_id, clock.now());
    write_framed(stream, &challenge).await?;
    let public_hash = read_signer(stream, &challenge).await?;

    let frame = read_framed_timeout(stream, HANDSHAKE_FRAME_LIMIT).await?;
    if frame.len() != CHALLENGE_SIZE + ADDRESS_SIZE {
        return Err(NetworkError::Handshake("formulator challenge has the wrong length"));
    }
    let (their_challenge, address_bytes) = frame.split_at(CHALLENGE_SIZE);
    check_challenge(their_challenge, config.chain_id, clock.now(), config.max_skew)?;
    let mut raw_address = [0u8; ADDRESS_SIZE];
    raw_address.copy_from_slice(address_bytes);
    let address = Address::from_bytes(raw_address);

    if !authorize(&address, &public_hash) {
        debug!(%address, "rejecting unknown formulator");
        return Err(NetworkError::Unauthorized);
    }
    answer(stream, their_challenge, keypair).await?;
    Ok((address, public_hash))
}

/// Formulator side. `is_observer` accepts the proven observer key hash.
pub async fn connect_observer<S, F>(
    stream: &mut S,
    keypair: &KeyPair,
    address: Address,
    config: &HandshakeConfig,
    clock: &dyn Clock,
    is_observer: F,
) -> Result<PublicHash, NetworkError>
where
    S: AsyncRead + AsyncWrite + Unpin,
    F: FnOnce(&PublicHash) -> bool,
{
    let their_challenge = read_framed_timeout(stream, HANDSHAKE_FRAME_LIMIT).await?;
    check_challenge(&their_challenge, config.chain_id, clock.now(), config.max_skew)?;
    answer(stream, &their_challenge, keypair).await?;

    let challenge = new_challenge(config.chain_id, clock.now());
    let mut frame = Vec::with_capacity(CHALLENGE_SIZE + ADDRESS_SIZE);
    frame.extend_from_slice(&challenge);
    frame.extend_from_slice(address.as_bytes());
    write_framed(stream, &frame).await?;

    let observer = read_signer(stream, &challenge).await?;
    if !is_observer(&observer) {
        return Err(NetworkError::Unauthorized);
    }
    Ok(observer)
}
