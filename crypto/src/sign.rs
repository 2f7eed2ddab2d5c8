//! Ed25519 message signing and verification.

use pof_types::{Hash256, KeyPair, PublicHash, RawSignature, Signature};
use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};

use crate::error::CryptoError;
use crate::keys::public_hash;

/// Sign a message, attaching the signer's public key.
pub fn sign_message(message: &[u8], keypair: &KeyPair) -> Signature {
    let signing_key = SigningKey::from_bytes(&keypair.private.0);
    let sig = signing_key.sign(message);
    Signature {
        signer: keypair.public,
        raw: RawSignature(sig.to_bytes()),
    }
}

/// Sign a 32-byte digest.
pub fn sign_hash(hash: &Hash256, keypair: &KeyPair) -> Signature {
    sign_message(hash.as_bytes(), keypair)
}

/// Verify a signature against a message and its embedded signer.
///
/// Also rejects non-canonical signatures (malleability protection).
pub fn verify_signature(message: &[u8], signature: &Signature) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(&signature.signer.0) else {
        return false;
    };
    let dalek_sig = ed25519_dalek::Signature::from_bytes(&signature.raw.0);
    verifying_key.verify(message, &dalek_sig).is_ok()
}

/// Verify a signature over a digest and return the signer's public hash.
pub fn recover_signer(hash: &Hash256, signature: &Signature) -> Result<PublicHash, CryptoError> {
    if VerifyingKey::from_bytes(&signature.signer.0).is_err() {
        return Err(CryptoError::InvalidPublicKey);
    }
    if !verify_signature(hash.as_bytes(), signature) {
        return Err(CryptoError::InvalidSignature);
    }
    Ok(public_hash(&signature.signer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{generate_keypair, keypair_from_seed};
    use pof_types::PublicKey;

    #[test]
    fn sign_and_verify() {
        let kp = generate_keypair();
        let msg = b"test message for pof";
        let sig = sign_message(msg, &kp);
        assert!(verify_signature(msg, &sig));
    }

    #[test]
    fn wrong_message_fails() {
        let kp = generate_keypair();
        let sig = sign_message(b"correct message", &kp);
        assert!(!verify_signature(b"wrong message", &sig));
    }

    #[test]
    fn swapped_signer_fails() {
        let kp1 = generate_keypair();
        let kp2 = generate_keypair();
        let mut sig = sign_message(b"test", &kp1);
        sig.signer = kp2.public;
        assert!(!verify_signature(b"test", &sig));
    }

    #[test]
    fn recover_returns_signer_hash() {
        let kp = keypair_from_seed(&[5u8; 32]);
        let hash = Hash256::new([1u8; 32]);
        let sig = sign_hash(&hash, &kp);
        assert_eq!(recover_signer(&hash, &sig), Ok(public_hash(&kp.public)));
        assert_eq!(
            recover_signer(&Hash256::new([2u8; 32]), &sig),
            Err(CryptoError::InvalidSignature)
        );
    }

    #[test]
    fn invalid_public_key() {
        let kp = generate_keypair();
        let mut sig = sign_message(b"test", &kp);
        sig.signer = PublicKey([0xFF; 32]);
        assert!(!verify_signature(b"test", &sig));
    }
}
