use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use rand::RngCore;
use thiserror::Error;

use super::dh::SharedSecret;
use super::XCHACHA_NONCE_SIZE;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("AEAD seal failed")]
    SealFailed,
    #[error("AEAD open failed")]
    OpenFailed,
    #[error("ciphertext too short to contain a nonce")]
    Truncated,
}

/// Derive a 256-bit AEAD key from a shared secret, domain-separated by
/// `context` so the same DH output never yields the same key for two
/// different purposes (chain layer vs. dead-drop layer vs. inner payload).
pub fn derive_key(context: &str, shared: &SharedSecret) -> Key {
    let bytes = blake3::derive_key(context, shared.as_bytes());
    *Key::from_slice(&bytes)
}

/// Seal `plaintext` under `key`, returning `nonce || ciphertext`.
///
/// The nonce is drawn fresh per call rather than derived deterministically
/// from the shared secret: every onion-layer key in this protocol is reused
/// by its holder once to decrypt the forward message and again to encrypt
/// the reply, so a deterministic nonce would encrypt two different
/// plaintexts under the same (key, nonce) pair.
pub fn seal(key: &Key, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let cipher = XChaCha20Poly1305::new(key);
    let mut nonce_bytes = [0u8; XCHACHA_NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = XNonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|_| CryptoError::SealFailed)?;

    let mut out = Vec::with_capacity(XCHACHA_NONCE_SIZE + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Open a `nonce || ciphertext` blob produced by [`seal`].
pub fn open(key: &Key, sealed: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if sealed.len() < XCHACHA_NONCE_SIZE {
        return Err(CryptoError::Truncated);
    }
    let (nonce_bytes, ciphertext) = sealed.split_at(XCHACHA_NONCE_SIZE);
    let nonce = XNonce::from_slice(nonce_bytes);
    let cipher = XChaCha20Poly1305::new(key);
    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| CryptoError::OpenFailed)
}
