//! Cryptographic primitives underlying every onion layer and rendezvous slot.
//!
//! X25519 for key agreement, Blake3 for key derivation, XChaCha20-Poly1305
//! for authenticated encryption — the same stack the onion layer of the
//! messaging core it was adapted from uses, just generalized to a
//! fixed-topology chain instead of an arbitrary relay path.

mod aead;
mod dh;

pub use aead::{derive_key, open, seal, CryptoError};
pub use dh::{EphemeralKeypair, PublicKeyBytes, SharedSecret, StaticKeypair};

pub const X25519_KEY_SIZE: usize = 32;
pub const XCHACHA_NONCE_SIZE: usize = 24;
