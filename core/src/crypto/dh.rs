use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::X25519_KEY_SIZE;

/// A 32-byte X25519 public key in wire form, usable as a map key and as
/// an onion header field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKeyBytes(pub [u8; X25519_KEY_SIZE]);

impl From<PublicKey> for PublicKeyBytes {
    fn from(pk: PublicKey) -> Self {
        PublicKeyBytes(*pk.as_bytes())
    }
}

impl From<PublicKeyBytes> for PublicKey {
    fn from(pk: PublicKeyBytes) -> Self {
        PublicKey::from(pk.0)
    }
}

/// A Diffie-Hellman shared secret. Zeroized on drop; never serialized.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SharedSecret([u8; X25519_KEY_SIZE]);

impl SharedSecret {
    pub fn as_bytes(&self) -> &[u8; X25519_KEY_SIZE] {
        &self.0
    }
}

/// A long-term X25519 keypair, e.g. a client's identity or a server's
/// chain/dead-drop key.
pub struct StaticKeypair {
    secret: StaticSecret,
    public: PublicKey,
}

impl StaticKeypair {
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    pub fn from_secret_bytes(bytes: [u8; X25519_KEY_SIZE]) -> Self {
        let secret = StaticSecret::from(bytes);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    pub fn public(&self) -> PublicKeyBytes {
        PublicKeyBytes::from(self.public)
    }

    pub fn diffie_hellman(&self, their_public: PublicKeyBytes) -> SharedSecret {
        let shared = self.secret.diffie_hellman(&PublicKey::from(their_public));
        SharedSecret(*shared.as_bytes())
    }
}

/// A per-message, per-hop ephemeral keypair. `diffie_hellman` consumes the
/// secret — matching the onion construction, which uses each ephemeral
/// exactly once and discards it after the round's reply is decrypted.
pub struct EphemeralKeypair {
    secret: Option<EphemeralSecret>,
    public: PublicKeyBytes,
}

impl EphemeralKeypair {
    pub fn generate() -> Self {
        let secret = EphemeralSecret::random_from_rng(OsRng);
        let public = PublicKeyBytes::from(PublicKey::from(&secret));
        Self { secret: Some(secret), public }
    }

    pub fn public(&self) -> PublicKeyBytes {
        self.public
    }

    /// Perform the DH exchange. Panics if called twice — an ephemeral
    /// secret is used exactly once per the onion construction.
    pub fn diffie_hellman(&mut self, their_public: PublicKeyBytes) -> SharedSecret {
        let secret = self.secret.take().expect("ephemeral secret used twice");
        let shared = secret.diffie_hellman(&PublicKey::from(their_public));
        SharedSecret(*shared.as_bytes())
    }
}
