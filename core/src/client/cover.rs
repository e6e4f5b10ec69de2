//! Cover traffic (spec §4.1 "Cover traffic"), generalized from the
//! messaging core's rate-scheduled `CoverTrafficGenerator` to this
//! protocol's simpler, mandatory rule: every client sends exactly one
//! message every round, real or synthetic, so idle and active clients
//! are indistinguishable on the wire.

use rand::RngCore;

use crate::crypto::{PublicKeyBytes, StaticKeypair};

/// Uniformly random plaintext of `size` bytes, standing in for a real
/// payload when the client has nothing queued.
pub fn random_plaintext(size: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; size];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// A throwaway public key to rendezvous at a pseudo-random slot when the
/// client has no dialed partner. The matching secret is discarded
/// immediately: nothing can ever open a reply addressed to this key, and
/// none is expected.
pub fn random_peer_public() -> PublicKeyBytes {
    StaticKeypair::generate().public()
}
