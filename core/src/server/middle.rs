//! Middle chain hop (spec §4.3): stateless across rounds except the
//! current round's batch. Peels one onion layer per inbound message,
//! draws its own permutation (every hop mixes independently, per §1's
//! "per-round mixing ... at every hop"), forwards the shuffled bodies,
//! and on return re-applies the inverse permutation before re-wrapping
//! and sending upstream. One `MiddleServer` instance serves one hop
//! index in the chain; `FrontServer` (hop 0) has its own richer type
//! because it additionally owns the client registry.

use std::sync::Arc;

use chacha20poly1305::Key;
use parking_lot::RwLock;
use rand::RngCore;
use thiserror::Error;
use tracing::{debug, warn};

use crate::batch::{Batch, BatchError};
use crate::crypto::StaticKeypair;
use crate::mix::{self, Permutation};
use crate::onion::{self, ChainLayer, OnionError};

#[derive(Debug, Error)]
pub enum MiddleError {
    #[error("admission error: {0}")]
    Batch(#[from] BatchError),
    #[error("onion error: {0}")]
    Onion(#[from] OnionError),
}

struct MiddleEntry {
    peel_key: Key,
    body: Vec<u8>,
}

struct MiddleRoundState {
    round_id: u64,
    batch: Batch<MiddleEntry>,
    permutation: Option<Permutation>,
}

/// One intermediate onion-decrypting chain hop. `hop_index` identifies
/// which chain position this server occupies purely for logging; the
/// decrypting key is whatever secret the caller hands in (matching the
/// public key at `cfg.chain_keys[hop_index]`).
pub struct MiddleServer {
    hop_index: usize,
    secret: StaticKeypair,
    state: RwLock<MiddleRoundState>,
}

impl MiddleServer {
    pub fn new(hop_index: usize, secret: StaticKeypair) -> Self {
        Self {
            hop_index,
            secret,
            state: RwLock::new(MiddleRoundState {
                round_id: 0,
                batch: Batch::new(0),
                permutation: None,
            }),
        }
    }

    /// Begin a new round's batch (spec §5: replaced atomically at round
    /// boundaries).
    pub fn start_round(&self, round_id: u64) {
        let mut state = self.state.write();
        state.round_id = round_id;
        state.batch = Batch::new(round_id);
        state.permutation = None;
    }

    /// Round-count announce (`net_info = 4`) from the upstream hop.
    pub fn set_expected(&self, n: usize) {
        self.state.write().batch.set_expected(n);
    }

    /// Peel one inbound onion layer. Returns `true` once the batch has
    /// reached its expected count, signalling the caller to run the
    /// round (or it may still be waiting on `T_hop_timeout`).
    pub fn admit(&self, layer: &ChainLayer) -> Result<bool, MiddleError> {
        let (body, peel_key) = onion::peel_chain_layer(&self.secret, layer)?;
        let mut state = self.state.write();
        Ok(state.batch.push(MiddleEntry { peel_key, body })?)
    }

    /// Spec §7 `BatchStarvation`: if fewer than the expected `N` messages
    /// arrived by `T_hop_timeout`, fill the remainder with synthetic
    /// cover entries so the round can still proceed. A cover entry's
    /// eventual reply is wrapped under a key nobody downstream is
    /// waiting on and is simply dropped when it comes back.
    pub fn fill_starved_with_cover(&self, body_len: usize) {
        let mut state = self.state.write();
        let Some(expected) = state.batch.expected() else { return };
        let missing = expected.saturating_sub(state.batch.len());
        if missing == 0 {
            return;
        }
        warn!(
            hop = self.hop_index,
            round = state.round_id,
            missing,
            "batch starvation: filling with cover entries"
        );
        for _ in 0..missing {
            let mut body = vec![0u8; body_len];
            rand::thread_rng().fill_bytes(&mut body);
            let cover_secret = StaticKeypair::generate();
            let shared = self.secret.diffie_hellman(cover_secret.public());
            let key = crate::crypto::derive_key("mixchain-middle-cover-v1", &shared);
            let _ = state.batch.push(MiddleEntry { peel_key: key, body });
        }
    }

    /// Close admission, draw this hop's own permutation, and return the
    /// shuffled bodies to forward downstream.
    pub fn close_and_shuffle(&self) -> Vec<Vec<u8>> {
        let mut state = self.state.write();
        let entries = state.batch.entries();
        let n = entries.len();
        let perm = Permutation::random(n);
        let bodies: Vec<Vec<u8>> = entries.iter().map(|e| e.body.clone()).collect();
        let shuffled = mix::shuffle(&bodies, &perm).expect("lengths match by construction");
        state.permutation = Some(perm);
        debug!(hop = self.hop_index, n, "middle hop closed admission and shuffled batch");
        shuffled
    }

    /// Re-apply this hop's inverse permutation to restore inbound order,
    /// then re-wrap each body with its cached peel key, ready to send
    /// upstream. Missing replies (reply timeout) are padded with empty
    /// bodies.
    pub fn complete_round(&self, mut shuffled_replies: Vec<Vec<u8>>) -> Vec<Vec<u8>> {
        let state = self.state.read();
        let n = state.batch.entries().len();
        if shuffled_replies.len() < n {
            shuffled_replies.resize(n, Vec::new());
        } else if shuffled_replies.len() > n {
            shuffled_replies.truncate(n);
        }

        let perm = state.permutation.clone().unwrap_or_else(|| Permutation::identity(n));
        let restored = if n == 0 {
            Vec::new()
        } else {
            mix::unshuffle(&shuffled_replies, &perm).expect("lengths match by construction")
        };

        let mut out = Vec::with_capacity(n);
        for (entry, reply_body) in state.batch.entries().iter().zip(restored.into_iter()) {
            match onion::wrap_reply(&entry.peel_key, &reply_body) {
                Ok(wrapped) => out.push(wrapped),
                Err(e) => {
                    warn!(hop = self.hop_index, error = %e, "failed to wrap reply, dropping");
                    out.push(Vec::new());
                }
            }
        }
        out
    }
}
