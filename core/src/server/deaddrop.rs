//! Dead-drop matching engine (spec §4.4): the rendezvous step. Holds no
//! long-term state across rounds — every round's entries are matched by
//! slot and discarded once the replies are wrapped and returned.

use std::collections::HashMap;

use parking_lot::RwLock;
use thiserror::Error;
use tracing::warn;

use crate::crypto::StaticKeypair;
use crate::onion::{self, DeadDropBody, DeadDropLayer, OnionError};

#[derive(Debug, Error)]
pub enum DeadDropError {
    #[error("onion error: {0}")]
    Onion(#[from] OnionError),
    #[error("more than the expected {expected} inbound messages arrived this round")]
    Overflow { expected: usize },
}

struct DeadDropEntry {
    slot: u128,
    peel_key: chacha20poly1305::Key,
    body: Vec<u8>,
}

struct DeadDropRoundState {
    round_id: u64,
    expected: Option<usize>,
    entries: Vec<DeadDropEntry>,
}

/// A single dead-drop server. `secret` must match the public key this
/// server's index occupies in `ChainConfig::dead_drop_keys`.
pub struct DeadDropServer {
    secret: StaticKeypair,
    state: RwLock<DeadDropRoundState>,
}

impl DeadDropServer {
    pub fn new(secret: StaticKeypair) -> Self {
        Self {
            secret,
            state: RwLock::new(DeadDropRoundState { round_id: 0, expected: None, entries: Vec::new() }),
        }
    }

    pub fn start_round(&self, round_id: u64) {
        let mut state = self.state.write();
        state.round_id = round_id;
        state.expected = None;
        state.entries.clear();
    }

    pub fn set_expected(&self, n: usize) {
        self.state.write().expected = Some(n);
    }

    /// Admit one message routed here by the spreading server. Opens the
    /// dead-drop layer to recover the rendezvous slot and the still-AEAD'd
    /// inner body (the dead drop never sees the partner's plaintext).
    /// Returns `true` once the batch reaches its expected count — the
    /// engine's single synchronization point (spec §4.4 last paragraph).
    pub fn admit(&self, layer: &DeadDropLayer) -> Result<bool, DeadDropError> {
        let (body, peel_key) = onion::open_dead_drop_layer(&self.secret, layer)?;
        let mut state = self.state.write();
        if let Some(expected) = state.expected {
            if state.entries.len() >= expected {
                return Err(DeadDropError::Overflow { expected });
            }
        }
        state.entries.push(DeadDropEntry { slot: body.slot, peel_key, body: body.inner });
        Ok(state.expected == Some(state.entries.len()))
    }

    /// Run the matching algorithm (spec §4.4 steps 1-4) and re-wrap every
    /// entry's result (step 5) for return to the spreading server, in the
    /// same order messages were admitted.
    pub fn match_and_wrap(&self) -> Vec<Vec<u8>> {
        let state = self.state.read();
        let n = state.entries.len();

        let mut by_slot: HashMap<u128, Vec<usize>> = HashMap::new();
        for (i, entry) in state.entries.iter().enumerate() {
            by_slot.entry(entry.slot).or_default().push(i);
        }

        let mut swapped: Vec<Vec<u8>> = vec![Vec::new(); n];
        for (slot, indices) in &by_slot {
            match indices.as_slice() {
                [a, b] => {
                    swapped[*a] = state.entries[*b].body.clone();
                    swapped[*b] = state.entries[*a].body.clone();
                }
                [_single] => {
                    // No partner present this round; the original already
                    // defaults to an empty body.
                }
                more if more.len() >= 3 => {
                    warn!(
                        round = state.round_id,
                        slot = %slot,
                        count = more.len(),
                        "impossible slot collision (>=3 entries), emptying all"
                    );
                    // `swapped` entries for this group are already empty.
                }
                [] => unreachable!("a slot only appears in the map when it has at least one index"),
            }
        }

        let mut out = Vec::with_capacity(n);
        for (entry, body) in state.entries.iter().zip(swapped.into_iter()) {
            match onion::wrap_reply(&entry.peel_key, &body) {
                Ok(wrapped) => out.push(wrapped),
                Err(e) => {
                    warn!(round = state.round_id, error = %e, "failed to wrap dead-drop reply, dropping");
                    out.push(Vec::new());
                }
            }
        }
        out
    }
}
