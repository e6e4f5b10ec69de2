//! Spreading server (spec §4.3): the last chain hop. Unlike a middle
//! hop it holds no onion-decryption key of its own — the last
//! onion-decrypting middle hop (`ChainConfig::last_onion_hop`) already
//! reveals a [`DeadDropLayer`] with a *cleartext* `dead_drop_index`
//! header, so the spreading server's "peel" is reading that cleartext
//! field rather than performing another AEAD open. It fans inbound
//! messages out across the dead-drop servers named by that field and,
//! on return, reassembles replies from every dead drop back into the
//! hop's original inbound order before returning them upstream.

use std::collections::HashMap;

use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, warn};

use crate::onion::DeadDropLayer;

#[derive(Debug, Error)]
pub enum SpreadingError {
    #[error("peeled body is not a valid dead-drop layer: {0}")]
    Malformed(String),
    #[error("more than the expected {expected} inbound messages arrived this round")]
    Overflow { expected: usize },
}

impl From<Box<bincode::ErrorKind>> for SpreadingError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        SpreadingError::Malformed(e.to_string())
    }
}

struct SpreadingRoundState {
    round_id: u64,
    expected: Option<usize>,
    entries: Vec<DeadDropLayer>,
}

/// One round's partition of the inbound batch into per-dead-drop-server
/// sub-batches, each carrying its own round-count announce for the
/// downstream dead drop.
pub struct RoutedBatch {
    /// `dest[j]` is the ordered list of (`original inbound index`,
    /// dead-drop layer) destined for dead-drop server `j`.
    pub dest: HashMap<u16, Vec<(usize, DeadDropLayer)>>,
}

pub struct SpreadingServer {
    state: RwLock<SpreadingRoundState>,
}

impl SpreadingServer {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(SpreadingRoundState { round_id: 0, expected: None, entries: Vec::new() }),
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

    /// Admit one peeled body from the upstream middle hop (plaintext
    /// bytes of a serialized [`DeadDropLayer`]). Returns `true` once the
    /// batch reaches its expected count.
    pub fn admit(&self, peeled_body: &[u8]) -> Result<bool, SpreadingError> {
        let layer: DeadDropLayer = bincode::deserialize(peeled_body)?;
        let mut state = self.state.write();
        if let Some(expected) = state.expected {
            if state.entries.len() >= expected {
                return Err(SpreadingError::Overflow { expected });
            }
        }
        state.entries.push(layer);
        Ok(state.expected == Some(state.entries.len()))
    }

    /// Partition the inbound batch by cleartext dead-drop index (spec
    /// §4.3: "it routes each message to the dead-drop server whose index
    /// equals j"), preserving each message's original inbound position
    /// so replies can be reassembled later.
    pub fn route_to_dead_drops(&self) -> RoutedBatch {
        let state = self.state.read();
        let mut dest: HashMap<u16, Vec<(usize, DeadDropLayer)>> = HashMap::new();
        for (i, layer) in state.entries.iter().enumerate() {
            dest.entry(layer.dead_drop_index).or_default().push((i, layer.clone()));
        }
        debug!(
            round = state.round_id,
            n = state.entries.len(),
            destinations = dest.len(),
            "spreading server routed inbound batch to dead drops"
        );
        RoutedBatch { dest }
    }

    /// Reassemble this round's replies: `replies` maps dead-drop index to
    /// the wrapped reply bodies it returned, in the same order the
    /// sub-batch was sent to it. Missing dead drops (timeout) leave their
    /// messages' replies empty.
    pub fn complete_round(&self, routed: &RoutedBatch, mut replies: HashMap<u16, Vec<Vec<u8>>>) -> Vec<Vec<u8>> {
        let state = self.state.read();
        let n = state.entries.len();
        let mut out = vec![Vec::new(); n];

        for (dead_drop_index, indices_and_layers) in &routed.dest {
            let Some(dd_replies) = replies.remove(dead_drop_index) else {
                warn!(
                    round = state.round_id,
                    dead_drop_index,
                    "no reply received from dead drop by reply timeout, leaving empty"
                );
                continue;
            };
            if dd_replies.len() != indices_and_layers.len() {
                warn!(
                    round = state.round_id,
                    dead_drop_index,
                    expected = indices_and_layers.len(),
                    got = dd_replies.len(),
                    "dead drop returned a mismatched reply count"
                );
            }
            for ((original_index, _), reply) in indices_and_layers.iter().zip(dd_replies.into_iter()) {
                out[*original_index] = reply;
            }
        }
        out
    }
}

impl Default for SpreadingServer {
    fn default() -> Self {
        Self::new()
    }
}
