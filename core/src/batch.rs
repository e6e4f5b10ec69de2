//! Per-hop per-round batch state (spec §3 Chain batch, §5 "Shared-resource
//! policy"): one object owning this round's ciphertexts/entries, expected
//! and arrival counts, guarded by a single lock and replaced wholesale at
//! round boundaries — mirroring the relay registry's
//! `Arc<RwLock<HashMap<...>>>` pattern the messaging core it was adapted
//! from uses for its peer store, but scoped to one round instead of
//! living for a connection's lifetime.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BatchError {
    /// More than the expected `N` inbound messages arrived this round;
    /// spec §7 `BatchOverflow` — drop the excess, log, keep going.
    #[error("batch for round {round_id} already holds the expected {expected} entries")]
    Overflow { round_id: u64, expected: usize },
}

/// A generic per-round batch: an ordered list of entries of whatever
/// shape a given hop stores (peeled ciphertexts at a middle server,
/// `(slot, body)` pairs at a dead drop, ...), plus the hop's expectation
/// of how many entries this round should hold.
pub struct Batch<T> {
    round_id: u64,
    expected: Option<usize>,
    entries: Vec<T>,
}

impl<T> Batch<T> {
    pub fn new(round_id: u64) -> Self {
        Self { round_id, expected: None, entries: Vec::new() }
    }

    pub fn round_id(&self) -> u64 {
        self.round_id
    }

    /// Set by the round-count announce (`net_info = 4`) that precedes the
    /// batch itself.
    pub fn set_expected(&mut self, n: usize) {
        self.expected = Some(n);
        self.entries = Vec::with_capacity(n);
    }

    pub fn expected(&self) -> Option<usize> {
        self.expected
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Record one inbound entry. Returns `true` if the batch is now
    /// complete (has reached the expected count) — the caller should run
    /// the round once this returns `true`, or once `T_hop_timeout`
    /// elapses, whichever comes first.
    pub fn push(&mut self, entry: T) -> Result<bool, BatchError> {
        if let Some(expected) = self.expected {
            if self.entries.len() >= expected {
                return Err(BatchError::Overflow { round_id: self.round_id, expected });
            }
        }
        self.entries.push(entry);
        Ok(self.expected == Some(self.entries.len()))
    }

    pub fn is_complete(&self) -> bool {
        self.expected == Some(self.entries.len())
    }

    /// Drain every entry, leaving the batch empty but still tagged with
    /// this round's id. Used when the round is run.
    pub fn drain(&mut self) -> Vec<T> {
        std::mem::take(&mut self.entries)
    }

    pub fn entries(&self) -> &[T] {
        &self.entries
    }
}
