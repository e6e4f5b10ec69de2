//! Permutation generation and shuffle/unshuffle (spec §4.2, §8), reworked
//! from the Python prototype's `generatePermutation` /
//! `shuffleWithPermutation` / `unshuffleWithPermutation` into generic,
//! allocation-obvious Rust.

use rand::seq::SliceRandom;
use thiserror::Error;

/// A permutation over `[0, n)`, usable to shuffle a batch and later
/// restore its original order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permutation {
    /// `order[i]` is the original index whose element now sits at
    /// position `i` after shuffling.
    order: Vec<usize>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShuffleError {
    #[error("permutation has {perm_len} entries, expected {data_len}")]
    LengthMismatch { perm_len: usize, data_len: usize },
}

impl Permutation {
    /// Draw a uniform random permutation over `[0, n)`.
    pub fn random(n: usize) -> Self {
        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut rand::thread_rng());
        Self { order }
    }

    /// The identity permutation — used for a batch of size 0 or 1, and in
    /// tests that need a deterministic mapping.
    pub fn identity(n: usize) -> Self {
        Self { order: (0..n).collect() }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// `π⁻¹`, the inverse permutation.
    pub fn inverse(&self) -> Self {
        let mut inv = vec![0usize; self.order.len()];
        for (new_index, &original_index) in self.order.iter().enumerate() {
            inv[original_index] = new_index;
        }
        Self { order: inv }
    }

    /// Position in the shuffled batch that held original index `i`.
    pub fn position_of(&self, original_index: usize) -> Option<usize> {
        self.order.iter().position(|&o| o == original_index)
    }

    /// The original index whose element now sits at shuffled position `i`.
    pub fn original_of(&self, shuffled_index: usize) -> Option<usize> {
        self.order.get(shuffled_index).copied()
    }
}

/// Apply `π` to `data`: the returned vector's position `i` holds
/// `data[π.order[i]]`.
pub fn shuffle<T: Clone>(data: &[T], perm: &Permutation) -> Result<Vec<T>, ShuffleError> {
    if data.len() != perm.len() {
        return Err(ShuffleError::LengthMismatch { perm_len: perm.len(), data_len: data.len() });
    }
    Ok(perm.order.iter().map(|&i| data[i].clone()).collect())
}

/// Invert [`shuffle`]: given a shuffled batch and the permutation that
/// produced it, recover the original order.
pub fn unshuffle<T: Clone>(data: &[T], perm: &Permutation) -> Result<Vec<T>, ShuffleError> {
    if data.len() != perm.len() {
        return Err(ShuffleError::LengthMismatch { perm_len: perm.len(), data_len: data.len() });
    }
    let inv = perm.inverse();
    Ok(inv.order.iter().map(|&i| data[i].clone()).collect())
}
