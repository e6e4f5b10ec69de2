mod shuffle;

pub use shuffle::{shuffle, unshuffle, Permutation, ShuffleError};
