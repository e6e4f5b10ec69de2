//! Crate-wide error aggregate for boundaries that can fail in more than
//! one subsystem (the round driver, the simulation harness). Individual
//! subsystems keep their own narrow `thiserror` enums
//! ([`crate::onion::OnionError`], [`crate::mix::ShuffleError`],
//! [`crate::batch::BatchError`], [`crate::config::ConfigError`],
//! [`crate::wire::FrameError`]); this one just lets callers that touch
//! several of them use a single `?`.

use thiserror::Error;

use crate::batch::BatchError;
use crate::config::ConfigError;
use crate::mix::ShuffleError;
use crate::onion::OnionError;
use crate::wire::FrameError;

#[derive(Debug, Error)]
pub enum MixchainError {
    #[error(transparent)]
    Onion(#[from] OnionError),
    #[error(transparent)]
    Shuffle(#[from] ShuffleError),
    #[error(transparent)]
    Batch(#[from] BatchError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Frame(#[from] FrameError),
}
