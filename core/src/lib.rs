// mixchain-core — onion-routed mix-network messaging spine
//
// "Can two clients exchange a message without anyone watching the wire
//  learning who talked to whom?"
//
// If an answer doesn't hold up under that question, it doesn't belong here.

pub mod batch;
pub mod client;
pub mod config;
pub mod crypto;
pub mod error;
pub mod identity;
pub mod mix;
pub mod onion;
pub mod registry;
pub mod round;
pub mod server;
pub mod wire;

pub use client::Client;
pub use config::ChainConfig;
pub use error::MixchainError;
pub use identity::{ClientIdentity, PartnerDirectory};
pub use round::{RoundInfo, RoundState};
pub use wire::{Frame, NetInfo};
