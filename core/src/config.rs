//! Chain topology and round-timing configuration, injected at boot rather
//! than discovered through cyclic references between servers (Design
//! Notes, "Cyclic references").

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::PublicKeyBytes;

/// The rendezvous slot space `N_DD` (spec §3: `s = H(secret)*(round+1) mod
/// N_DD`), kept distinct from `dead_drop_count` (`m`, the number of actual
/// dead-drop *servers*): a slot is a 128-bit bin in this space, and
/// `j = slot % dead_drop_count` is what picks the server. Matches the
/// original prototype's `nDD = 2**128` (`Client.py`), represented here as
/// `u128::MAX` since `% 2^128` is a no-op for a value already typed `u128`.
pub const FULL_SLOT_SPACE: u128 = u128::MAX;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("chain must have at least 2 servers (front + spreading), got {0}")]
    ChainTooShort(usize),
    #[error("at least one dead-drop server is required")]
    NoDeadDrops,
    #[error("slot_space must be nonzero")]
    ZeroSlotSpace,
    #[error("chain_keys.len() ({0}) does not match chain_len ({1})")]
    ChainKeyCountMismatch(usize, usize),
    #[error("dead_drop_keys.len() ({0}) does not match dead_drop_count ({1})")]
    DeadDropKeyCountMismatch(usize, usize),
    #[error("inner payload budget ({0}) does not leave room in the frame budget ({1})")]
    InnerPayloadTooLarge(usize, usize),
}

/// Immutable, value-typed description of the chain a client's onion
/// traverses and the round cadence every server observes. Handed to every
/// component at construction time — no component holds a reference back
/// to any other.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Number of chain servers `k` (front + middles + spreading), `k >= 2`.
    pub chain_len: usize,
    /// Public keys of the chain servers, `P_0..P_{k-1}`, in hop order.
    pub chain_keys: Vec<PublicKeyBytes>,
    /// Number of dead-drop servers `m`.
    pub dead_drop_count: usize,
    /// Public keys of the dead-drop servers, `Q_0..Q_{m-1}`.
    pub dead_drop_keys: Vec<PublicKeyBytes>,
    /// The rendezvous slot space `N_DD`, distinct from `dead_drop_count`
    /// (spec §3). See [`FULL_SLOT_SPACE`].
    pub slot_space: u128,
    /// Maximum plaintext bytes a client may enqueue per message (`L_inner`).
    pub inner_payload_budget: usize,
    /// Wall-clock admission window per round (`T_round`).
    pub round_duration: Duration,
    /// Deadline for a hop to receive its expected `N` messages before it
    /// fills the gap with synthetic cover (`T_hop_timeout`).
    pub hop_timeout: Duration,
    /// Deadline for the coordinator to receive `N` replies before treating
    /// the round as drained with empty replies for stragglers
    /// (`T_reply_timeout`).
    pub reply_timeout: Duration,
}

impl ChainConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chain_len < 2 {
            return Err(ConfigError::ChainTooShort(self.chain_len));
        }
        if self.dead_drop_count == 0 {
            return Err(ConfigError::NoDeadDrops);
        }
        if self.slot_space == 0 {
            return Err(ConfigError::ZeroSlotSpace);
        }
        if self.chain_keys.len() != self.chain_len {
            return Err(ConfigError::ChainKeyCountMismatch(
                self.chain_keys.len(),
                self.chain_len,
            ));
        }
        if self.dead_drop_keys.len() != self.dead_drop_count {
            return Err(ConfigError::DeadDropKeyCountMismatch(
                self.dead_drop_keys.len(),
                self.dead_drop_count,
            ));
        }
        // Inner payload has to survive PKCS-style padding plus the AEAD
        // overhead of the dead-drop and chain layers it will be nested in,
        // inside one L-byte frame.
        let crypto_overhead = crate::wire::FRAME_SIZE / 4;
        if self.inner_payload_budget + crypto_overhead > crate::wire::MAX_FRAME_PAYLOAD {
            return Err(ConfigError::InnerPayloadTooLarge(
                self.inner_payload_budget,
                crate::wire::MAX_FRAME_PAYLOAD,
            ));
        }
        Ok(())
    }

    /// Index of the last middle server, i.e. the hop whose peeled body
    /// reveals the cleartext dead-drop index (spec §4.1 step 4, §4.3). For
    /// `chain_len == 2` (front directly followed by spreading) this is the
    /// front server itself.
    pub fn last_onion_hop(&self) -> usize {
        self.chain_len - 2
    }

    /// Index of the spreading server, the final chain hop. It holds no
    /// onion-decryption key; it only routes on the cleartext dead-drop
    /// index revealed by the previous hop.
    pub fn spreading_index(&self) -> usize {
        self.chain_len - 1
    }
}
