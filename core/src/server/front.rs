//! FrontServer (S0): coordinator (spec §4.2).
//!
//! Owns the client registry, drives round cadence, peels the outer onion
//! layer, draws the round's permutation, and re-wraps + delivers replies.
//! Registry access is many-readers/exclusive-writer
//! ([`crate::registry::Registry`]); the per-round batch is a single
//! lock-guarded state struct replaced wholesale at round boundaries (spec
//! §5), following the storage-locking pattern of the relay server this was
//! adapted from.

use std::collections::HashSet;
use std::sync::Arc;

use chacha20poly1305::Key;
use parking_lot::RwLock;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ChainConfig;
use crate::crypto::{PublicKeyBytes, StaticKeypair};
use crate::mix::{self, Permutation};
use crate::onion::{self, ChainLayer, OnionError};
use crate::registry::{RegistrationOutcome, Registry};
use crate::round::RoundInfo;

#[derive(Debug, Error)]
pub enum FrontError {
    #[error("admission window for this round is not open")]
    RoundClosed,
    #[error("client already admitted a message this round")]
    DuplicateAdmission,
    #[error("onion error: {0}")]
    Onion(#[from] OnionError),
    #[error("client is not registered")]
    UnknownClient,
}

struct FrontEntry {
    client_key: PublicKeyBytes,
    peel_key: Key,
    body: Vec<u8>,
}

struct FrontRoundState {
    round: RoundInfo,
    entries: Vec<FrontEntry>,
    admitted: HashSet<PublicKeyBytes>,
    permutation: Option<Permutation>,
}

pub struct FrontServer<Addr> {
    cfg: Arc<ChainConfig>,
    secret: StaticKeypair,
    registry: Registry<Addr>,
    state: RwLock<FrontRoundState>,
}

impl<Addr: Clone + PartialEq> FrontServer<Addr> {
    pub fn new(cfg: Arc<ChainConfig>, secret: StaticKeypair) -> Self {
        let round0 = RoundInfo::open(0, cfg.round_duration);
        Self {
            cfg,
            secret,
            registry: Registry::new(),
            state: RwLock::new(FrontRoundState {
                round: round0,
                entries: Vec::new(),
                admitted: HashSet::new(),
                permutation: None,
            }),
        }
    }

    /// Setup handshake (`net_info = 0`): register the client, then hand
    /// back the chain and dead-drop public keys it needs to build onions.
    pub fn register(
        &self,
        public_key: PublicKeyBytes,
        address: Addr,
        display_name: String,
    ) -> RegistrationOutcome {
        self.registry.register(public_key, address, display_name)
    }

    pub fn chain_and_dead_drop_keys(&self) -> (Vec<PublicKeyBytes>, Vec<PublicKeyBytes>) {
        (self.cfg.chain_keys.clone(), self.cfg.dead_drop_keys.clone())
    }

    pub fn registered_clients(&self) -> Vec<crate::registry::ClientRegistration<Addr>> {
        self.registry.all()
    }

    /// Begin a new round: reset the batch and open the admission window.
    /// I5 requires the prior round's reply phase to already be drained;
    /// the caller (round driver) enforces ordering by only calling this
    /// after `complete_round` has returned.
    pub fn start_round(&self, round_id: u64) {
        let mut state = self.state.write();
        state.round = RoundInfo::open(round_id, self.cfg.round_duration);
        state.entries.clear();
        state.admitted.clear();
        state.permutation = None;
    }

    pub fn current_round_id(&self) -> u64 {
        self.state.read().round.id
    }

    /// Admit one client's onion (spec §4.2 "Per message i"). Enforces I3
    /// (at most one ciphertext per client per round) and drops late
    /// arrivals whose round has already closed.
    pub fn admit(
        &self,
        client_key: PublicKeyBytes,
        outer: &ChainLayer,
    ) -> Result<(), FrontError> {
        {
            let state = self.state.read();
            if !state.round.is_open() {
                return Err(FrontError::RoundClosed);
            }
            if state.admitted.contains(&client_key) {
                return Err(FrontError::DuplicateAdmission);
            }
        }

        let (body, peel_key) = onion::peel_chain_layer(&self.secret, outer)?;

        let mut state = self.state.write();
        if !state.round.is_open() {
            return Err(FrontError::RoundClosed);
        }
        if !state.admitted.insert(client_key) {
            return Err(FrontError::DuplicateAdmission);
        }
        state.entries.push(FrontEntry { client_key, peel_key, body });
        Ok(())
    }

    /// Close admission and draw the round's permutation. Returns the
    /// shuffled message bodies to forward downstream (empty if the
    /// round was idle — the caller still runs the round per spec §5).
    pub fn close_and_shuffle(&self) -> Vec<Vec<u8>> {
        let mut state = self.state.write();
        state.round.close();
        let n = state.entries.len();
        let perm = Permutation::random(n);
        let bodies: Vec<Vec<u8>> = state.entries.iter().map(|e| e.body.clone()).collect();
        let shuffled = mix::shuffle(&bodies, &perm).expect("lengths match by construction");
        state.permutation = Some(perm);
        state.round.begin_draining();
        debug!(n, "front server closed admission and shuffled batch");
        shuffled
    }

    /// Re-wrap each reply (arriving in shuffled/forwarded order) with its
    /// originating client's peel key and pair it with that client's
    /// long-term key for delivery. Missing replies (fewer than admitted,
    /// per `T_reply_timeout`) are padded with empty bodies.
    pub fn complete_round(&self, mut shuffled_replies: Vec<Vec<u8>>) -> Vec<(PublicKeyBytes, Vec<u8>)> {
        let mut state = self.state.write();
        let n = state.entries.len();
        if shuffled_replies.len() < n {
            warn!(
                expected = n,
                got = shuffled_replies.len(),
                "reply timeout: padding missing replies with empty bodies"
            );
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
        for (entry, reply_body) in state.entries.iter().zip(restored.into_iter()) {
            match onion::wrap_reply(&entry.peel_key, &reply_body) {
                Ok(wrapped) => out.push((entry.client_key, wrapped)),
                Err(e) => warn!(error = %e, "failed to wrap reply, dropping"),
            }
        }

        state.round.finish();
        out
    }
}
