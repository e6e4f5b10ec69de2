//! Client: onion construction and round participation (spec §4.1).

pub mod cover;
pub mod outbox;

use std::sync::Arc;

use crate::config::ChainConfig;
use crate::crypto::PublicKeyBytes;
use crate::identity::ClientIdentity;
use crate::onion::{self, ConstructedOnion, OnionError};

use outbox::{Outbox, OutboxError};

/// What a client needs to keep around between sending this round's onion
/// and decoding its reply.
pub struct PendingRound {
    onion: ConstructedOnion,
    /// True if this round's onion was synthetic cover traffic — the
    /// reply, whatever it decrypts to, is discarded (spec §4.1).
    is_cover: bool,
}

impl PendingRound {
    /// Whether the onion built for this round was synthetic cover traffic
    /// rather than a real enqueued message.
    pub fn is_cover(&self) -> bool {
        self.is_cover
    }
}

pub struct Client {
    identity: ClientIdentity,
    outbox: Outbox,
    cfg: Arc<ChainConfig>,
}

impl Client {
    pub fn new(cfg: Arc<ChainConfig>, chain_index: u16) -> Self {
        let outbox = Outbox::new(cfg.inner_payload_budget);
        Self { identity: ClientIdentity::new(chain_index), outbox, cfg }
    }

    pub fn public_key(&self) -> PublicKeyBytes {
        self.identity.public_key()
    }

    /// Set the dialing partner (spec §4.1 `dial`).
    pub fn dial(&mut self, partner_public: PublicKeyBytes) {
        self.identity.dial(partner_public);
    }

    /// Enqueue a payload for the next round it can be sent in (spec §4.1
    /// `new_message`).
    pub fn new_message(&mut self, plaintext: Vec<u8>) -> Result<(), OutboxError> {
        self.outbox.enqueue(plaintext)
    }

    /// Build this round's onion (spec §4.1 `on_round_start`). Synthesizes
    /// cover traffic — random plaintext routed to a random peer — when
    /// there is no dialed partner or nothing queued, so idle and active
    /// clients are indistinguishable on the wire.
    pub fn on_round_start(&mut self, round: u64) -> Result<PendingRound, OnionError> {
        let is_cover = self.identity.partner.is_none() || self.outbox.is_empty();

        let (plaintext, partner) = if is_cover {
            let size = self.cfg.inner_payload_budget.saturating_sub(1);
            (cover::random_plaintext(size), cover::random_peer_public())
        } else {
            (self.outbox.dequeue().expect("checked non-empty above"), self.identity.partner.expect("checked Some above"))
        };

        let onion = onion::construct_onion(
            &self.cfg,
            self.identity.keypair(),
            self.identity.chain_index,
            partner,
            round,
            &plaintext,
        )?;

        Ok(PendingRound { onion, is_cover })
    }

    /// The onion this client should send to S0 for the pending round.
    pub fn outer_onion(&self, pending: &PendingRound) -> onion::ChainLayer {
        pending.onion.outer.clone()
    }

    /// Decode the round's reply. Returns `None` (⊥) if this was cover
    /// traffic, or if any layer fails to decrypt; returns `Some(vec![])`
    /// if the dead drop matched no partner this round (spec §4.4 step 3)
    /// — a successfully decrypted, deliberately empty message.
    pub fn decrypt_reply(&self, pending: &PendingRound, reply_ciphertext: &[u8]) -> Option<Vec<u8>> {
        if pending.is_cover {
            return None;
        }

        let mut buf = reply_ciphertext.to_vec();
        for key in &pending.onion.hop_keys {
            buf = onion::open_reply(key, &buf).ok()?;
        }
        buf = onion::open_reply(&pending.onion.dead_drop_key, &buf).ok()?;
        if buf.is_empty() {
            // No partner shared this slot: the dead drop swapped in an
            // empty body rather than a ciphertext (spec §4.4 step 3).
            return Some(Vec::new());
        }
        onion::open_inner_payload(&pending.onion.inner_key, &buf).ok()
    }
}
