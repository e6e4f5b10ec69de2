//! The client's single outgoing queue (spec §4.1 `new_message`),
//! simplified from the messaging core's per-peer `MemoryOutbox` — a
//! client here has exactly one partner at a time, so one queue suffices.

use std::collections::VecDeque;

use thiserror::Error;

/// Caps the number of payloads a client may have queued awaiting a round.
pub const MAX_QUEUED: usize = 256;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OutboxError {
    #[error("payload of {0} bytes exceeds the inner payload budget of {1} bytes")]
    PayloadTooLarge(usize, usize),
    #[error("outbox already holds the maximum of {0} queued messages")]
    QueueFull(usize),
}

pub struct Outbox {
    queue: VecDeque<Vec<u8>>,
    inner_payload_budget: usize,
}

impl Outbox {
    pub fn new(inner_payload_budget: usize) -> Self {
        Self { queue: VecDeque::new(), inner_payload_budget }
    }

    /// Enqueue a payload (spec §4.1: "enqueue a payload (<= L_inner bytes).
    /// Excess bytes: reject."). The padding marker byte needs one spare
    /// byte of room, so the admissible length is `budget - 1`.
    pub fn enqueue(&mut self, payload: Vec<u8>) -> Result<(), OutboxError> {
        let max_len = self.inner_payload_budget.saturating_sub(1);
        if payload.len() > max_len {
            return Err(OutboxError::PayloadTooLarge(payload.len(), max_len));
        }
        if self.queue.len() >= MAX_QUEUED {
            return Err(OutboxError::QueueFull(MAX_QUEUED));
        }
        self.queue.push_back(payload);
        Ok(())
    }

    pub fn dequeue(&mut self) -> Option<Vec<u8>> {
        self.queue.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }
}
