//! Round state machine (spec §3 Round entity, I5), replacing the original
//! prototype's bare `open` boolean with an explicit small state machine so
//! "round r+1 cannot begin until round r's reply phase is drained" (I5)
//! has somewhere concrete to live.

use std::time::{Duration, Instant};

/// Lifecycle of a single round at the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundState {
    /// Admission window is open; clients may submit one message each.
    Open,
    /// Admission closed; the batch is being mixed and forwarded.
    Closed,
    /// Waiting for replies to drain back to clients (I5's gate on the
    /// next round starting).
    Draining,
    /// Every reply has been delivered (or timed out empty); the round is
    /// finished and `round_id` may advance.
    Done,
}

#[derive(Debug, Clone)]
pub struct RoundInfo {
    pub id: u64,
    pub state: RoundState,
    deadline: Instant,
}

impl RoundInfo {
    pub fn open(id: u64, round_duration: Duration) -> Self {
        Self { id, state: RoundState::Open, deadline: Instant::now() + round_duration }
    }

    pub fn is_open(&self) -> bool {
        self.state == RoundState::Open
    }

    pub fn deadline_elapsed(&self) -> bool {
        Instant::now() >= self.deadline
    }

    /// Admission window closes; late arrivals are dropped silently (§5).
    pub fn close(&mut self) {
        self.state = RoundState::Closed;
    }

    pub fn begin_draining(&mut self) {
        self.state = RoundState::Draining;
    }

    /// Round is fully drained; the coordinator may now advance `round_id`
    /// and open the next round (I5).
    pub fn finish(&mut self) {
        self.state = RoundState::Done;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_open() {
        let r = RoundInfo::open(0, Duration::from_secs(1));
        assert!(r.is_open());
    }

    #[test]
    fn state_transitions_in_order() {
        let mut r = RoundInfo::open(0, Duration::from_secs(1));
        r.close();
        assert_eq!(r.state, RoundState::Closed);
        r.begin_draining();
        assert_eq!(r.state, RoundState::Draining);
        r.finish();
        assert_eq!(r.state, RoundState::Done);
    }

    #[test]
    fn deadline_in_the_past_has_elapsed() {
        let r = RoundInfo::open(0, Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(5));
        assert!(r.deadline_elapsed());
    }
}
