//! Per-agent in-memory bookkeeping the pure `transition` module can't carry
//! itself: consecutive failure counts, last-attempt instants, and how long
//! a pod has been observed `Pending`. Lives only in the Reconciler's
//! process memory -- a restart resets it, which is acceptable since a
//! fresh process simply re-observes from scratch on its next tick.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::ids::Id;

#[derive(Default)]
pub struct RecoveryTracker {
    failure_counts: HashMap<Id, u32>,
    last_attempt: HashMap<Id, Instant>,
    pending_since: HashMap<Id, Instant>,
}

impl RecoveryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failure_count(&self, agent_id: Id) -> u32 {
        self.failure_counts.get(&agent_id).copied().unwrap_or(0)
    }

    pub fn elapsed_since_last_attempt(&self, agent_id: Id) -> Option<Duration> {
        self.last_attempt.get(&agent_id).map(|at| at.elapsed())
    }

    pub fn record_recovery_attempt(&mut self, agent_id: Id) {
        self.last_attempt.insert(agent_id, Instant::now());
    }

    pub fn record_recovery_failure(&mut self, agent_id: Id) {
        *self.failure_counts.entry(agent_id).or_insert(0) += 1;
        self.last_attempt.insert(agent_id, Instant::now());
    }

    pub fn record_recovery_success(&mut self, agent_id: Id) {
        self.failure_counts.remove(&agent_id);
        self.last_attempt.remove(&agent_id);
    }

    /// `None` until `mark_pending_observed` has been called for this agent;
    /// the transition decision uses this to distinguish "first time seen
    /// pending" from "still pending after N ticks".
    pub fn pending_elapsed(&self, agent_id: Id) -> Option<Duration> {
        self.pending_since.get(&agent_id).map(|at| at.elapsed())
    }

    pub fn mark_pending_observed(&mut self, agent_id: Id) {
        self.pending_since.entry(agent_id).or_insert_with(Instant::now);
    }

    pub fn clear_pending(&mut self, agent_id: Id) {
        self.pending_since.remove(&agent_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_count_starts_at_zero_and_increments() {
        let mut tracker = RecoveryTracker::new();
        let agent = Id::new();
        assert_eq!(tracker.failure_count(agent), 0);
        tracker.record_recovery_failure(agent);
        tracker.record_recovery_failure(agent);
        assert_eq!(tracker.failure_count(agent), 2);
    }

    #[test]
    fn success_clears_failure_tracking() {
        let mut tracker = RecoveryTracker::new();
        let agent = Id::new();
        tracker.record_recovery_failure(agent);
        tracker.record_recovery_success(agent);
        assert_eq!(tracker.failure_count(agent), 0);
        assert!(tracker.elapsed_since_last_attempt(agent).is_none());
    }

    #[test]
    fn pending_clock_starts_on_first_observation_only() {
        let mut tracker = RecoveryTracker::new();
        let agent = Id::new();
        assert!(tracker.pending_elapsed(agent).is_none());
        tracker.mark_pending_observed(agent);
        assert!(tracker.pending_elapsed(agent).is_some());
        tracker.clear_pending(agent);
        assert!(tracker.pending_elapsed(agent).is_none());
    }
}
