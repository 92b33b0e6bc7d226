//! Pure reconciliation decision function: desired state (DB) × observed
//! state (worker runtime) -> the single action to take this tick.
//!
//! Mirrors the teacher's `state_machine::transition` shape -- a pure
//! `(state, observation) -> action` match with no I/O -- generalized from
//! conversation events to pod-lifecycle drift.

use std::time::Duration;

use crate::db::models::AgentStatus;
use crate::runtime_adapter::WorkerPhase;

const PENDING_TIMEOUT: Duration = Duration::from_secs(180);
const MAX_IMMEDIATE_RETRIES: u32 = 5;
const BACKOFF_BASE_SECS: u64 = 10;
const BACKOFF_MAX_SECS: u64 = 600;

/// What the worker-runtime adapter reports for an agent's pod, as seen by
/// one reconciliation tick.
#[derive(Debug, Clone, Copy)]
pub enum Observation {
    Missing,
    Phase(WorkerPhase),
}

#[derive(Debug, PartialEq, Eq)]
pub enum ReconcileAction {
    /// Nothing to do this tick.
    NoOp,
    /// Mark the agent `error`. No pod deletion needed.
    MarkError,
    /// Mark the agent `error` and delete the named (failed) pod.
    MarkErrorAndDelete,
    /// First tick a `running` agent's pod has been observed `Pending`;
    /// start the timeout clock.
    StartPendingClock,
    /// A `running` agent's pod has been `Pending` past the timeout; mark
    /// `error` and delete it so recovery can retry with a fresh spec.
    PendingTimeoutExceeded,
    /// Attempt recovery now: transition to `recovering` and relaunch.
    AttemptRecovery,
    /// Recovery is due but still within its backoff window; skip.
    SkipBackoff,
}

/// `pending_elapsed` is `Some` only once a `Pending` phase has already been
/// observed on a prior tick (the clock the DB status alone can't carry).
pub fn decide(status: AgentStatus, observation: Observation, pending_elapsed: Option<Duration>) -> ReconcileAction {
    match (status, observation) {
        (AgentStatus::Running, Observation::Missing) => ReconcileAction::MarkError,

        (AgentStatus::Running, Observation::Phase(WorkerPhase::Failed)) => ReconcileAction::MarkErrorAndDelete,

        (AgentStatus::Running, Observation::Phase(WorkerPhase::Pending)) => match pending_elapsed {
            None => ReconcileAction::StartPendingClock,
            Some(elapsed) if elapsed > PENDING_TIMEOUT => ReconcileAction::PendingTimeoutExceeded,
            Some(_) => ReconcileAction::NoOp,
        },

        (AgentStatus::Running, Observation::Phase(WorkerPhase::Running)) => ReconcileAction::NoOp,

        (AgentStatus::Error | AgentStatus::Recovering, Observation::Missing) => ReconcileAction::AttemptRecovery,

        (AgentStatus::Error | AgentStatus::Recovering, Observation::Phase(_)) => ReconcileAction::NoOp,

        (AgentStatus::Creating | AgentStatus::Terminating, _) => ReconcileAction::NoOp,
    }
}

/// `10 * 2^(failure_count - 5)` seconds, capped at 600s, once a recovery
/// has failed `MAX_IMMEDIATE_RETRIES` times in a row. Below that threshold
/// recovery is retried on every tick.
pub fn recovery_backoff(failure_count: u32) -> Duration {
    if failure_count < MAX_IMMEDIATE_RETRIES {
        return Duration::ZERO;
    }
    let exponent = failure_count - MAX_IMMEDIATE_RETRIES;
    let secs = BACKOFF_BASE_SECS.saturating_mul(1u64.checked_shl(exponent).unwrap_or(u64::MAX).max(1));
    Duration::from_secs(secs.min(BACKOFF_MAX_SECS))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn running_with_missing_pod_marks_error() {
        assert_eq!(
            decide(AgentStatus::Running, Observation::Missing, None),
            ReconcileAction::MarkError
        );
    }

    #[test]
    fn running_with_failed_pod_marks_error_and_deletes() {
        assert_eq!(
            decide(AgentStatus::Running, Observation::Phase(WorkerPhase::Failed), None),
            ReconcileAction::MarkErrorAndDelete
        );
    }

    #[test]
    fn running_with_healthy_pod_is_a_noop() {
        assert_eq!(
            decide(AgentStatus::Running, Observation::Phase(WorkerPhase::Running), None),
            ReconcileAction::NoOp
        );
    }

    #[test]
    fn first_pending_observation_starts_the_clock() {
        assert_eq!(
            decide(AgentStatus::Running, Observation::Phase(WorkerPhase::Pending), None),
            ReconcileAction::StartPendingClock
        );
    }

    #[test]
    fn pending_past_timeout_is_reclaimed() {
        assert_eq!(
            decide(
                AgentStatus::Running,
                Observation::Phase(WorkerPhase::Pending),
                Some(Duration::from_secs(181))
            ),
            ReconcileAction::PendingTimeoutExceeded
        );
    }

    #[test]
    fn pending_within_timeout_is_a_noop() {
        assert_eq!(
            decide(
                AgentStatus::Running,
                Observation::Phase(WorkerPhase::Pending),
                Some(Duration::from_secs(179))
            ),
            ReconcileAction::NoOp
        );
    }

    #[test]
    fn error_with_missing_pod_attempts_recovery() {
        assert_eq!(
            decide(AgentStatus::Error, Observation::Missing, None),
            ReconcileAction::AttemptRecovery
        );
        assert_eq!(
            decide(AgentStatus::Recovering, Observation::Missing, None),
            ReconcileAction::AttemptRecovery
        );
    }

    #[test]
    fn creating_and_terminating_are_always_skipped() {
        assert_eq!(
            decide(AgentStatus::Creating, Observation::Missing, None),
            ReconcileAction::NoOp
        );
        assert_eq!(
            decide(AgentStatus::Terminating, Observation::Phase(WorkerPhase::Failed), None),
            ReconcileAction::NoOp
        );
    }

    #[test]
    fn backoff_is_zero_below_the_immediate_retry_threshold() {
        assert_eq!(recovery_backoff(0), Duration::ZERO);
        assert_eq!(recovery_backoff(4), Duration::ZERO);
    }

    #[test]
    fn backoff_doubles_and_caps_at_ten_minutes() {
        assert_eq!(recovery_backoff(5), Duration::from_secs(10));
        assert_eq!(recovery_backoff(6), Duration::from_secs(20));
        assert_eq!(recovery_backoff(7), Duration::from_secs(40));
        assert_eq!(recovery_backoff(12), Duration::from_secs(600));
        assert_eq!(recovery_backoff(40), Duration::from_secs(600));
    }
}
