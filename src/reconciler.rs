//! Reconciler (C11): compares desired state (agents in the Durable Store)
//! with observed state (the Worker-Runtime Adapter) on a fixed period and
//! corrects drift. Grounded on the original `ReconciliationLoop` -- the
//! two-table diff and exponential backoff survive unchanged; the pure
//! decision is split out into `reconciler::transition` the way the
//! teacher keeps its conversation transition logic out of the I/O loop.

mod recovery;
pub mod transition;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::db::models::AgentStatus;
use crate::db::Database;
use crate::ids::Id;
use crate::runtime_adapter::{WorkerPhase, WorkerRuntime};
use recovery::RecoveryTracker;
use transition::{decide, recovery_backoff, Observation, ReconcileAction};

pub struct Reconciler {
    db: Arc<Database>,
    runtime: Arc<dyn WorkerRuntime>,
    period: Duration,
}

impl Reconciler {
    pub fn new(db: Arc<Database>, runtime: Arc<dyn WorkerRuntime>, period: Duration) -> Self {
        Self { db, runtime, period }
    }

    pub async fn run(self, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        let mut tracker = RecoveryTracker::new();
        let mut ticker = tokio::time::interval(self.period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    tracing::info!("reconciler shutting down");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(err) = self.reconcile_once(&mut tracker).await {
                        tracing::error!(error = %err, "reconciliation cycle failed");
                    }
                }
            }
        }
    }

    async fn reconcile_once(&self, tracker: &mut RecoveryTracker) -> Result<(), crate::error::ApiError> {
        let agents = self
            .db
            .agents_by_status(&[AgentStatus::Running, AgentStatus::Error, AgentStatus::Recovering])
            .await?;
        if agents.is_empty() {
            return Ok(());
        }

        let handles = match self.runtime.list_all().await {
            Ok(handles) => handles,
            Err(err) => {
                tracing::warn!(error = %err, "reconciler failed to list worker handles, skipping cycle");
                return Ok(());
            }
        };
        let phase_by_handle: HashMap<&str, WorkerPhase> =
            handles.iter().map(|h| (h.handle.as_str(), h.phase)).collect();

        for agent in agents {
            let agent_id = Id::from_uuid(agent.id);
            let observation = match agent.worker_handle.as_deref().and_then(|h| phase_by_handle.get(h)) {
                Some(phase) => Observation::Phase(*phase),
                None => Observation::Missing,
            };

            let pending_elapsed = tracker.pending_elapsed(agent_id);
            let action = decide(agent.status, observation, pending_elapsed);

            match action {
                ReconcileAction::NoOp => {
                    if !matches!(observation, Observation::Phase(WorkerPhase::Pending)) {
                        tracker.clear_pending(agent_id);
                    }
                }
                ReconcileAction::StartPendingClock => tracker.mark_pending_observed(agent_id),
                ReconcileAction::MarkError => {
                    tracing::warn!(%agent_id, "pod missing for running agent, marking error");
                    self.db.set_agent_status_bg(agent_id, AgentStatus::Error).await?;
                }
                ReconcileAction::MarkErrorAndDelete => {
                    tracing::warn!(%agent_id, "pod failed for running agent, marking error");
                    self.db.set_agent_status_bg(agent_id, AgentStatus::Error).await?;
                    self.delete_pod_best_effort(&agent.worker_handle).await;
                }
                ReconcileAction::PendingTimeoutExceeded => {
                    tracing::warn!(%agent_id, "pod stuck pending past timeout, marking error");
                    self.db.set_agent_status_bg(agent_id, AgentStatus::Error).await?;
                    self.delete_pod_best_effort(&agent.worker_handle).await;
                    tracker.clear_pending(agent_id);
                }
                ReconcileAction::AttemptRecovery => {
                    self.attempt_recovery(agent_id, tracker).await?;
                }
                ReconcileAction::SkipBackoff => {}
            }
        }

        Ok(())
    }

    /// Transitions to `recovering`, relaunches, and on success stamps
    /// `running` with the fresh handle; on failure reverts to `error` and
    /// records the failure for the next cycle's backoff check.
    async fn attempt_recovery(
        &self,
        agent_id: Id,
        tracker: &mut RecoveryTracker,
    ) -> Result<(), crate::error::ApiError> {
        let failure_count = tracker.failure_count(agent_id);
        let backoff = recovery_backoff(failure_count);
        if let Some(elapsed) = tracker.elapsed_since_last_attempt(agent_id) {
            if elapsed < backoff {
                tracing::debug!(%agent_id, backoff_secs = backoff.as_secs(), elapsed_secs = elapsed.as_secs(), "skipping recovery, still in backoff");
                return Ok(());
            }
        }

        self.db.set_agent_status_bg(agent_id, AgentStatus::Recovering).await?;
        tracker.record_recovery_attempt(agent_id);

        match self.runtime.launch(&agent_id.to_string()).await {
            Ok(handle) => {
                self.db
                    .set_agent_handle_and_status_bg(agent_id, Some(&handle), AgentStatus::Running)
                    .await?;
                tracker.record_recovery_success(agent_id);
                tracing::info!(%agent_id, handle, "recovered agent with new worker");
            }
            Err(err) => {
                self.db.set_agent_status_bg(agent_id, AgentStatus::Error).await?;
                tracker.record_recovery_failure(agent_id);
                tracing::warn!(%agent_id, error = %err, attempt = failure_count + 1, "agent recovery failed");
            }
        }

        Ok(())
    }

    async fn delete_pod_best_effort(&self, handle: &Option<String>) {
        let Some(handle) = handle else { return };
        if let Err(err) = self.runtime.terminate(handle, 0).await {
            tracing::warn!(handle, error = %err, "failed to delete unhealthy pod");
        }
    }
}
