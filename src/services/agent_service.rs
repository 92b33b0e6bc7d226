//! Agent Service (C10): agent CRUD, worker create/delete, live-status
//! enrichment.

use std::sync::Arc;

use crate::db::models::{Agent, AgentStatus};
use crate::db::{AgentSortBy, Database};
use crate::error::{ApiError, ApiResult};
use crate::ids::Id;
use crate::pagination::Cursor;
use crate::runtime_adapter::{WorkerPhase, WorkerRuntime};

const DEFAULT_HEARTBEAT_PERIOD_SECONDS: i32 = 300;
const MIN_HEARTBEAT_PERIOD_SECONDS: i32 = 300;
const MAX_HEARTBEAT_PERIOD_SECONDS: i32 = 86400;
pub const MAX_PAGE_SIZE: i64 = 100;

const DEFAULT_PERSONALITY: &str = "You are a Botcrew agent -- an autonomous AI crew member. \
You collaborate with other agents and humans, take initiative on tasks, and evolve your \
skills and personality through your work and interactions.";

const DEFAULT_HEARTBEAT_PROMPT: &str = "Check your assigned tasks and projects for work that \
needs attention. Only send messages to channels when you have something meaningful to share.";

pub struct AgentService<'a> {
    db: &'a Database,
    runtime: &'a Arc<dyn WorkerRuntime>,
    http: &'a reqwest::Client,
}

#[derive(Default)]
pub struct CreateAgentRequest {
    pub name: String,
    pub model_provider: String,
    pub model_name: String,
    pub identity: Option<String>,
    pub personality: Option<String>,
    pub heartbeat_period_seconds: Option<i32>,
}

#[derive(Default)]
pub struct UpdateAgentRequest {
    pub identity: Option<String>,
    pub personality: Option<String>,
    pub memory: Option<String>,
    pub heartbeat_period_seconds: Option<i32>,
    pub heartbeat_prompt: Option<String>,
    pub heartbeat_enabled: Option<bool>,
    pub model_provider: Option<String>,
    pub model_name: Option<String>,
}

impl<'a> AgentService<'a> {
    pub fn new(db: &'a Database, runtime: &'a Arc<dyn WorkerRuntime>, http: &'a reqwest::Client) -> Self {
        Self { db, runtime, http }
    }

    fn validate_heartbeat_period(period: i32) -> ApiResult<()> {
        if !(MIN_HEARTBEAT_PERIOD_SECONDS..=MAX_HEARTBEAT_PERIOD_SECONDS).contains(&period) {
            return Err(ApiError::Validation(format!(
                "heartbeat_period_seconds must be between {MIN_HEARTBEAT_PERIOD_SECONDS} and {MAX_HEARTBEAT_PERIOD_SECONDS}"
            )));
        }
        Ok(())
    }

    /// 1. Validate provider credentials. 2. Insert with status=creating.
    /// 3. Request `launch`; stamp handle and status=running on success, or
    ///    status=error on failure (left for the Reconciler to reclaim).
    /// 4. Commit (each DB write above already commits; there is no
    ///    multi-statement transaction to hold open across the `launch` call,
    ///    since that call may suspend for an unbounded time).
    pub async fn create_agent(&self, request: CreateAgentRequest) -> ApiResult<Agent> {
        let heartbeat_period = request
            .heartbeat_period_seconds
            .unwrap_or(DEFAULT_HEARTBEAT_PERIOD_SECONDS);
        Self::validate_heartbeat_period(heartbeat_period)?;

        let secrets = super::assemble_secrets(self.db).await?;
        if !super::model_provider::validate_provider_configured(&request.model_provider, &secrets) {
            return Err(ApiError::ProviderUnconfigured(format!(
                "provider '{}' is not configured",
                request.model_provider
            )));
        }

        let agent = self
            .db
            .create_agent(
                &request.name,
                request.identity.as_deref().unwrap_or(""),
                request.personality.as_deref().unwrap_or(DEFAULT_PERSONALITY),
                DEFAULT_HEARTBEAT_PROMPT,
                heartbeat_period,
                &request.model_provider,
                &request.model_name,
            )
            .await?;

        match self.runtime.launch(&agent.id.to_string()).await {
            Ok(handle) => {
                self.db
                    .set_agent_handle_and_status(Id::from_uuid(agent.id), Some(&handle), AgentStatus::Running)
                    .await?;
            }
            Err(err) => {
                tracing::warn!(agent_id = %agent.id, error = %err, "failed to launch worker for new agent");
                self.db
                    .set_agent_status(Id::from_uuid(agent.id), AgentStatus::Error)
                    .await?;
            }
        }

        self.db.get_agent(Id::from_uuid(agent.id)).await
    }

    pub async fn get(&self, id: Id) -> ApiResult<Agent> {
        self.db.get_agent(id).await
    }

    pub async fn list(
        &self,
        page_size: i64,
        after: Option<&str>,
        status_filter: Option<AgentStatus>,
        sort_by: AgentSortBy,
        sort_desc: bool,
    ) -> ApiResult<(Vec<Agent>, bool)> {
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(ApiError::Validation(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        let cursor = after.map(Cursor::decode).transpose()?;
        self.db.list_agents(page_size, cursor, status_filter, sort_by, sort_desc).await
    }

    /// Given a list of agents, makes ONE `list_all()` call to the
    /// worker-runtime adapter and overlays the observed phase onto each
    /// agent's displayed status. Never writes to the database -- only the
    /// Reconciler does that.
    pub async fn enrich_with_live_status(&self, mut agents: Vec<Agent>) -> Vec<Agent> {
        let handles = match self.runtime.list_all().await {
            Ok(handles) => handles,
            Err(err) => {
                tracing::warn!(error = %err, "failed to list worker handles for status enrichment");
                return agents;
            }
        };

        let phase_by_handle: std::collections::HashMap<&str, WorkerPhase> =
            handles.iter().map(|h| (h.handle.as_str(), h.phase)).collect();

        for agent in &mut agents {
            if !matches!(agent.status, AgentStatus::Running | AgentStatus::Error | AgentStatus::Recovering) {
                continue;
            }
            let phase = agent.worker_handle.as_deref().and_then(|h| phase_by_handle.get(h)).copied();
            match (agent.status, phase) {
                (AgentStatus::Running, None) => agent.status = AgentStatus::Error,
                (_, Some(WorkerPhase::Failed)) => agent.status = AgentStatus::Error,
                _ => {}
            }
        }
        agents
    }

    pub async fn get_with_live_status(&self, id: Id) -> ApiResult<Agent> {
        let agent = self.db.get_agent(id).await?;
        let mut enriched = self.enrich_with_live_status(vec![agent]).await;
        Ok(enriched.remove(0))
    }

    pub async fn update(&self, id: Id, request: UpdateAgentRequest) -> ApiResult<Agent> {
        if let Some(period) = request.heartbeat_period_seconds {
            Self::validate_heartbeat_period(period)?;
        }

        if request.model_provider.is_some() || request.model_name.is_some() {
            let current = self.db.get_agent(id).await?;
            let provider = request.model_provider.as_deref().unwrap_or(&current.model_provider);
            let secrets = super::assemble_secrets(self.db).await?;
            if !super::model_provider::validate_provider_configured(provider, &secrets) {
                return Err(ApiError::ProviderUnconfigured(format!(
                    "provider '{provider}' is not configured"
                )));
            }
        }

        let heartbeat_changed =
            request.heartbeat_period_seconds.is_some() || request.heartbeat_enabled.is_some();

        let agent = self
            .db
            .update_agent_fields(
                id,
                request.identity.as_deref(),
                request.personality.as_deref(),
                request.memory.as_deref(),
                request.heartbeat_period_seconds,
                request.heartbeat_prompt.as_deref(),
                request.heartbeat_enabled,
                request.model_provider.as_deref(),
                request.model_name.as_deref(),
            )
            .await?;

        if heartbeat_changed {
            self.push_config_update(&agent);
        }

        Ok(agent)
    }

    /// Fire-and-forget best-effort push to the worker's config endpoint.
    /// Decoupled from the HTTP response: the PATCH caller sees 200
    /// regardless of whether this push ever lands.
    fn push_config_update(&self, agent: &Agent) {
        let Some(handle) = agent.worker_handle.clone() else {
            return;
        };
        let http = self.http.clone();
        let heartbeat_prompt = agent.heartbeat_prompt.clone();
        let heartbeat_period_seconds = agent.heartbeat_period_seconds;
        let heartbeat_enabled = agent.heartbeat_enabled;
        let agent_id = agent.id;

        tokio::spawn(async move {
            let url = format!("http://{handle}:8080/api/config_update");
            let body = serde_json::json!({
                "heartbeat_prompt": heartbeat_prompt,
                "heartbeat_period_seconds": heartbeat_period_seconds,
                "heartbeat_enabled": heartbeat_enabled,
            });
            let result = http
                .post(&url)
                .json(&body)
                .timeout(std::time::Duration::from_secs(5))
                .send()
                .await;
            if let Err(err) = result {
                tracing::warn!(%agent_id, error = %err, "config push to worker failed");
            }
        });
    }

    /// Must never orphan a worker: set `terminating` and commit, terminate
    /// the worker, then delete the row. Deletion with a missing worker is
    /// idempotent -- `terminate` treats an unknown handle as a success.
    pub async fn delete(&self, id: Id) -> ApiResult<()> {
        let agent = self.db.get_agent(id).await?;
        self.db.set_agent_status(id, AgentStatus::Terminating).await?;

        if let Some(handle) = agent.worker_handle {
            if let Err(err) = self.runtime.terminate(&handle, 30).await {
                tracing::warn!(agent_id = %id, error = %err, "failed to terminate worker during delete");
            }
        }

        self.db.delete_agent(id).await
    }

    /// Clones configuration with empty memory and a fresh pod; memory is
    /// never carried over.
    pub async fn duplicate(&self, id: Id) -> ApiResult<Agent> {
        let source = self.db.get_agent(id).await?;
        self.create_agent(CreateAgentRequest {
            name: format!("{} (copy)", source.name),
            model_provider: source.model_provider,
            model_name: source.model_name,
            identity: Some(source.identity),
            personality: Some(source.personality),
            heartbeat_period_seconds: Some(source.heartbeat_period_seconds),
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heartbeat_bounds_reject_out_of_range() {
        assert!(AgentService::validate_heartbeat_period(299).is_err());
        assert!(AgentService::validate_heartbeat_period(86401).is_err());
        assert!(AgentService::validate_heartbeat_period(300).is_ok());
        assert!(AgentService::validate_heartbeat_period(86400).is_ok());
    }
}
