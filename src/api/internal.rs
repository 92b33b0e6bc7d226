//! Internal worker-facing routes (§6): boot-config, status reporting,
//! self-introspection, activity logging, and assignment lookups consumed
//! by a worker's own tools. These are called by the worker, never by an
//! external client, but ride the same router and error taxonomy.

use axum::extract::{Path, State};
use axum::Json;

use crate::api::envelope::{page, single, Envelope, Resource};
use crate::api::types::{ActivityBody, StatusAck, StatusReportBody, TokenUsageBody};
use crate::api::{parse_id, AppState};
use crate::boot_config::{self, BootConfig};
use crate::db::models::{Agent, AgentStatus, Project, Task};
use crate::error::{ApiError, ApiResult};
use crate::activity;
use crate::services::agent_service::{AgentService, UpdateAgentRequest};
use crate::services::token_service::TokenService;

const PROJECT_TYPE: &str = "project";
const TASK_TYPE: &str = "task";

pub async fn boot_config(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<BootConfig>> {
    let id = parse_id(&id)?;
    Ok(Json(boot_config::assemble(&state.db, id).await?))
}

/// Worker-reported status transition. Runs against the background pool so
/// a burst of heartbeats never competes with inbound request traffic for a
/// connection.
pub async fn report_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<StatusReportBody>,
) -> ApiResult<Json<StatusAck>> {
    let id = parse_id(&id)?;
    let status = map_reported_status(&body.status)?;
    state.db.set_agent_status_bg(id, status).await?;
    Ok(Json(StatusAck { acknowledged: true }))
}

/// `ready → running`; `error` and `unhealthy` both collapse to `error` --
/// there is no retry semantics here, a worker may re-report at will.
fn map_reported_status(raw: &str) -> ApiResult<AgentStatus> {
    match raw {
        "ready" => Ok(AgentStatus::Running),
        "error" | "unhealthy" => Ok(AgentStatus::Error),
        other => Err(ApiError::Validation(format!("unknown reported status: {other}"))),
    }
}

pub async fn get_self(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Envelope<Resource<Agent>>> {
    let id = parse_id(&id)?;
    let agent = state.db.get_agent_bg(id).await?;
    Ok(single("agent", agent.id, agent))
}

/// Name is immutable by the agent itself; this accepts the same partial
/// fields as the operator-facing PATCH but is never routed a `name`.
pub async fn patch_self(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<crate::api::types::UpdateAgentBody>,
) -> ApiResult<Envelope<Resource<Agent>>> {
    let id = parse_id(&id)?;
    let service = AgentService::new(&state.db, &state.runtime, &state.http);
    let agent = service
        .update(
            id,
            UpdateAgentRequest {
                identity: body.identity,
                personality: body.personality,
                memory: body.memory,
                heartbeat_period_seconds: body.heartbeat_period_seconds,
                heartbeat_prompt: body.heartbeat_prompt,
                heartbeat_enabled: body.heartbeat_enabled,
                model_provider: body.model_provider,
                model_name: body.model_name,
            },
        )
        .await?;
    Ok(single("agent", agent.id, agent))
}

pub async fn post_activity(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ActivityBody>,
) -> ApiResult<Json<StatusAck>> {
    let id = parse_id(&id)?;
    activity::log(&state.db, Some(id), &body.event_kind, &body.summary, body.details).await;
    Ok(Json(StatusAck { acknowledged: true }))
}

/// Records the tokens a worker spent on one LLM turn. Write-only from the
/// orchestrator's point of view -- nothing downstream reconciles against it.
pub async fn post_token_usage(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<TokenUsageBody>,
) -> ApiResult<Json<StatusAck>> {
    let id = parse_id(&id)?;
    let channel_id = body.channel_id.as_deref().map(parse_id).transpose()?;
    TokenService::new(&state.db)
        .record(id, channel_id, body.prompt_tokens, body.completion_tokens)
        .await?;
    Ok(Json(StatusAck { acknowledged: true }))
}

pub async fn list_projects(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Envelope<Vec<Resource<Project>>>> {
    let id = parse_id(&id)?;
    let projects = state.db.agent_active_projects(id).await?;
    let items = projects.into_iter().map(|p| (p.id.to_string(), p)).collect();
    Ok(page(PROJECT_TYPE, items, false, None))
}

pub async fn list_tasks(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Envelope<Vec<Resource<Task>>>> {
    let id = parse_id(&id)?;
    let tasks = state.db.agent_tasks(id).await?;
    let items = tasks.into_iter().map(|t| (t.id.to_string(), t)).collect();
    Ok(page(TASK_TYPE, items, false, None))
}
