//! HTTP API (§6): agent/channel/message CRUD, the session handshake, the
//! internal worker-facing routes, and the health check.

mod envelope;
mod handlers;
mod internal;
pub mod types;
mod ws;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use crate::bus::BusPublisher;
use crate::db::Database;
use crate::queue::DeliveryQueue;
use crate::runtime_adapter::WorkerRuntime;
use crate::session_registry::SessionRegistry;

/// Application state shared across handlers. Every field is already
/// cheaply `Clone` (an `Arc` or an internally-pooled connection), matching
/// the teacher's `AppState` convention.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub bus_publisher: BusPublisher,
    pub queue: Arc<DeliveryQueue>,
    pub runtime: Arc<dyn WorkerRuntime>,
    pub session_registry: Arc<SessionRegistry>,
    pub http: reqwest::Client,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/agents", post(handlers::create_agent).get(handlers::list_agents))
        .route(
            "/agents/:id",
            get(handlers::get_agent).patch(handlers::update_agent).delete(handlers::delete_agent),
        )
        .route("/agents/:id/duplicate", post(handlers::duplicate_agent))
        .route(
            "/agents/:id/memory",
            get(handlers::get_memory)
                .put(handlers::replace_memory)
                .patch(handlers::patch_memory),
        )
        .route("/channels", post(handlers::create_channel).get(handlers::list_channels))
        .route("/channels/dm", post(handlers::send_dm))
        .route("/channels/:id", get(handlers::get_channel))
        .route(
            "/channels/:id/members",
            get(handlers::list_members).post(handlers::add_member).delete(handlers::remove_member),
        )
        .route(
            "/channels/:id/messages",
            get(handlers::history).post(handlers::send_message),
        )
        .route("/channels/:id/unread", get(handlers::unread))
        .route("/channels/:id/unread/messages", get(handlers::unread_messages))
        .route("/channels/:id/read", post(handlers::mark_read))
        .route("/ws/channels/:channel_id", get(ws::handshake))
        .route("/internal/agents/:id/boot-config", get(internal::boot_config))
        .route("/internal/agents/:id/status", post(internal::report_status))
        .route(
            "/internal/agents/:id/self",
            get(internal::get_self).patch(internal::patch_self),
        )
        .route("/internal/agents/:id/activities", post(internal::post_activity))
        .route("/internal/agents/:id/token-usage", post(internal::post_token_usage))
        .route("/internal/agents/:id/projects", get(internal::list_projects))
        .route("/internal/agents/:id/tasks", get(internal::list_tasks))
        .route("/system/health", get(handlers::health))
        .with_state(state)
}

/// Every handler parses an `axum::extract::Path<String>` into an opaque
/// `Id` through this helper, mapped uniformly to `Validation` -- a
/// malformed id is a bad request, not an entity lookup failure.
pub(crate) fn parse_id(raw: &str) -> crate::error::ApiResult<crate::ids::Id> {
    raw.parse().map_err(|_| crate::error::ApiError::Validation(format!("malformed id: {raw}")))
}
