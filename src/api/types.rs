//! HTTP request/response DTOs for the agent, channel, and internal routes.

use serde::{Deserialize, Serialize};

use crate::db::models::ChannelType;
use crate::ids::Id;

// ---- Agents -----------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateAgentBody {
    pub name: String,
    pub model_provider: String,
    pub model_name: String,
    pub identity: Option<String>,
    pub personality: Option<String>,
    pub heartbeat_period_seconds: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateAgentBody {
    pub identity: Option<String>,
    pub personality: Option<String>,
    pub memory: Option<String>,
    pub heartbeat_period_seconds: Option<i32>,
    pub heartbeat_prompt: Option<String>,
    pub heartbeat_enabled: Option<bool>,
    pub model_provider: Option<String>,
    pub model_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ListAgentsQuery {
    pub page_size: Option<i64>,
    pub after: Option<String>,
    pub status: Option<String>,
    pub sort_by: Option<String>,
    #[serde(default)]
    pub sort_desc: bool,
}

#[derive(Debug, Serialize)]
pub struct MemoryResponse {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct ReplaceMemoryBody {
    pub content: String,
}

/// PATCH body is either `{append: "..."}` or `{content: "..."}`; exactly
/// one of the two is expected, validated in the handler.
#[derive(Debug, Default, Deserialize)]
pub struct PatchMemoryBody {
    pub append: Option<String>,
    pub content: Option<String>,
}

// ---- Channels -----------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CreateChannelBody {
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub channel_type: ChannelType,
    pub creator: Option<String>,
    #[serde(default)]
    pub initial_agents: Vec<Id>,
}

#[derive(Debug, Deserialize)]
pub struct ListChannelsQuery {
    pub filter_by_agent: Option<Id>,
    pub filter_by_human: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MemberBody {
    pub agent_id: Option<Id>,
    pub user_identifier: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RemoveMemberQuery {
    pub agent_id: Option<Id>,
    pub user_identifier: Option<String>,
}

// ---- Messages -----------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SendMessageBody {
    pub content: String,
    pub sender_agent_id: Option<Id>,
    pub sender_user_identifier: Option<String>,
    #[serde(default = "default_message_type")]
    pub message_type: String,
    pub metadata: Option<serde_json::Value>,
}

fn default_message_type() -> String {
    "chat".to_string()
}

#[derive(Debug, Deserialize)]
pub struct SendDmBody {
    pub target_agent_id: Id,
    pub content: String,
    pub sender_user_identifier: Option<String>,
    pub sender_agent_id: Option<Id>,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub page_size: Option<i64>,
    pub before: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IdentifierQuery {
    pub agent_id: Option<Id>,
    pub user_identifier: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MarkReadBody {
    pub last_read_message_id: Id,
    pub agent_id: Option<Id>,
    pub user_identifier: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UnreadResponse {
    pub count: i64,
}

// ---- Internal (worker-facing) --------------------------------------------

#[derive(Debug, Deserialize)]
pub struct StatusReportBody {
    pub status: String,
    #[allow(dead_code)] // accepted for forward compatibility, not persisted
    pub checks: Option<serde_json::Value>,
    #[allow(dead_code)]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct StatusAck {
    pub acknowledged: bool,
}

#[derive(Debug, Deserialize)]
pub struct ActivityBody {
    pub event_kind: String,
    pub summary: String,
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct TokenUsageBody {
    pub channel_id: Option<String>,
    pub prompt_tokens: i32,
    pub completion_tokens: i32,
}

// ---- Session frames (C13) -------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct InboundFrame {
    #[serde(rename = "type")]
    pub frame_type: String,
    pub content: String,
    pub message_type: String,
}

#[derive(Debug, Deserialize)]
pub struct WsHandshakeQuery {
    pub client_id: String,
}

// ---- System health --------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: bool,
    pub bus: bool,
}
