//! Row types for the Durable Store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Creating,
    Running,
    Error,
    Recovering,
    Terminating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    Shared,
    Dm,
    Project,
    Task,
    Custom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Chat,
    System,
    Dm,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Agent {
    pub id: Uuid,
    pub name: String,
    pub identity: String,
    pub personality: String,
    pub memory: String,
    pub heartbeat_period_seconds: i32,
    pub heartbeat_prompt: String,
    pub heartbeat_enabled: bool,
    pub model_provider: String,
    pub model_name: String,
    pub worker_handle: Option<String>,
    pub status: AgentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Channel {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub channel_type: ChannelType,
    pub creator_user_identifier: Option<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ChannelMember {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub agent_id: Option<Uuid>,
    pub user_identifier: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Message {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub sender_agent_id: Option<Uuid>,
    pub sender_user_identifier: Option<String>,
    pub content: String,
    pub message_type: MessageType,
    pub metadata: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ReadCursor {
    pub id: Uuid,
    pub channel_id: Uuid,
    pub agent_id: Option<Uuid>,
    pub user_identifier: Option<String>,
    pub last_read_message_id: Uuid,
    pub last_read_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Activity {
    pub id: Uuid,
    pub agent_id: Option<Uuid>,
    pub event_kind: String,
    pub summary: String,
    pub details: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Secret {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Integration {
    pub id: Uuid,
    pub name: String,
    pub integration_type: String,
    pub is_active: bool,
    pub config: serde_json::Value,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Skill {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub goals: String,
    pub specs: String,
    pub role_prompt: String,
    pub workspace_path: String,
    pub notes: Option<String>,
    pub channel_id: Option<Uuid>,
    pub is_active: bool,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Task {
    pub id: Uuid,
    pub project_id: Option<Uuid>,
    pub name: String,
    pub description: String,
    pub directive: String,
    pub status: String,
    pub channel_id: Option<Uuid>,
}
