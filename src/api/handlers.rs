//! Agent, channel, message, and health route handlers (§6).

use axum::extract::{Path, Query, State};
use axum::Json;

use crate::api::envelope::{page, single, Envelope, Resource};
use crate::api::types::*;
use crate::api::{parse_id, AppState};
use crate::db::models::{Agent, Channel, ChannelMember, Message, MessageType};
use crate::db::AgentSortBy;
use crate::error::{ApiError, ApiResult};
use crate::hub::CommunicationHub;
use crate::ids::Id;
use crate::pagination::Cursor;
use crate::services::agent_service::{AgentService, CreateAgentRequest, UpdateAgentRequest};
use crate::services::channel_service::ChannelService;
use crate::services::message_service::MessageService;

const AGENT_TYPE: &str = "agent";
const CHANNEL_TYPE: &str = "channel";
const MEMBER_TYPE: &str = "channel_member";
const MESSAGE_TYPE: &str = "message";

fn parse_sort_by(raw: Option<&str>) -> ApiResult<AgentSortBy> {
    match raw {
        None | Some("created_at") => Ok(AgentSortBy::CreatedAt),
        Some("name") => Ok(AgentSortBy::Name),
        Some(other) => Err(ApiError::Validation(format!("unknown sort_by: {other}"))),
    }
}

fn parse_status_filter(raw: Option<&str>) -> ApiResult<Option<crate::db::models::AgentStatus>> {
    use crate::db::models::AgentStatus::*;
    match raw {
        None => Ok(None),
        Some("creating") => Ok(Some(Creating)),
        Some("running") => Ok(Some(Running)),
        Some("error") => Ok(Some(Error)),
        Some("recovering") => Ok(Some(Recovering)),
        Some("terminating") => Ok(Some(Terminating)),
        Some(other) => Err(ApiError::Validation(format!("unknown status: {other}"))),
    }
}

pub async fn create_agent(
    State(state): State<AppState>,
    Json(body): Json<CreateAgentBody>,
) -> ApiResult<Envelope<Resource<Agent>>> {
    let service = AgentService::new(&state.db, &state.runtime, &state.http);
    let agent = service
        .create_agent(CreateAgentRequest {
            name: body.name,
            model_provider: body.model_provider,
            model_name: body.model_name,
            identity: body.identity,
            personality: body.personality,
            heartbeat_period_seconds: body.heartbeat_period_seconds,
        })
        .await?;
    Ok(single(AGENT_TYPE, agent.id, agent))
}

pub async fn list_agents(
    State(state): State<AppState>,
    Query(query): Query<ListAgentsQuery>,
) -> ApiResult<Envelope<Vec<Resource<Agent>>>> {
    let service = AgentService::new(&state.db, &state.runtime, &state.http);
    let page_size = query.page_size.unwrap_or(50);
    let sort_by = parse_sort_by(query.sort_by.as_deref())?;
    let status_filter = parse_status_filter(query.status.as_deref())?;

    let (agents, has_more) = service
        .list(page_size, query.after.as_deref(), status_filter, sort_by, query.sort_desc)
        .await?;
    let agents = service.enrich_with_live_status(agents).await;

    let next_cursor = agents
        .last()
        .filter(|_| has_more)
        .map(|a| Cursor::new(a.created_at, Id::from_uuid(a.id)).encode());

    let items = agents.into_iter().map(|a| (a.id.to_string(), a)).collect();
    Ok(page(AGENT_TYPE, items, has_more, next_cursor))
}

pub async fn get_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Envelope<Resource<Agent>>> {
    let id = parse_id(&id)?;
    let service = AgentService::new(&state.db, &state.runtime, &state.http);
    let agent = service.get_with_live_status(id).await?;
    Ok(single(AGENT_TYPE, agent.id, agent))
}

pub async fn update_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateAgentBody>,
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
    Ok(single(AGENT_TYPE, agent.id, agent))
}

pub async fn delete_agent(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    let id = parse_id(&id)?;
    AgentService::new(&state.db, &state.runtime, &state.http).delete(id).await
}

pub async fn duplicate_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Envelope<Resource<Agent>>> {
    let id = parse_id(&id)?;
    let agent = AgentService::new(&state.db, &state.runtime, &state.http).duplicate(id).await?;
    Ok(single(AGENT_TYPE, agent.id, agent))
}

pub async fn get_memory(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<MemoryResponse>> {
    let id = parse_id(&id)?;
    let agent = state.db.get_agent(id).await?;
    Ok(Json(MemoryResponse { content: agent.memory }))
}

pub async fn replace_memory(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ReplaceMemoryBody>,
) -> ApiResult<Json<MemoryResponse>> {
    let id = parse_id(&id)?;
    let agent = AgentService::new(&state.db, &state.runtime, &state.http)
        .update(
            id,
            UpdateAgentRequest {
                memory: Some(body.content),
                ..Default::default()
            },
        )
        .await?;
    Ok(Json(MemoryResponse { content: agent.memory }))
}

pub async fn patch_memory(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<PatchMemoryBody>,
) -> ApiResult<Json<MemoryResponse>> {
    let id = parse_id(&id)?;
    let content = match (body.append, body.content) {
        (Some(append), None) => {
            let current = state.db.get_agent(id).await?;
            format!("{}{append}", current.memory)
        }
        (None, Some(content)) => content,
        _ => {
            return Err(ApiError::Validation(
                "patch body must set exactly one of append or content".to_string(),
            ))
        }
    };
    let agent = AgentService::new(&state.db, &state.runtime, &state.http)
        .update(
            id,
            UpdateAgentRequest {
                memory: Some(content),
                ..Default::default()
            },
        )
        .await?;
    Ok(Json(MemoryResponse { content: agent.memory }))
}

pub async fn create_channel(
    State(state): State<AppState>,
    Json(body): Json<CreateChannelBody>,
) -> ApiResult<Envelope<Resource<Channel>>> {
    let channel = ChannelService::new(&state.db)
        .create(
            &body.name,
            body.description.as_deref(),
            body.channel_type,
            body.creator.as_deref(),
            &body.initial_agents,
        )
        .await?;
    Ok(single(CHANNEL_TYPE, channel.id, channel))
}

pub async fn list_channels(
    State(state): State<AppState>,
    Query(query): Query<ListChannelsQuery>,
) -> ApiResult<Envelope<Vec<Resource<Channel>>>> {
    let channels = ChannelService::new(&state.db)
        .list_channels(query.filter_by_agent, query.filter_by_human.as_deref())
        .await?;
    let items = channels.into_iter().map(|c| (c.id.to_string(), c)).collect();
    Ok(page(CHANNEL_TYPE, items, false, None))
}

pub async fn get_channel(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Envelope<Resource<Channel>>> {
    let id = parse_id(&id)?;
    let channel = ChannelService::new(&state.db).get(id).await?;
    Ok(single(CHANNEL_TYPE, channel.id, channel))
}

pub async fn list_members(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Envelope<Vec<Resource<ChannelMember>>>> {
    let id = parse_id(&id)?;
    let members = ChannelService::new(&state.db).list_members(id).await?;
    let items = members.into_iter().map(|m| (m.id.to_string(), m)).collect();
    Ok(page(MEMBER_TYPE, items, false, None))
}

pub async fn add_member(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<MemberBody>,
) -> ApiResult<Envelope<Resource<ChannelMember>>> {
    let id = parse_id(&id)?;
    let member = ChannelService::new(&state.db)
        .add_member(id, body.agent_id, body.user_identifier.as_deref())
        .await?;
    Ok(single(MEMBER_TYPE, member.id, member))
}

pub async fn remove_member(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<RemoveMemberQuery>,
) -> ApiResult<()> {
    let id = parse_id(&id)?;
    ChannelService::new(&state.db)
        .remove_member(id, query.agent_id, query.user_identifier.as_deref())
        .await
}

pub async fn history(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Envelope<Vec<Resource<Message>>>> {
    let id = parse_id(&id)?;
    let page_size = query.page_size.unwrap_or(50);
    let (messages, has_more) = MessageService::new(&state.db)
        .history(id, page_size, query.before.as_deref())
        .await?;

    let next_cursor = messages
        .last()
        .filter(|_| has_more)
        .map(|m| Cursor::new(m.created_at, Id::from_uuid(m.id)).encode());

    let items = messages.into_iter().map(|m| (m.id.to_string(), m)).collect();
    Ok(page(MESSAGE_TYPE, items, has_more, next_cursor))
}

pub async fn send_message(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<SendMessageBody>,
) -> ApiResult<Envelope<Resource<Message>>> {
    let id = parse_id(&id)?;
    let message_type = parse_message_type(&body.message_type)?;
    let hub = CommunicationHub::new(&state.db, &state.bus_publisher, &state.queue);
    let message = hub
        .send_channel_message(
            id,
            &body.content,
            body.sender_agent_id,
            body.sender_user_identifier.as_deref(),
            message_type,
            body.metadata,
        )
        .await?;
    Ok(single(MESSAGE_TYPE, message.id, message))
}

pub async fn send_dm(
    State(state): State<AppState>,
    Json(body): Json<SendDmBody>,
) -> ApiResult<Envelope<Resource<Message>>> {
    let hub = CommunicationHub::new(&state.db, &state.bus_publisher, &state.queue);
    let message = hub
        .send_direct_message(
            body.target_agent_id,
            &body.content,
            body.sender_user_identifier.as_deref(),
            body.sender_agent_id,
        )
        .await?;
    Ok(single(MESSAGE_TYPE, message.id, message))
}

pub async fn unread(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<IdentifierQuery>,
) -> ApiResult<Json<UnreadResponse>> {
    let id = parse_id(&id)?;
    let count = MessageService::new(&state.db)
        .unread_count(id, query.agent_id, query.user_identifier.as_deref())
        .await?;
    Ok(Json(UnreadResponse { count }))
}

pub async fn unread_messages(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<IdentifierQuery>,
) -> ApiResult<Envelope<Vec<Resource<Message>>>> {
    let id = parse_id(&id)?;
    let messages = MessageService::new(&state.db)
        .unread_messages(id, query.agent_id, query.user_identifier.as_deref())
        .await?;
    let items = messages.into_iter().map(|m| (m.id.to_string(), m)).collect();
    Ok(page(MESSAGE_TYPE, items, false, None))
}

pub async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<MarkReadBody>,
) -> ApiResult<()> {
    let id = parse_id(&id)?;
    MessageService::new(&state.db)
        .update_read_cursor(id, body.last_read_message_id, body.agent_id, body.user_identifier.as_deref())
        .await
}

fn parse_message_type(raw: &str) -> ApiResult<MessageType> {
    match raw {
        "chat" => Ok(MessageType::Chat),
        "dm" => Ok(MessageType::Dm),
        "system" => Ok(MessageType::System),
        other => Err(ApiError::Validation(format!("unknown message_type: {other}"))),
    }
}

/// Checks the database and bus independently, so an operator can tell
/// which dependency is down.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = state.db.ping().await;
    let bus = state.bus_publisher.ping().await;
    Json(HealthResponse {
        status: if database && bus { "healthy" } else { "degraded" },
        database,
        bus,
    })
}
