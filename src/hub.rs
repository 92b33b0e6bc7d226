//! Communication Hub (C9): the single write path for messages. Persist →
//! publish → route mentions → enqueue evaluations.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::bus::BusPublisher;
use crate::db::models::{Message, MessageType};
use crate::db::Database;
use crate::error::ApiResult;
use crate::ids::Id;
use crate::queue::DeliveryQueue;
use crate::services::channel_service::ChannelService;
use crate::services::message_service::MessageService;

fn mention_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"@([\w-]+)").expect("mention pattern is a valid regex"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum SenderKind {
    Agent,
    User,
    System,
}

#[derive(Serialize)]
struct OutboundFrame<'a> {
    #[serde(rename = "type")]
    frame_type: &'static str,
    id: Id,
    channel_id: Id,
    sender_type: SenderKind,
    sender_id: Option<&'a str>,
    content: &'a str,
    message_type: &'static str,
    created_at: chrono::DateTime<chrono::Utc>,
}

pub struct CommunicationHub<'a> {
    db: &'a Database,
    publisher: &'a BusPublisher,
    queue: &'a DeliveryQueue,
}

impl<'a> CommunicationHub<'a> {
    pub fn new(db: &'a Database, publisher: &'a BusPublisher, queue: &'a DeliveryQueue) -> Self {
        Self { db, publisher, queue }
    }

    /// Persist → publish → route mentions → dispatch relevance
    /// evaluations (human senders only, excluding already-@mentioned
    /// agents).
    pub async fn send_channel_message(
        &self,
        channel_id: Id,
        content: &str,
        sender_agent: Option<Id>,
        sender_human: Option<&str>,
        message_type: MessageType,
        metadata: Option<serde_json::Value>,
    ) -> ApiResult<Message> {
        let message = MessageService::new(self.db)
            .create(channel_id, content, message_type, sender_agent, sender_human, metadata)
            .await?;

        self.publish_frame(&message).await;

        let channel = self.db.get_channel(channel_id).await?;
        let mentioned = self.route_mentions(channel_id, content, &message).await?;

        if sender_human.is_some() {
            self.dispatch_relevance_evaluations(
                channel_id,
                &message,
                sender_human,
                channel.channel_type == crate::db::models::ChannelType::Dm,
                &mentioned,
            )
            .await;
        }

        Ok(message)
    }

    pub async fn send_direct_message(
        &self,
        target_agent: Id,
        content: &str,
        sender_human: Option<&str>,
        sender_agent: Option<Id>,
    ) -> ApiResult<Message> {
        let channel_service = ChannelService::new(self.db);
        let human = sender_human.unwrap_or_default();
        let channel = channel_service.get_or_create_dm(target_agent, human).await?;

        let message = MessageService::new(self.db)
            .create(
                Id::from_uuid(channel.id),
                content,
                MessageType::Dm,
                sender_agent,
                sender_human,
                None,
            )
            .await?;

        self.publish_frame(&message).await;

        let payload = serde_json::json!({
            "id": message.id,
            "channel_id": message.channel_id,
            "content": message.content,
            "sender_user_identifier": message.sender_user_identifier,
        });
        if let Err(err) = self.queue.enqueue_dm(target_agent, payload).await {
            tracing::warn!(error = %err, "failed to enqueue dm delivery job");
        }

        Ok(message)
    }

    pub async fn send_system_message(&self, channel_id: Id, content: &str) -> ApiResult<Message> {
        let message = MessageService::new(self.db)
            .create(channel_id, content, MessageType::System, None, None, None)
            .await?;
        self.publish_frame(&message).await;
        Ok(message)
    }

    async fn publish_frame(&self, message: &Message) {
        let (sender_type, sender_id) = match (&message.sender_agent_id, &message.sender_user_identifier) {
            (Some(agent_id), None) => (SenderKind::Agent, Some(agent_id.to_string())),
            (None, Some(user)) => (SenderKind::User, Some(user.clone())),
            _ => (SenderKind::System, None),
        };

        let frame = OutboundFrame {
            frame_type: "message",
            id: Id::from_uuid(message.id),
            channel_id: Id::from_uuid(message.channel_id),
            sender_type,
            sender_id: sender_id.as_deref(),
            content: &message.content,
            message_type: message_type_str(message.message_type),
            created_at: message.created_at,
        };

        match serde_json::to_string(&frame) {
            Ok(payload) => {
                if let Err(err) = self.publisher.publish(Id::from_uuid(message.channel_id), &payload).await {
                    tracing::warn!(error = %err, "failed to publish outbound frame to bus");
                }
            }
            Err(err) => tracing::warn!(error = %err, "failed to serialize outbound frame"),
        }
    }

    /// Scans `content` for `@name` tokens and matches each against the
    /// channel's agent members using three case-insensitive
    /// normalizations of the agent's display name: as-is, spaces→hyphens,
    /// and spaces-and-hyphens→underscores. Returns the set of agents
    /// dispatched this way.
    async fn route_mentions(
        &self,
        channel_id: Id,
        content: &str,
        message: &Message,
    ) -> ApiResult<HashSet<Id>> {
        let mentioned_tokens: HashSet<String> = mention_pattern()
            .captures_iter(content)
            .map(|c| c[1].to_lowercase())
            .collect();

        if mentioned_tokens.is_empty() {
            return Ok(HashSet::new());
        }

        let members = self.db.channel_agent_members(channel_id).await?;
        let mut dispatched = HashSet::new();

        for (agent_id, name) in members {
            let lower = name.to_lowercase();
            let hyphenated = lower.replace(' ', "-");
            let underscored = lower.replace([' ', '-'], "_");

            let matched = mentioned_tokens.contains(&lower)
                || mentioned_tokens.contains(&hyphenated)
                || mentioned_tokens.contains(&underscored);

            if matched && dispatched.insert(agent_id) {
                let payload = serde_json::json!({
                    "id": message.id,
                    "channel_id": channel_id.as_uuid(),
                    "content": message.content,
                    "sender_user_identifier": message.sender_user_identifier,
                });
                if let Err(err) = self.queue.enqueue_dm(agent_id, payload).await {
                    tracing::warn!(error = %err, agent_id = %agent_id, "failed to enqueue mention delivery job");
                }
            }
        }

        Ok(dispatched)
    }

    async fn dispatch_relevance_evaluations(
        &self,
        channel_id: Id,
        message: &Message,
        sender_human: Option<&str>,
        is_dm: bool,
        exclude: &HashSet<Id>,
    ) {
        let members = match self.db.channel_agent_members(channel_id).await {
            Ok(members) => members,
            Err(err) => {
                tracing::warn!(error = %err, "failed to list channel agent members for relevance dispatch");
                return;
            }
        };

        for (agent_id, _name) in members {
            if exclude.contains(&agent_id) {
                continue;
            }
            if let Err(err) = self
                .queue
                .enqueue_evaluate_channel_message(
                    agent_id,
                    channel_id,
                    message.content.clone(),
                    Id::from_uuid(message.id),
                    sender_human.map(str::to_string),
                    is_dm,
                )
                .await
            {
                tracing::warn!(error = %err, agent_id = %agent_id, "failed to enqueue relevance evaluation job");
            }
        }
    }
}

fn message_type_str(message_type: MessageType) -> &'static str {
    match message_type {
        MessageType::Chat => "chat",
        MessageType::System => "system",
        MessageType::Dm => "dm",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names_matched(token: &str, display_name: &str) -> bool {
        let lower = display_name.to_lowercase();
        let hyphenated = lower.replace(' ', "-");
        let underscored = lower.replace([' ', '-'], "_");
        let token = token.to_lowercase();
        token == lower || token == hyphenated || token == underscored
    }

    #[test]
    fn mention_pattern_extracts_tokens() {
        let tokens: Vec<String> = mention_pattern()
            .captures_iter("Hey @ada and @bob-jr and @bob_jr")
            .map(|c| c[1].to_lowercase())
            .collect();
        assert_eq!(tokens, vec!["ada", "bob-jr", "bob_jr"]);
    }

    #[test]
    fn all_three_normalizations_collapse_to_one_agent() {
        assert!(names_matched("bob-jr", "Bob-Jr"));
        assert!(names_matched("bob_jr", "Bob-Jr"));
        assert!(names_matched("ada", "Ada"));
    }

    #[test]
    fn name_with_space_matches_hyphen_and_underscore_variants() {
        assert!(names_matched("bob-jr", "Bob Jr"));
        assert!(names_matched("bob_jr", "Bob Jr"));
    }
}
