//! Message Service (C5): persist messages, paginated history, read-cursor
//! upsert, unread enumeration.

use crate::db::models::{Message, MessageType};
use crate::db::Database;
use crate::error::{ApiError, ApiResult};
use crate::ids::Id;
use crate::pagination::Cursor;

pub const MAX_PAGE_SIZE: i64 = 200;

pub struct MessageService<'a> {
    db: &'a Database,
}

impl<'a> MessageService<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        &self,
        channel_id: Id,
        content: &str,
        message_type: MessageType,
        sender_agent: Option<Id>,
        sender_human: Option<&str>,
        metadata: Option<serde_json::Value>,
    ) -> ApiResult<Message> {
        if sender_agent.is_some() && sender_human.is_some() {
            return Err(ApiError::Validation(
                "message may not have both an agent and a human sender".to_string(),
            ));
        }
        if matches!(message_type, MessageType::Chat | MessageType::Dm)
            && sender_agent.is_none()
            && sender_human.is_none()
        {
            return Err(ApiError::Validation(
                "chat and dm messages require a sender".to_string(),
            ));
        }

        self.db
            .create_message(channel_id, sender_agent, sender_human, content, message_type, metadata)
            .await
    }

    pub async fn history(
        &self,
        channel_id: Id,
        page_size: i64,
        before_cursor: Option<&str>,
    ) -> ApiResult<(Vec<Message>, bool)> {
        if !(1..=MAX_PAGE_SIZE).contains(&page_size) {
            return Err(ApiError::Validation(format!(
                "page_size must be between 1 and {MAX_PAGE_SIZE}"
            )));
        }
        let cursor = before_cursor.map(Cursor::decode).transpose()?;
        self.db.message_history(channel_id, page_size, cursor).await
    }

    pub async fn update_read_cursor(
        &self,
        channel_id: Id,
        last_read_message_id: Id,
        agent_id: Option<Id>,
        user_identifier: Option<&str>,
    ) -> ApiResult<()> {
        let identifier_count = [agent_id.is_some(), user_identifier.is_some()]
            .into_iter()
            .filter(|b| *b)
            .count();
        if identifier_count != 1 {
            return Err(ApiError::Validation(
                "update_read_cursor requires exactly one of agent_id or user_identifier".to_string(),
            ));
        }

        self.db
            .update_read_cursor(channel_id, agent_id, user_identifier, last_read_message_id)
            .await?;
        Ok(())
    }

    pub async fn unread_count(
        &self,
        channel_id: Id,
        agent_id: Option<Id>,
        user_identifier: Option<&str>,
    ) -> ApiResult<i64> {
        self.db.unread_count(channel_id, agent_id, user_identifier).await
    }

    pub async fn unread_messages(
        &self,
        channel_id: Id,
        agent_id: Option<Id>,
        user_identifier: Option<&str>,
    ) -> ApiResult<Vec<Message>> {
        self.db.unread_messages(channel_id, agent_id, user_identifier).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_size_bounds_reject_out_of_range() {
        assert!(!(1..=MAX_PAGE_SIZE).contains(&0));
        assert!(!(1..=MAX_PAGE_SIZE).contains(&201));
        assert!((1..=MAX_PAGE_SIZE).contains(&200));
    }
}
