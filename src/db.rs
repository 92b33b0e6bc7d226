//! Durable Store (C1): the authoritative record of agents, channels,
//! members, messages, read cursors, the assignment graph, and activities.

pub mod models;
mod schema;

use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::config::Config;
use crate::error::ApiError;
use crate::ids::Id;
use crate::pagination::{peel_overflow, Cursor};
use models::{
    Activity, Agent, AgentStatus, Channel, ChannelMember, ChannelType, Integration, Message,
    MessageType, Project, ReadCursor, Secret, Skill, Task,
};

/// Sort column for agent listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentSortBy {
    CreatedAt,
    Name,
}

#[derive(Clone)]
pub struct Database {
    /// Pool used by request handlers. Kept separate from `background_pool`
    /// so a reconciler sweep or delivery-queue poll never starves inbound
    /// request traffic for a connection.
    pool: PgPool,
    background_pool: PgPool,
}

impl Database {
    pub async fn connect(config: &Config) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.db_max_connections)
            .test_before_acquire(true)
            .connect(&config.database_url)
            .await?;

        let background_pool = PgPoolOptions::new()
            .max_connections(config.db_background_max_connections)
            .test_before_acquire(true)
            .connect(&config.database_url)
            .await?;

        schema::migrate(&pool).await.map_err(|e| sqlx::Error::Migrate(Box::new(e)))?;

        Ok(Self {
            pool,
            background_pool,
        })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn background_pool(&self) -> &PgPool {
        &self.background_pool
    }

    /// `SELECT 1` against the request-handler pool, for `/system/health`.
    pub async fn ping(&self) -> bool {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .is_ok()
    }

    // ---- Agents ---------------------------------------------------------

    #[allow(clippy::too_many_arguments)]
    pub async fn create_agent(
        &self,
        name: &str,
        identity: &str,
        personality: &str,
        heartbeat_prompt: &str,
        heartbeat_period_seconds: i32,
        model_provider: &str,
        model_name: &str,
    ) -> Result<Agent, ApiError> {
        let id = Uuid::new_v4();
        sqlx::query_as::<_, Agent>(
            r"INSERT INTO agents
                (id, name, identity, personality, heartbeat_prompt,
                 heartbeat_period_seconds, model_provider, model_name, status)
              VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'creating')
              RETURNING *",
        )
        .bind(id)
        .bind(name)
        .bind(identity)
        .bind(personality)
        .bind(heartbeat_prompt)
        .bind(heartbeat_period_seconds)
        .bind(model_provider)
        .bind(model_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                ApiError::Conflict(format!("agent named '{name}' already exists"))
            }
            other => other.into(),
        })
    }

    pub async fn set_agent_handle_and_status(
        &self,
        id: Id,
        handle: Option<&str>,
        status: AgentStatus,
    ) -> Result<(), ApiError> {
        sqlx::query(
            "UPDATE agents SET worker_handle = $2, status = $3, updated_at = now() WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(handle)
        .bind(status)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn set_agent_status(&self, id: Id, status: AgentStatus) -> Result<(), ApiError> {
        sqlx::query("UPDATE agents SET status = $2, updated_at = now() WHERE id = $1")
            .bind(id.as_uuid())
            .bind(status)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Variant used from the background pool by the reconciler, which must
    /// never contend with request-handler traffic for a connection.
    pub async fn set_agent_status_bg(&self, id: Id, status: AgentStatus) -> Result<(), ApiError> {
        sqlx::query("UPDATE agents SET status = $2, updated_at = now() WHERE id = $1")
            .bind(id.as_uuid())
            .bind(status)
            .execute(&self.background_pool)
            .await?;
        Ok(())
    }

    /// Background-pool counterpart of `set_agent_handle_and_status`, used
    /// by the reconciler's recovery attempt to stamp a freshly launched
    /// handle without touching the request-handler pool.
    pub async fn set_agent_handle_and_status_bg(
        &self,
        id: Id,
        handle: Option<&str>,
        status: AgentStatus,
    ) -> Result<(), ApiError> {
        sqlx::query(
            "UPDATE agents SET worker_handle = $2, status = $3, updated_at = now() WHERE id = $1",
        )
        .bind(id.as_uuid())
        .bind(handle)
        .bind(status)
        .execute(&self.background_pool)
        .await?;
        Ok(())
    }

    pub async fn get_agent(&self, id: Id) -> Result<Agent, ApiError> {
        sqlx::query_as::<_, Agent>("SELECT * FROM agents WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("agent {id} not found")))
    }

    /// Background-pool read with a fresh snapshot, used by the reconciler's
    /// recovery attempt (step 3: "re-read agent").
    pub async fn get_agent_bg(&self, id: Id) -> Result<Agent, ApiError> {
        sqlx::query_as::<_, Agent>("SELECT * FROM agents WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.background_pool)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("agent {id} not found")))
    }

    pub async fn agents_by_status(&self, statuses: &[AgentStatus]) -> Result<Vec<Agent>, ApiError> {
        let statuses: Vec<AgentStatus> = statuses.to_vec();
        let agents = sqlx::query_as::<_, Agent>(
            "SELECT * FROM agents WHERE status = ANY($1) ORDER BY created_at",
        )
        .bind(statuses)
        .fetch_all(&self.background_pool)
        .await?;
        Ok(agents)
    }

    #[allow(clippy::fn_params_excessive_bools)]
    pub async fn list_agents(
        &self,
        page_size: i64,
        after: Option<Cursor>,
        status_filter: Option<AgentStatus>,
        sort_by: AgentSortBy,
        sort_desc: bool,
    ) -> Result<(Vec<Agent>, bool), ApiError> {
        // sqlx's compile-time query checking is unavailable without a live
        // database at build time, so this assembles via QueryBuilder rather
        // than `query!`, the same tradeoff the original makes with
        // SQLAlchemy's dynamic `select(...).where(...)` composition.
        let mut qb = sqlx::QueryBuilder::new("SELECT * FROM agents");
        let mut has_where = false;

        if let Some(status) = status_filter {
            qb.push(" WHERE status = ");
            qb.push_bind(status);
            has_where = true;
        }

        if let Some(cursor) = after {
            qb.push(if has_where { " AND (" } else { " WHERE (" });
            let (col, op) = match (sort_by, sort_desc) {
                (AgentSortBy::CreatedAt, false) => ("created_at", ">"),
                (AgentSortBy::CreatedAt, true) => ("created_at", "<"),
                (AgentSortBy::Name, false) => ("name", ">"),
                (AgentSortBy::Name, true) => ("name", "<"),
            };
            // column can't be bound as a parameter; it's drawn from a fixed
            // closed set above, never from caller input.
            qb.push(format!("{col} {op} "));
            match sort_by {
                AgentSortBy::CreatedAt => {
                    qb.push_bind(cursor.created_at);
                }
                AgentSortBy::Name => {
                    // name-sorted cursors still carry the created_at the row
                    // had at encode time; re-resolve the name via id instead.
                    qb.push("(SELECT name FROM agents WHERE id = ");
                    qb.push_bind(cursor.id.as_uuid());
                    qb.push(")");
                }
            }
            qb.push(format!(" OR ({col} = "));
            match sort_by {
                AgentSortBy::CreatedAt => {
                    qb.push_bind(cursor.created_at);
                }
                AgentSortBy::Name => {
                    qb.push("(SELECT name FROM agents WHERE id = ");
                    qb.push_bind(cursor.id.as_uuid());
                    qb.push(")");
                }
            }
            qb.push(format!(" AND id {op} "));
            qb.push_bind(cursor.id.as_uuid());
            qb.push("))");
        }

        let (order_col, order_dir) = match (sort_by, sort_desc) {
            (AgentSortBy::CreatedAt, false) => ("created_at", "ASC"),
            (AgentSortBy::CreatedAt, true) => ("created_at", "DESC"),
            (AgentSortBy::Name, false) => ("name", "ASC"),
            (AgentSortBy::Name, true) => ("name", "DESC"),
        };
        qb.push(format!(" ORDER BY {order_col} {order_dir}, id ASC LIMIT "));
        qb.push_bind(page_size + 1);

        let rows = qb.build_query_as::<Agent>().fetch_all(&self.pool).await?;
        let (agents, has_next) = peel_overflow(rows, page_size as usize);
        Ok((agents, has_next))
    }

    pub async fn update_agent_fields(
        &self,
        id: Id,
        identity: Option<&str>,
        personality: Option<&str>,
        memory: Option<&str>,
        heartbeat_period_seconds: Option<i32>,
        heartbeat_prompt: Option<&str>,
        heartbeat_enabled: Option<bool>,
        model_provider: Option<&str>,
        model_name: Option<&str>,
    ) -> Result<Agent, ApiError> {
        sqlx::query_as::<_, Agent>(
            r"UPDATE agents SET
                identity = COALESCE($2, identity),
                personality = COALESCE($3, personality),
                memory = COALESCE($4, memory),
                heartbeat_period_seconds = COALESCE($5, heartbeat_period_seconds),
                heartbeat_prompt = COALESCE($6, heartbeat_prompt),
                heartbeat_enabled = COALESCE($7, heartbeat_enabled),
                model_provider = COALESCE($8, model_provider),
                model_name = COALESCE($9, model_name),
                updated_at = now()
              WHERE id = $1
              RETURNING *",
        )
        .bind(id.as_uuid())
        .bind(identity)
        .bind(personality)
        .bind(memory)
        .bind(heartbeat_period_seconds)
        .bind(heartbeat_prompt)
        .bind(heartbeat_enabled)
        .bind(model_provider)
        .bind(model_name)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("agent {id} not found")))
    }

    pub async fn delete_agent(&self, id: Id) -> Result<(), ApiError> {
        sqlx::query("DELETE FROM agents WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ---- Channels ---------------------------------------------------------

    pub async fn create_channel(
        &self,
        name: &str,
        description: Option<&str>,
        channel_type: ChannelType,
        creator_user_identifier: Option<&str>,
        initial_agent_ids: &[Id],
    ) -> Result<Channel, ApiError> {
        let mut tx = self.pool.begin().await?;

        let id = Uuid::new_v4();
        let channel = sqlx::query_as::<_, Channel>(
            r"INSERT INTO channels (id, name, description, channel_type, creator_user_identifier)
              VALUES ($1, $2, $3, $4, $5) RETURNING *",
        )
        .bind(id)
        .bind(name)
        .bind(description)
        .bind(channel_type)
        .bind(creator_user_identifier)
        .fetch_one(&mut *tx)
        .await?;

        for agent_id in initial_agent_ids {
            sqlx::query(
                "INSERT INTO channel_members (id, channel_id, agent_id) VALUES ($1, $2, $3)",
            )
            .bind(Uuid::new_v4())
            .bind(id)
            .bind(agent_id.as_uuid())
            .execute(&mut *tx)
            .await?;
        }

        if let Some(user) = creator_user_identifier {
            sqlx::query(
                "INSERT INTO channel_members (id, channel_id, user_identifier) VALUES ($1, $2, $3)",
            )
            .bind(Uuid::new_v4())
            .bind(id)
            .bind(user)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(channel)
    }

    pub async fn get_channel(&self, id: Id) -> Result<Channel, ApiError> {
        sqlx::query_as::<_, Channel>("SELECT * FROM channels WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("channel {id} not found")))
    }

    /// Looks up a `dm` channel whose member set contains both the agent and
    /// the human, via two-way intersection over membership (never by name).
    pub async fn find_dm_channel(
        &self,
        agent_id: Id,
        user_identifier: &str,
    ) -> Result<Option<Channel>, ApiError> {
        let channel = sqlx::query_as::<_, Channel>(
            r"SELECT c.* FROM channels c
              WHERE c.channel_type = 'dm'
                AND c.id IN (SELECT channel_id FROM channel_members WHERE agent_id = $1)
                AND c.id IN (SELECT channel_id FROM channel_members WHERE user_identifier = $2)
              LIMIT 1",
        )
        .bind(agent_id.as_uuid())
        .bind(user_identifier)
        .fetch_optional(&self.pool)
        .await?;
        Ok(channel)
    }

    pub async fn list_channels(
        &self,
        agent_id: Option<Id>,
        user_identifier: Option<&str>,
    ) -> Result<Vec<Channel>, ApiError> {
        let channels = if let Some(agent_id) = agent_id {
            sqlx::query_as::<_, Channel>(
                r"SELECT c.* FROM channels c
                  JOIN channel_members m ON m.channel_id = c.id
                  WHERE m.agent_id = $1 ORDER BY c.created_at ASC",
            )
            .bind(agent_id.as_uuid())
            .fetch_all(&self.pool)
            .await?
        } else if let Some(user) = user_identifier {
            sqlx::query_as::<_, Channel>(
                r"SELECT c.* FROM channels c
                  JOIN channel_members m ON m.channel_id = c.id
                  WHERE m.user_identifier = $1 ORDER BY c.created_at ASC",
            )
            .bind(user)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query_as::<_, Channel>("SELECT * FROM channels ORDER BY created_at ASC")
                .fetch_all(&self.pool)
                .await?
        };
        Ok(channels)
    }

    pub async fn add_member(
        &self,
        channel_id: Id,
        agent_id: Option<Id>,
        user_identifier: Option<&str>,
    ) -> Result<ChannelMember, ApiError> {
        let id = Uuid::new_v4();
        sqlx::query_as::<_, ChannelMember>(
            "INSERT INTO channel_members (id, channel_id, agent_id, user_identifier)
             VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(id)
        .bind(channel_id.as_uuid())
        .bind(agent_id.map(Id::as_uuid))
        .bind(user_identifier)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                ApiError::Conflict("member already exists in this channel".to_string())
            }
            other => other.into(),
        })
    }

    pub async fn remove_member(
        &self,
        channel_id: Id,
        agent_id: Option<Id>,
        user_identifier: Option<&str>,
    ) -> Result<(), ApiError> {
        let result = sqlx::query(
            r"DELETE FROM channel_members
              WHERE channel_id = $1
                AND ($2::uuid IS NULL OR agent_id = $2)
                AND ($3::text IS NULL OR user_identifier = $3)",
        )
        .bind(channel_id.as_uuid())
        .bind(agent_id.map(Id::as_uuid))
        .bind(user_identifier)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("member not found in this channel".to_string()));
        }
        Ok(())
    }

    pub async fn list_members(&self, channel_id: Id) -> Result<Vec<ChannelMember>, ApiError> {
        let members = sqlx::query_as::<_, ChannelMember>(
            "SELECT * FROM channel_members WHERE channel_id = $1",
        )
        .bind(channel_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        Ok(members)
    }

    /// Agent members only, excluding humans -- used by @mention routing.
    pub async fn channel_agent_members(
        &self,
        channel_id: Id,
    ) -> Result<Vec<(Id, String)>, ApiError> {
        let rows: Vec<(Uuid, String)> = sqlx::query_as(
            r"SELECT a.id, a.name FROM agents a
              JOIN channel_members m ON m.agent_id = a.id
              WHERE m.channel_id = $1",
        )
        .bind(channel_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id, name)| (Id::from_uuid(id), name)).collect())
    }

    // ---- Messages ---------------------------------------------------------

    pub async fn create_message(
        &self,
        channel_id: Id,
        sender_agent_id: Option<Id>,
        sender_user_identifier: Option<&str>,
        content: &str,
        message_type: MessageType,
        metadata: Option<serde_json::Value>,
    ) -> Result<Message, ApiError> {
        let id = Uuid::new_v4();
        let message = sqlx::query_as::<_, Message>(
            r"INSERT INTO messages
                (id, channel_id, sender_agent_id, sender_user_identifier, content, message_type, metadata)
              VALUES ($1, $2, $3, $4, $5, $6, $7)
              RETURNING *",
        )
        .bind(id)
        .bind(channel_id.as_uuid())
        .bind(sender_agent_id.map(Id::as_uuid))
        .bind(sender_user_identifier)
        .bind(content)
        .bind(message_type)
        .bind(metadata)
        .fetch_one(&self.pool)
        .await?;
        Ok(message)
    }

    /// Newest-first page. `before` is the caller's opaque cursor from a
    /// previous page; reads `page_size + 1` rows to compute `has_next`.
    pub async fn message_history(
        &self,
        channel_id: Id,
        page_size: i64,
        before: Option<Cursor>,
    ) -> Result<(Vec<Message>, bool), ApiError> {
        let rows = if let Some(cursor) = before {
            sqlx::query_as::<_, Message>(
                r"SELECT * FROM messages
                  WHERE channel_id = $1
                    AND (created_at < $2 OR (created_at = $2 AND id < $3))
                  ORDER BY created_at DESC, id DESC
                  LIMIT $4",
            )
            .bind(channel_id.as_uuid())
            .bind(cursor.created_at)
            .bind(cursor.id.as_uuid())
            .bind(page_size + 1)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query_as::<_, Message>(
                r"SELECT * FROM messages WHERE channel_id = $1
                  ORDER BY created_at DESC, id DESC LIMIT $2",
            )
            .bind(channel_id.as_uuid())
            .bind(page_size + 1)
            .fetch_all(&self.pool)
            .await?
        };
        let (messages, has_next) = peel_overflow(rows, page_size as usize);
        Ok((messages, has_next))
    }

    pub async fn get_read_cursor(
        &self,
        channel_id: Id,
        agent_id: Option<Id>,
        user_identifier: Option<&str>,
    ) -> Result<Option<ReadCursor>, ApiError> {
        let cursor = sqlx::query_as::<_, ReadCursor>(
            r"SELECT * FROM read_cursors
              WHERE channel_id = $1
                AND ($2::uuid IS NULL OR agent_id = $2)
                AND ($3::text IS NULL OR user_identifier = $3)",
        )
        .bind(channel_id.as_uuid())
        .bind(agent_id.map(Id::as_uuid))
        .bind(user_identifier)
        .fetch_optional(&self.pool)
        .await?;
        Ok(cursor)
    }

    /// Upserts the read cursor, stamping it with the target message's own
    /// `created_at` rather than wall-clock time. Never regresses: compared
    /// in message order `(created_at, id)`, a call naming a message at or
    /// before the stored cursor's position is a no-op and the existing row
    /// is returned unchanged.
    pub async fn update_read_cursor(
        &self,
        channel_id: Id,
        agent_id: Option<Id>,
        user_identifier: Option<&str>,
        last_read_message_id: Id,
    ) -> Result<ReadCursor, ApiError> {
        let mut tx = self.pool.begin().await?;

        let target: Option<(DateTime<Utc>,)> = sqlx::query_as(
            "SELECT created_at FROM messages WHERE id = $1 AND channel_id = $2",
        )
        .bind(last_read_message_id.as_uuid())
        .bind(channel_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?;
        let (last_read_at,) = target.ok_or_else(|| {
            ApiError::NotFound(format!("message {last_read_message_id} not in channel {channel_id}"))
        })?;

        let existing = sqlx::query_as::<_, ReadCursor>(
            r"SELECT * FROM read_cursors
              WHERE channel_id = $1
                AND ($2::uuid IS NULL OR agent_id = $2)
                AND ($3::text IS NULL OR user_identifier = $3)
              FOR UPDATE",
        )
        .bind(channel_id.as_uuid())
        .bind(agent_id.map(Id::as_uuid))
        .bind(user_identifier)
        .fetch_optional(&mut *tx)
        .await?;

        let result = if let Some(existing) = existing {
            if (last_read_at, last_read_message_id.as_uuid()) <= (existing.last_read_at, existing.last_read_message_id) {
                existing
            } else {
                sqlx::query_as::<_, ReadCursor>(
                    r"UPDATE read_cursors SET last_read_message_id = $2, last_read_at = $3
                      WHERE id = $1 RETURNING *",
                )
                .bind(existing.id)
                .bind(last_read_message_id.as_uuid())
                .bind(last_read_at)
                .fetch_one(&mut *tx)
                .await?
            }
        } else {
            sqlx::query_as::<_, ReadCursor>(
                r"INSERT INTO read_cursors
                    (id, channel_id, agent_id, user_identifier, last_read_message_id, last_read_at)
                  VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
            )
            .bind(Uuid::new_v4())
            .bind(channel_id.as_uuid())
            .bind(agent_id.map(Id::as_uuid))
            .bind(user_identifier)
            .bind(last_read_message_id.as_uuid())
            .bind(last_read_at)
            .fetch_one(&mut *tx)
            .await?
        };

        tx.commit().await?;
        Ok(result)
    }

    pub async fn unread_count(
        &self,
        channel_id: Id,
        agent_id: Option<Id>,
        user_identifier: Option<&str>,
    ) -> Result<i64, ApiError> {
        let cursor = self.get_read_cursor(channel_id, agent_id, user_identifier).await?;
        let count: i64 = match cursor {
            Some(c) => {
                sqlx::query_scalar(
                    "SELECT COUNT(*) FROM messages WHERE channel_id = $1 AND created_at > $2",
                )
                .bind(channel_id.as_uuid())
                .bind(c.last_read_at)
                .fetch_one(&self.pool)
                .await?
            }
            None => {
                sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE channel_id = $1")
                    .bind(channel_id.as_uuid())
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        Ok(count)
    }

    pub async fn unread_messages(
        &self,
        channel_id: Id,
        agent_id: Option<Id>,
        user_identifier: Option<&str>,
    ) -> Result<Vec<Message>, ApiError> {
        let cursor = self.get_read_cursor(channel_id, agent_id, user_identifier).await?;
        let messages = match cursor {
            Some(c) => {
                sqlx::query_as::<_, Message>(
                    r"SELECT * FROM messages WHERE channel_id = $1 AND created_at > $2
                      ORDER BY created_at ASC, id ASC",
                )
                .bind(channel_id.as_uuid())
                .bind(c.last_read_at)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Message>(
                    "SELECT * FROM messages WHERE channel_id = $1 ORDER BY created_at ASC, id ASC",
                )
                .bind(channel_id.as_uuid())
                .fetch_all(&self.pool)
                .await?
            }
        };
        Ok(messages)
    }

    // ---- Activity log (supplement) ---------------------------------------

    pub async fn log_activity(
        &self,
        agent_id: Option<Id>,
        event_kind: &str,
        summary: &str,
        details: Option<serde_json::Value>,
    ) -> Result<Activity, ApiError> {
        let activity = sqlx::query_as::<_, Activity>(
            r"INSERT INTO activities (id, agent_id, event_kind, summary, details)
              VALUES ($1, $2, $3, $4, $5) RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(agent_id.map(Id::as_uuid))
        .bind(event_kind)
        .bind(summary)
        .bind(details)
        .fetch_one(&self.pool)
        .await?;
        Ok(activity)
    }

    // ---- Token usage (supplement) ------------------------------------------

    pub async fn record_token_usage(
        &self,
        agent_id: Id,
        channel_id: Option<Id>,
        prompt_tokens: i32,
        completion_tokens: i32,
    ) -> Result<(), ApiError> {
        sqlx::query(
            r"INSERT INTO token_usage (id, agent_id, channel_id, prompt_tokens, completion_tokens)
              VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(Uuid::new_v4())
        .bind(agent_id.as_uuid())
        .bind(channel_id.map(Id::as_uuid))
        .bind(prompt_tokens)
        .bind(completion_tokens)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ---- Boot-config assembly reads ---------------------------------------

    pub async fn all_secrets(&self) -> Result<Vec<Secret>, ApiError> {
        Ok(sqlx::query_as::<_, Secret>("SELECT * FROM secrets").fetch_all(&self.pool).await?)
    }

    pub async fn active_ai_provider_integrations(&self) -> Result<Vec<Integration>, ApiError> {
        Ok(sqlx::query_as::<_, Integration>(
            "SELECT * FROM integrations WHERE integration_type = 'ai_provider' AND is_active",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn active_skills(&self) -> Result<Vec<Skill>, ApiError> {
        Ok(sqlx::query_as::<_, Skill>("SELECT * FROM skills WHERE is_active")
            .fetch_all(&self.pool)
            .await?)
    }

    pub async fn agent_active_projects(&self, agent_id: Id) -> Result<Vec<Project>, ApiError> {
        Ok(sqlx::query_as::<_, Project>(
            r"SELECT p.* FROM projects p
              JOIN agent_project_assignments a ON a.project_id = p.id
              WHERE a.agent_id = $1 AND p.is_active",
        )
        .bind(agent_id.as_uuid())
        .fetch_all(&self.pool)
        .await?)
    }

    pub async fn agent_tasks(&self, agent_id: Id) -> Result<Vec<Task>, ApiError> {
        Ok(sqlx::query_as::<_, Task>(
            r"SELECT t.* FROM tasks t
              JOIN agent_task_assignments a ON a.task_id = t.id
              WHERE a.agent_id = $1",
        )
        .bind(agent_id.as_uuid())
        .fetch_all(&self.pool)
        .await?)
    }
}
