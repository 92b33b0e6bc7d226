//! Pub/Sub Bus Adapter (C3): topic-based broadcast over Redis, with the
//! publisher and subscriber held as two logically distinct connections --
//! a subscribed connection cannot serve regular commands.

use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::error::ApiError;
use crate::ids::Id;

pub fn channel_topic(channel_id: Id) -> String {
    format!("ws:channel:{channel_id}")
}

/// Publisher side: cloneable, safe for concurrent use from request
/// handlers. Every operation is non-blocking.
#[derive(Clone)]
pub struct BusPublisher {
    conn: ConnectionManager,
}

impl BusPublisher {
    pub async fn connect(redis_url: &str) -> Result<Self, ApiError> {
        let client = redis::Client::open(redis_url).map_err(ApiError::from)?;
        let conn = client.get_connection_manager().await.map_err(ApiError::from)?;
        Ok(Self { conn })
    }

    /// Fire-and-forget: no delivery guarantee beyond best-effort bus
    /// semantics. `payload` is the already-serialized outbound frame.
    pub async fn publish(&self, channel_id: Id, payload: &str) -> Result<(), ApiError> {
        let mut conn = self.conn.clone();
        let topic = channel_topic(channel_id);
        let _: i64 = conn.publish(topic, payload).await.map_err(ApiError::from)?;
        Ok(())
    }

    pub async fn ping(&self) -> bool {
        let mut conn = self.conn.clone();
        redis::cmd("PING").query_async::<_, String>(&mut conn).await.is_ok()
    }
}

/// Subscriber side: a dedicated connection owned solely by the Pub/Sub
/// Listener, pattern-subscribed to `ws:channel:*`. Never shared.
pub struct BusSubscriber {
    client: redis::Client,
}

impl BusSubscriber {
    pub fn new(redis_url: &str) -> Result<Self, ApiError> {
        let client = redis::Client::open(redis_url).map_err(ApiError::from)?;
        Ok(Self { client })
    }

    pub async fn pattern_subscribe(
        &self,
        pattern: &str,
    ) -> Result<redis::aio::PubSub, ApiError> {
        let conn = self.client.get_async_connection().await.map_err(ApiError::from)?;
        let mut pubsub = conn.into_pubsub();
        pubsub.psubscribe(pattern).await.map_err(ApiError::from)?;
        Ok(pubsub)
    }
}
