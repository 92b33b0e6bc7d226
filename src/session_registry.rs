//! Session Registry (C7): in-process per-channel map of live session
//! handles, with dead-session eviction on send failure.
//!
//! Grounded on the teacher's `runtime::RuntimeManager`
//! (`RwLock<HashMap<String, ConversationHandle>>` holding one
//! `broadcast::Sender` per conversation): generalized into a
//! channel-sharded `DashMap<ChannelId, DashMap<ClientId, SessionHandle>>`
//! so lock contention is bounded per channel rather than global.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::mpsc;

use crate::ids::Id;

/// Bounded timeout past which a slow consumer is treated as dead, per the
/// "broadcast must be resilient to slow consumers" requirement.
const SEND_TIMEOUT: Duration = Duration::from_millis(200);

#[derive(Clone)]
pub struct SessionHandle {
    sender: mpsc::Sender<String>,
}

impl SessionHandle {
    pub fn new(sender: mpsc::Sender<String>) -> Self {
        Self { sender }
    }
}

#[derive(Default)]
pub struct SessionRegistry {
    channels: DashMap<Id, DashMap<String, SessionHandle>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&self, channel_id: Id, client_id: String, handle: SessionHandle) {
        self.channels.entry(channel_id).or_default().insert(client_id, handle);
    }

    /// Removes the client and deallocates the channel's bucket if it is now
    /// empty.
    pub fn detach(&self, channel_id: Id, client_id: &str) {
        if let Some(bucket) = self.channels.get(&channel_id) {
            bucket.remove(client_id);
            let is_empty = bucket.is_empty();
            drop(bucket);
            if is_empty {
                self.channels.remove(channel_id);
            }
        }
    }

    pub fn client_count(&self, channel_id: Id) -> usize {
        self.channels.get(&channel_id).map_or(0, |b| b.len())
    }

    /// Iterates members (order unspecified). A member whose send exceeds
    /// `SEND_TIMEOUT`, or whose channel is closed, is evicted -- never held
    /// while an outbound write is attempted on another member.
    pub async fn broadcast(&self, channel_id: Id, frame: &str, except_client: Option<&str>) {
        let Some(bucket) = self.channels.get(&channel_id) else {
            return;
        };
        let targets: Vec<(String, SessionHandle)> = bucket
            .iter()
            .filter(|entry| except_client != Some(entry.key().as_str()))
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        drop(bucket);

        let mut dead = Vec::new();
        for (client_id, handle) in targets {
            let sent = tokio::time::timeout(SEND_TIMEOUT, handle.sender.send(frame.to_string())).await;
            match sent {
                Ok(Ok(())) => {}
                Ok(Err(_)) | Err(_) => dead.push(client_id),
            }
        }

        for client_id in dead {
            self.detach(channel_id, &client_id);
        }
    }
}

pub type SharedSessionRegistry = Arc<SessionRegistry>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn attach_then_broadcast_delivers_to_receiver() {
        let registry = SessionRegistry::new();
        let channel = Id::new();
        let (tx, mut rx) = mpsc::channel(4);
        registry.attach(channel, "c1".to_string(), SessionHandle::new(tx));

        registry.broadcast(channel, "hello", None).await;

        assert_eq!(rx.recv().await, Some("hello".to_string()));
    }

    #[tokio::test]
    async fn broadcast_excludes_the_named_client() {
        let registry = SessionRegistry::new();
        let channel = Id::new();
        let (tx1, mut rx1) = mpsc::channel(4);
        let (tx2, mut rx2) = mpsc::channel(4);
        registry.attach(channel, "sender".to_string(), SessionHandle::new(tx1));
        registry.attach(channel, "other".to_string(), SessionHandle::new(tx2));

        registry.broadcast(channel, "hi", Some("sender")).await;

        assert!(rx1.try_recv().is_err());
        assert_eq!(rx2.recv().await, Some("hi".to_string()));
    }

    #[tokio::test]
    async fn detach_empties_the_channel_bucket() {
        let registry = SessionRegistry::new();
        let channel = Id::new();
        let (tx, _rx) = mpsc::channel(4);
        registry.attach(channel, "c1".to_string(), SessionHandle::new(tx));
        assert_eq!(registry.client_count(channel), 1);

        registry.detach(channel, "c1");
        assert_eq!(registry.client_count(channel), 0);
    }

    #[tokio::test]
    async fn send_to_dropped_receiver_evicts_the_client() {
        let registry = SessionRegistry::new();
        let channel = Id::new();
        let (tx, rx) = mpsc::channel(4);
        drop(rx);
        registry.attach(channel, "c1".to_string(), SessionHandle::new(tx));

        registry.broadcast(channel, "hi", None).await;

        assert_eq!(registry.client_count(channel), 0);
    }
}
