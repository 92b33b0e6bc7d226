//! Pub/Sub Listener (C8): bridges the bus subscription (C3) to the Session
//! Registry's fan-out (C7), one topic per channel.

use std::sync::Arc;

use futures::StreamExt;

use crate::bus::BusSubscriber;
use crate::ids::Id;
use crate::session_registry::SessionRegistry;

const PATTERN: &str = "ws:channel:*";

/// Runs until `shutdown` resolves. On shutdown, the dedicated subscriber
/// connection drops with the task, which unsubscribes and closes it.
pub async fn run(
    subscriber: BusSubscriber,
    registry: Arc<SessionRegistry>,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let mut pubsub = match subscriber.pattern_subscribe(PATTERN).await {
        Ok(pubsub) => pubsub,
        Err(err) => {
            tracing::error!(error = %err, "pub/sub listener failed to subscribe, exiting");
            return;
        }
    };

    let mut stream = pubsub.on_message();
    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                tracing::info!("pub/sub listener shutting down");
                break;
            }
            msg = stream.next() => {
                let Some(msg) = msg else { break };
                handle_message(&registry, &msg).await;
            }
        }
    }
}

async fn handle_message(registry: &Arc<SessionRegistry>, msg: &redis::Msg) {
    let topic: String = match msg.get_channel() {
        Ok(topic) => topic,
        Err(err) => {
            tracing::warn!(error = %err, "dropping pub/sub message with unreadable topic");
            return;
        }
    };

    let Some(suffix) = topic.strip_prefix("ws:channel:") else {
        tracing::warn!(topic, "dropping pub/sub message on unexpected topic");
        return;
    };

    let Ok(channel_id) = suffix.parse::<Id>() else {
        tracing::warn!(topic, "dropping pub/sub message with unparseable channel id");
        return;
    };

    let payload: String = match msg.get_payload() {
        Ok(payload) => payload,
        Err(err) => {
            tracing::warn!(error = %err, "dropping pub/sub message with unreadable payload");
            return;
        }
    };

    // A handler panic here must not take the listener down with it; the
    // registry's broadcast never panics on delivery failure (it evicts
    // instead), so this is a defensive boundary rather than a routine path.
    registry.broadcast(channel_id, &payload, None).await;
}
