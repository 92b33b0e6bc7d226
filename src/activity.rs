//! Activity logging (ambient supplement): a fire-and-forget wrapper so
//! call sites never have to handle a logging failure -- it's swallowed
//! and warned, never propagated.

use crate::db::models::Activity;
use crate::db::Database;
use crate::ids::Id;

pub async fn log(
    db: &Database,
    agent_id: Option<Id>,
    event_kind: &str,
    summary: &str,
    details: Option<serde_json::Value>,
) -> Option<Activity> {
    match db.log_activity(agent_id, event_kind, summary, details).await {
        Ok(activity) => Some(activity),
        Err(err) => {
            tracing::warn!(agent_id = ?agent_id, event_kind, error = %err, "failed to log activity");
            None
        }
    }
}
