//! Token usage tracking (supplement): per-agent, per-channel prompt and
//! completion token counters, written by the Communication Hub's delivery
//! call sites. Not on the critical path of any component -- a pure
//! append/sum API with no reconciliation of its own.

use crate::db::Database;
use crate::error::ApiResult;
use crate::ids::Id;

pub struct TokenService<'a> {
    db: &'a Database,
}

impl<'a> TokenService<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    pub async fn record(
        &self,
        agent_id: Id,
        channel_id: Option<Id>,
        prompt_tokens: i32,
        completion_tokens: i32,
    ) -> ApiResult<()> {
        self.db
            .record_token_usage(agent_id, channel_id, prompt_tokens, completion_tokens)
            .await
    }
}
