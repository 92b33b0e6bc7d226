//! Boot-Config Provider (C12): assembles the one-shot startup bundle a
//! worker fetches exactly once at launch -- identity, model settings,
//! current memory, assembled secrets, active skill summaries, active
//! project assignments, and assigned tasks.

use serde::Serialize;

use crate::db::Database;
use crate::error::ApiResult;
use crate::ids::Id;
use crate::services;

const DIRECTIVE_PREVIEW_LEN: usize = 200;

#[derive(Serialize)]
pub struct BootConfig {
    pub agent_id: Id,
    pub name: String,
    pub identity: String,
    pub personality: String,
    pub model_provider: String,
    pub model_name: String,
    pub heartbeat_prompt: String,
    pub heartbeat_period_seconds: i32,
    pub heartbeat_enabled: bool,
    pub memory: String,
    pub secrets: std::collections::HashMap<String, String>,
    pub skills: Vec<SkillSummary>,
    pub projects: Vec<ProjectAssignment>,
    pub tasks: Vec<TaskAssignment>,
}

#[derive(Serialize)]
pub struct SkillSummary {
    pub name: String,
    pub description: String,
}

#[derive(Serialize)]
pub struct ProjectAssignment {
    pub project_id: Id,
    pub name: String,
    pub goals: String,
    pub specs: String,
    pub role_prompt: String,
    pub workspace_path: String,
    pub notes: Option<String>,
    pub channel_id: Option<Id>,
}

#[derive(Serialize)]
pub struct TaskAssignment {
    pub task_id: Id,
    pub name: String,
    pub status: String,
    pub directive_preview: String,
    pub channel_id: Option<Id>,
}

/// Truncates to at most `DIRECTIVE_PREVIEW_LEN` bytes on a `char`
/// boundary, so a task's full directive never leaks into the boot bundle.
fn directive_preview(directive: &str) -> String {
    if directive.len() <= DIRECTIVE_PREVIEW_LEN {
        return directive.to_string();
    }
    let mut end = DIRECTIVE_PREVIEW_LEN;
    while !directive.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &directive[..end])
}

pub async fn assemble(db: &Database, agent_id: Id) -> ApiResult<BootConfig> {
    let agent = db.get_agent(agent_id).await?;
    let secrets = services::assemble_secrets(db).await?;

    let skills = db
        .active_skills()
        .await?
        .into_iter()
        .map(|s| SkillSummary {
            name: s.name,
            description: s.description,
        })
        .collect();

    let projects = db
        .agent_active_projects(agent_id)
        .await?
        .into_iter()
        .map(|p| ProjectAssignment {
            project_id: Id::from_uuid(p.id),
            name: p.name,
            goals: p.goals,
            specs: p.specs,
            role_prompt: p.role_prompt,
            workspace_path: p.workspace_path,
            notes: p.notes,
            channel_id: p.channel_id.map(Id::from_uuid),
        })
        .collect();

    let tasks = db
        .agent_tasks(agent_id)
        .await?
        .into_iter()
        .map(|t| TaskAssignment {
            task_id: Id::from_uuid(t.id),
            name: t.name,
            status: t.status,
            directive_preview: directive_preview(&t.directive),
            channel_id: t.channel_id.map(Id::from_uuid),
        })
        .collect();

    Ok(BootConfig {
        agent_id: Id::from_uuid(agent.id),
        name: agent.name,
        identity: agent.identity,
        personality: agent.personality,
        model_provider: agent.model_provider,
        model_name: agent.model_name,
        heartbeat_prompt: agent.heartbeat_prompt,
        heartbeat_period_seconds: agent.heartbeat_period_seconds,
        heartbeat_enabled: agent.heartbeat_enabled,
        memory: agent.memory,
        secrets,
        skills,
        projects,
        tasks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_directive_is_returned_unchanged() {
        assert_eq!(directive_preview("do the thing"), "do the thing");
    }

    #[test]
    fn long_directive_is_truncated_with_ellipsis() {
        let directive = "x".repeat(500);
        let preview = directive_preview(&directive);
        assert!(preview.len() <= DIRECTIVE_PREVIEW_LEN + 3);
        assert!(preview.ends_with("..."));
    }
}
