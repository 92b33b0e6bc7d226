//! Business-logic services sitting between the HTTP layer and the Durable
//! Store / adapters.

pub mod agent_service;
pub mod channel_service;
pub mod message_service;
pub mod model_provider;
pub mod token_service;

/// Assembles the effective secrets map: the `secrets` table overridden by
/// active AI-provider integrations, converting each provider's environment
/// variable name into the map key. Shared by Agent Service's credential
/// validation and the Boot-Config Provider's bundle assembly.
pub async fn assemble_secrets(
    db: &crate::db::Database,
) -> crate::error::ApiResult<std::collections::HashMap<String, String>> {
    let mut secrets: std::collections::HashMap<String, String> = db
        .all_secrets()
        .await?
        .into_iter()
        .map(|s| (s.key, s.value))
        .collect();

    for integration in db.active_ai_provider_integrations().await? {
        let config: serde_json::Value = integration.config;
        let Some(provider_name) = config.get("provider").and_then(|v| v.as_str()) else {
            continue;
        };
        let Some(api_key) = config.get("api_key").and_then(|v| v.as_str()) else {
            continue;
        };
        let Some(registration) = model_provider::lookup(provider_name) else {
            continue;
        };
        if let Some(env_key) = registration.env_key {
            secrets.insert(env_key.to_string(), api_key.to_string());
        }
    }

    Ok(secrets)
}
