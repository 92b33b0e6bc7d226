//! Provider credential registry used to validate an agent's model provider
//! has configured credentials before create/update.

use std::collections::HashMap;

pub struct ProviderRegistration {
    /// Environment-variable-shaped key the credential is stored under, and
    /// pushed into the boot-config bundle's `secrets` map. `None` means the
    /// provider needs no credential (e.g. a local Ollama install).
    pub env_key: Option<&'static str>,
}

pub fn lookup(provider: &str) -> Option<ProviderRegistration> {
    match provider {
        "anthropic" => Some(ProviderRegistration {
            env_key: Some("ANTHROPIC_API_KEY"),
        }),
        "openai" => Some(ProviderRegistration {
            env_key: Some("OPENAI_API_KEY"),
        }),
        "glm" => Some(ProviderRegistration {
            env_key: Some("GLM_API_KEY"),
        }),
        "ollama" => Some(ProviderRegistration { env_key: None }),
        _ => None,
    }
}

/// `true` iff the provider is known and, when it requires a credential,
/// that credential is present in the assembled secrets map.
pub fn validate_provider_configured(provider: &str, secrets: &HashMap<String, String>) -> bool {
    match lookup(provider) {
        None => false,
        Some(registration) => match registration.env_key {
            None => true,
            Some(key) => secrets.contains_key(key),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_provider_is_never_configured() {
        assert!(!validate_provider_configured("made-up", &HashMap::new()));
    }

    #[test]
    fn ollama_needs_no_credential() {
        assert!(validate_provider_configured("ollama", &HashMap::new()));
    }

    #[test]
    fn anthropic_requires_its_key() {
        let mut secrets = HashMap::new();
        assert!(!validate_provider_configured("anthropic", &secrets));
        secrets.insert("ANTHROPIC_API_KEY".to_string(), "sk-test".to_string());
        assert!(validate_provider_configured("anthropic", &secrets));
    }
}
