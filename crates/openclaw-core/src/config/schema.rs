//! Configuration schema for the cron subsystem.
//!
//! JSON on disk uses **camelCase** keys; Rust uses snake_case, handled via
//! `#[serde(rename_all = "camelCase")]`, the same idiom the teacher's config
//! schema uses throughout.

use serde::{Deserialize, Serialize};

/// Root configuration — loaded from `~/.openclaw/config.json` + env vars.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub cron: CronConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cron: CronConfig::default(),
        }
    }
}

/// Configuration read by the cron scheduler's narrow collaborators.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CronConfig {
    /// Bearer token sent with webhook deliveries, if non-empty (§4.F).
    #[serde(default)]
    pub webhook_token: String,
    /// Fallback `agentId` used by the Dispatcher's main-session branch when
    /// a job doesn't specify one (§4.E.2b).
    #[serde(default = "default_agent_id")]
    pub default_agent_id: String,
    /// Prefix used to derive a main-session `sessionKey` from `agentId` when
    /// a job doesn't specify its own (§4.E.2b).
    #[serde(default = "default_session_key_prefix")]
    pub main_session_key_prefix: String,
    /// Open question (spec §9): the source treats both branches of this
    /// flag identically. Preserved as a no-op dual path rather than a
    /// guessed semantic — see DESIGN.md.
    #[serde(default)]
    pub requires_openai_auth: bool,
}

fn default_agent_id() -> String {
    "default".to_string()
}

fn default_session_key_prefix() -> String {
    "main".to_string()
}

impl Default for CronConfig {
    fn default() -> Self {
        Self {
            webhook_token: String::new(),
            default_agent_id: default_agent_id(),
            main_session_key_prefix: default_session_key_prefix(),
            requires_openai_auth: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.cron.default_agent_id, "default");
        assert_eq!(config.cron.main_session_key_prefix, "main");
        assert!(config.cron.webhook_token.is_empty());
        assert!(!config.cron.requires_openai_auth);
    }

    #[test]
    fn test_config_from_json_camel_case() {
        let json = serde_json::json!({
            "cron": {
                "webhookToken": "secret-token",
                "defaultAgentId": "ops-bot",
                "mainSessionKeyPrefix": "ops",
                "requiresOpenaiAuth": true
            }
        });

        let config: Config = serde_json::from_value(json).unwrap();
        assert_eq!(config.cron.webhook_token, "secret-token");
        assert_eq!(config.cron.default_agent_id, "ops-bot");
        assert_eq!(config.cron.main_session_key_prefix, "ops");
        assert!(config.cron.requires_openai_auth);
    }

    #[test]
    fn test_empty_json_gives_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.cron.default_agent_id, "default");
    }

    #[test]
    fn test_config_json_uses_camel_case() {
        let config = Config::default();
        let json = serde_json::to_value(&config).unwrap();
        assert!(json["cron"].get("webhookToken").is_some());
        assert!(json["cron"].get("defaultAgentId").is_some());
        assert!(json["cron"].get("webhook_token").is_none());
    }
}
