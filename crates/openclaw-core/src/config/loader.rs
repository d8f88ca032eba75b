//! Config loader — reads `~/.openclaw/config.json` and merges env vars.
//!
//! # Loading precedence
//! 1. Defaults (from `Config::default()`)
//! 2. JSON file at `~/.openclaw/config.json`
//! 3. Environment variables `OPENCLAW_CRON__<FIELD>` (override JSON)

use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use super::schema::Config;

/// Default config file path.
pub fn get_config_path() -> PathBuf {
    crate::utils::get_data_path().join("config.json")
}

/// Load configuration from the default path + env vars.
///
/// Falls back to `Config::default()` if the file doesn't exist or can't be parsed.
pub fn load_config(path: Option<&Path>) -> Config {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);
    load_config_from_path(&config_path)
}

fn load_config_from_path(path: &Path) -> Config {
    if !path.exists() {
        info!("No config file found at {}, using defaults", path.display());
        return apply_env_overrides(Config::default());
    }

    debug!("Loading config from {}", path.display());

    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read config file {}: {}", path.display(), e);
            return apply_env_overrides(Config::default());
        }
    };

    let config: Config = match serde_json::from_str(&content) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to parse config JSON: {}", e);
            return apply_env_overrides(Config::default());
        }
    };

    apply_env_overrides(config)
}

/// Save configuration to disk (pretty-printed JSON with camelCase keys).
pub fn save_config(config: &Config, path: Option<&Path>) -> std::io::Result<()> {
    let config_path = path.map(PathBuf::from).unwrap_or_else(get_config_path);

    if let Some(parent) = config_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let json = serde_json::to_string_pretty(config)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;

    std::fs::write(&config_path, json)?;
    debug!("Config saved to {}", config_path.display());
    Ok(())
}

/// Apply environment variable overrides on top of a loaded config.
///
/// Env var format: `OPENCLAW_CRON__<FIELD>` (double underscore as delimiter).
///
/// Supported overrides:
/// - `OPENCLAW_CRON__WEBHOOK_TOKEN` → `cron.webhookToken`
/// - `OPENCLAW_CRON__DEFAULT_AGENT_ID` → `cron.defaultAgentId`
/// - `OPENCLAW_CRON__MAIN_SESSION_KEY_PREFIX` → `cron.mainSessionKeyPrefix`
/// - `OPENCLAW_CRON__REQUIRES_OPENAI_AUTH` → `cron.requiresOpenaiAuth`
fn apply_env_overrides(mut config: Config) -> Config {
    if let Ok(val) = std::env::var("OPENCLAW_CRON__WEBHOOK_TOKEN") {
        config.cron.webhook_token = val;
    }
    if let Ok(val) = std::env::var("OPENCLAW_CRON__DEFAULT_AGENT_ID") {
        config.cron.default_agent_id = val;
    }
    if let Ok(val) = std::env::var("OPENCLAW_CRON__MAIN_SESSION_KEY_PREFIX") {
        config.cron.main_session_key_prefix = val;
    }
    if let Ok(val) = std::env::var("OPENCLAW_CRON__REQUIRES_OPENAI_AUTH") {
        config.cron.requires_openai_auth = val == "true" || val == "1";
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_temp_json(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_missing_file() {
        let config = load_config_from_path(Path::new("/nonexistent/path/config.json"));
        assert_eq!(config.cron.default_agent_id, "default");
    }

    #[test]
    fn test_load_valid_json() {
        let file = write_temp_json(
            r#"{
            "cron": {
                "webhookToken": "tok-123",
                "defaultAgentId": "ops-bot"
            }
        }"#,
        );

        let config = load_config_from_path(file.path());
        assert_eq!(config.cron.webhook_token, "tok-123");
        assert_eq!(config.cron.default_agent_id, "ops-bot");
        assert_eq!(config.cron.main_session_key_prefix, "main");
    }

    #[test]
    fn test_load_invalid_json_returns_defaults() {
        let file = write_temp_json("not valid json {{{");
        let config = load_config_from_path(file.path());
        assert_eq!(config.cron.default_agent_id, "default");
    }

    #[test]
    fn test_load_empty_json() {
        let file = write_temp_json("{}");
        let config = load_config_from_path(file.path());
        assert_eq!(config.cron.default_agent_id, "default");
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        let mut config = Config::default();
        config.cron.webhook_token = "secret".to_string();
        config.cron.default_agent_id = "night-shift".to_string();

        save_config(&config, Some(&path)).unwrap();

        let reloaded = load_config_from_path(&path);
        assert_eq!(reloaded.cron.webhook_token, "secret");
        assert_eq!(reloaded.cron.default_agent_id, "night-shift");
    }

    #[test]
    fn test_env_override_webhook_token() {
        std::env::set_var("OPENCLAW_CRON__WEBHOOK_TOKEN", "env-token");
        let config = apply_env_overrides(Config::default());
        assert_eq!(config.cron.webhook_token, "env-token");
        std::env::remove_var("OPENCLAW_CRON__WEBHOOK_TOKEN");
    }

    #[test]
    fn test_env_override_requires_openai_auth() {
        std::env::set_var("OPENCLAW_CRON__REQUIRES_OPENAI_AUTH", "true");
        let config = apply_env_overrides(Config::default());
        assert!(config.cron.requires_openai_auth);
        std::env::remove_var("OPENCLAW_CRON__REQUIRES_OPENAI_AUTH");
    }

    #[test]
    fn test_saved_json_uses_camel_case() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        save_config(&Config::default(), Some(&path)).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let raw: serde_json::Value = serde_json::from_str(&content).unwrap();

        assert!(raw["cron"].get("webhookToken").is_some());
        assert!(raw["cron"].get("webhook_token").is_none());
    }
}
