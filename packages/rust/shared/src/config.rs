//! Application configuration for autoservice.
//!
//! User config lives at `~/.autoservice/autoservice.toml`.
//! CLI flags override config file values, which override defaults.
//! API keys are never stored in the file; each section names the
//! environment variable that holds its key.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AutoserviceError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "autoservice.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".autoservice";

// ---------------------------------------------------------------------------
// Config structs (matching autoservice.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Database location.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Chat-completion backend.
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Web-search backend.
    #[serde(default)]
    pub search: SearchConfig,
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Origin allowed by CORS (the frontend dev server).
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8000
}
fn default_cors_origin() -> String {
    "http://localhost:5173".into()
}

/// `[database]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the libSQL database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "var/autoservice.db".into()
}

/// `[completion]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_completion_key_env")]
    pub api_key_env: String,

    /// Base URL of an OpenAI-compatible API.
    #[serde(default = "default_completion_base_url")]
    pub base_url: String,

    /// Model used for chat and the workshop agent.
    #[serde(default = "default_model")]
    pub model: String,

    /// Temperature for the direct chat endpoint.
    #[serde(default = "default_chat_temperature")]
    pub chat_temperature: f32,

    /// Temperature for the workshop agent stages.
    #[serde(default = "default_agent_temperature")]
    pub agent_temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_completion_timeout")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_completion_key_env(),
            base_url: default_completion_base_url(),
            model: default_model(),
            chat_temperature: default_chat_temperature(),
            agent_temperature: default_agent_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_completion_timeout(),
        }
    }
}

fn default_completion_key_env() -> String {
    "OPENAI_API_KEY".into()
}
fn default_completion_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4o-mini".into()
}
fn default_chat_temperature() -> f32 {
    0.7
}
fn default_agent_temperature() -> f32 {
    1.0
}
fn default_max_tokens() -> u32 {
    600
}
fn default_completion_timeout() -> u64 {
    60
}

/// `[search]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Name of the env var holding the search API key.
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,

    /// Base URL of a Tavily-compatible search API.
    #[serde(default = "default_search_base_url")]
    pub base_url: String,

    /// Maximum number of results requested per search.
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_search_key_env(),
            base_url: default_search_base_url(),
            max_results: default_max_results(),
            timeout_secs: default_search_timeout(),
        }
    }
}

fn default_search_key_env() -> String {
    "TAVILY_API_KEY".into()
}
fn default_search_base_url() -> String {
    "https://api.tavily.com".into()
}
fn default_max_results() -> usize {
    3
}
fn default_search_timeout() -> u64 {
    20
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.autoservice/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| AutoserviceError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.autoservice/autoservice.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| AutoserviceError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        AutoserviceError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| AutoserviceError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| AutoserviceError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| AutoserviceError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read a non-empty secret from the environment variable named `var_name`.
///
/// An unset or blank variable yields `None`; callers decide whether that is
/// fatal (completion) or a degraded mode (web search).
pub fn read_api_key(var_name: &str) -> Option<String> {
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Some(val.trim().to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("OPENAI_API_KEY"));
        assert!(toml_str.contains("TAVILY_API_KEY"));
        assert!(toml_str.contains("autoservice.db"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.server.port, 8000);
        assert_eq!(parsed.search.max_results, 3);
        assert_eq!(parsed.completion.api_key_env, "OPENAI_API_KEY");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[server]
port = 9090

[completion]
model = "gpt-4o"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.completion.model, "gpt-4o");
        assert_eq!(config.completion.max_tokens, 600);
        assert_eq!(config.database.path, "var/autoservice.db");
    }

    #[test]
    fn missing_api_key_reads_as_none() {
        // Use a unique env var name to avoid interfering with other tests
        assert!(read_api_key("AS_TEST_NONEXISTENT_KEY_12345").is_none());
    }
}
