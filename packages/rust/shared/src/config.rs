//! Application configuration for AskData.
//!
//! User config lives at `~/.askdata/askdata.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AskDataError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "askdata.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".askdata";

// ---------------------------------------------------------------------------
// Config structs (matching askdata.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Relational store settings.
    #[serde(default)]
    pub store: StoreConfig,

    /// Text-generation service settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Chart rendering settings.
    #[serde(default)]
    pub charts: ChartsConfig,
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8000
}

/// When the schema context is (re)built.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaRefresh {
    /// Introspect once when the server starts.
    #[default]
    Startup,
    /// Introspect at the start of every request.
    PerRequest,
}

/// `[store]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the SQLite/libSQL database file. Must already exist.
    #[serde(default = "default_store_path")]
    pub path: String,

    /// Reject anything but read-only statements before execution.
    #[serde(default = "default_true")]
    pub read_only: bool,

    /// Maximum rows materialized per query (0 = unlimited).
    #[serde(default)]
    pub max_rows: usize,

    /// Schema introspection policy.
    #[serde(default)]
    pub schema_refresh: SchemaRefresh,

    /// Time budget for executing one query.
    #[serde(default = "default_execution_timeout")]
    pub execution_timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            read_only: true,
            max_rows: 0,
            schema_refresh: SchemaRefresh::default(),
            execution_timeout_secs: default_execution_timeout(),
        }
    }
}

fn default_store_path() -> String {
    "ecommerce_data.db".into()
}
fn default_true() -> bool {
    true
}
fn default_execution_timeout() -> u64 {
    15
}

/// `[llm]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model identifier sent with every completion request.
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL of an OpenAI-compatible chat-completions API.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_llm_timeout")]
    pub synthesis_timeout_secs: u64,

    #[serde(default = "default_llm_timeout")]
    pub interpretation_timeout_secs: u64,

    /// Character budget for the result table embedded in the interpretation prompt.
    #[serde(default = "default_max_result_chars")]
    pub max_result_chars: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            model: default_model(),
            base_url: default_base_url(),
            synthesis_timeout_secs: default_llm_timeout(),
            interpretation_timeout_secs: default_llm_timeout(),
            max_result_chars: default_max_result_chars(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_model() -> String {
    "google/gemini-2.0-flash-001".into()
}
fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_llm_timeout() -> u64 {
    30
}
fn default_max_result_chars() -> usize {
    12_000
}

/// `[charts]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Directory for persisted chart copies, `charts` when the key is absent.
    /// Set it to `""` to keep charts in-memory only.
    #[serde(default = "default_charts_dir", skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<String>,

    #[serde(default = "default_chart_width")]
    pub width: u32,

    #[serde(default = "default_chart_height")]
    pub height: u32,

    /// Extra topic rules, checked before the built-in ones.
    #[serde(default)]
    pub topics: Vec<TopicConfig>,
}

impl Default for ChartsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            output_dir: default_charts_dir(),
            width: default_chart_width(),
            height: default_chart_height(),
            topics: Vec::new(),
        }
    }
}

fn default_charts_dir() -> Option<String> {
    Some("charts".into())
}
fn default_chart_width() -> u32 {
    640
}
fn default_chart_height() -> u32 {
    480
}

/// `[[charts.topics]]` entry: a keyword rule for chart labelling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicConfig {
    /// Matched case-insensitively as substrings of the question.
    pub keywords: Vec<String>,
    pub label: String,
    pub title: String,
}

impl AppConfig {
    /// Check values that serde cannot enforce on its own.
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.llm.base_url).map_err(|e| {
            AskDataError::config(format!("invalid llm.base_url '{}': {e}", self.llm.base_url))
        })?;

        let timeouts = [
            ("store.execution_timeout_secs", self.store.execution_timeout_secs),
            ("llm.synthesis_timeout_secs", self.llm.synthesis_timeout_secs),
            ("llm.interpretation_timeout_secs", self.llm.interpretation_timeout_secs),
        ];
        for (name, secs) in timeouts {
            if secs == 0 {
                return Err(AskDataError::config(format!("{name} must be greater than 0")));
            }
        }

        if self.charts.width == 0 || self.charts.height == 0 {
            return Err(AskDataError::config("chart dimensions must be non-zero"));
        }

        if let Some(topic) = self.charts.topics.iter().find(|t| t.keywords.is_empty()) {
            return Err(AskDataError::config(format!(
                "chart topic '{}' has no keywords",
                topic.label
            )));
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.askdata/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| AskDataError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.askdata/askdata.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| AskDataError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| AskDataError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| AskDataError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| AskDataError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| AskDataError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the generation API key from the configured env var.
///
/// Absence is a startup-time configuration error, never a per-request one.
pub fn validate_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.llm.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.trim().is_empty() => Ok(val),
        _ => Err(AskDataError::config(format!(
            "generation API key not found. Set the {var_name} environment variable."
        ))),
    }
}
