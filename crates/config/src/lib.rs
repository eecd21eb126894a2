//! Configuration loading, validation, and management for notebridge.
//!
//! Loads configuration from `~/.notebridge/config.toml` (or an explicit
//! path) with environment variable overrides. Validates all settings at
//! startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.notebridge/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Default log level when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Directory for adapter-owned state (token caches)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Telegram message source
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// HTTP gateway (Alice webhook)
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Alice voice-assistant webhook settings
    #[serde(default)]
    pub alice: AliceConfig,

    /// Periodic cleanup of completed notes
    #[serde(default)]
    pub cleanup: CleanupConfig,

    /// Speech-to-text for voice messages (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcription: Option<TranscriptionConfig>,

    /// Note backends, in routing order
    #[serde(default)]
    pub backends: Vec<BackendConfig>,
}

fn default_log_level() -> String {
    "info".into()
}
fn default_data_dir() -> PathBuf {
    PathBuf::from("tmp")
}

/// Redact a secret string for Debug output.
fn redact(s: &str) -> &'static str {
    if s.is_empty() { "" } else { "[REDACTED]" }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token from @BotFather
    #[serde(default)]
    pub token: String,

    /// Allowed numeric user IDs. Empty = deny all, ["*"] = allow all.
    #[serde(default)]
    pub allowed_users: Vec<String>,

    /// How long the /notes reply stays in the chat before it is deleted
    #[serde(default = "default_notes_reply_ttl")]
    pub notes_reply_ttl_secs: u64,

    /// Long-polling timeout passed to getUpdates
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
}

fn default_notes_reply_ttl() -> u64 {
    10
}
fn default_poll_timeout() -> u64 {
    30
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            allowed_users: vec![],
            notes_reply_ttl_secs: default_notes_reply_ttl(),
            poll_timeout_secs: default_poll_timeout(),
        }
    }
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("token", &redact(&self.token))
            .field("allowed_users", &self.allowed_users)
            .field("notes_reply_ttl_secs", &self.notes_reply_ttl_secs)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_port() -> u16 {
    8000
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AliceConfig {
    /// The only Alice user id whose utterances become notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupConfig {
    #[serde(default = "default_cleanup_interval")]
    pub interval_secs: u64,
}

fn default_cleanup_interval() -> u64 {
    300
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_cleanup_interval(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    /// Base URL of an OpenAI-compatible API (…/v1)
    #[serde(default = "default_transcription_url")]
    pub api_url: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_transcription_model")]
    pub model: String,

    /// ISO-639-1 hint, e.g. "ru"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

fn default_transcription_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_transcription_model() -> String {
    "whisper-1".into()
}

impl std::fmt::Debug for TranscriptionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranscriptionConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("language", &self.language)
            .finish()
    }
}

/// One configured note backend.
///
/// Tagged by `app` in TOML:
///
/// ```toml
/// [[backends]]
/// app = "notion"
/// token = "secret_..."
/// database_id = "..."
/// start_words = ["todo"]
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "app", rename_all = "snake_case")]
pub enum BackendConfig {
    Notion(NotionConfig),
    Teamly(TeamlyConfig),
    Yonote(YonoteConfig),
    /// Process-local store, useful for dry runs
    Memory(MemoryBackendConfig),
}

impl BackendConfig {
    /// The `app` tag of this backend.
    pub fn app(&self) -> &'static str {
        match self {
            BackendConfig::Notion(_) => "notion",
            BackendConfig::Teamly(_) => "teamly",
            BackendConfig::Yonote(_) => "yonote",
            BackendConfig::Memory(_) => "memory",
        }
    }

    /// Display name: the configured `name`, or the app tag.
    pub fn label(&self) -> String {
        let name = match self {
            BackendConfig::Notion(c) => &c.name,
            BackendConfig::Teamly(c) => &c.name,
            BackendConfig::Yonote(c) => &c.name,
            BackendConfig::Memory(c) => &c.name,
        };
        name.clone().unwrap_or_else(|| self.app().to_string())
    }

    pub fn delete_done_notes(&self) -> bool {
        match self {
            BackendConfig::Notion(c) => c.delete_done_notes,
            BackendConfig::Teamly(c) => c.delete_done_notes,
            BackendConfig::Yonote(c) => c.delete_done_notes,
            BackendConfig::Memory(c) => c.delete_done_notes,
        }
    }

    pub fn start_words(&self) -> &[String] {
        match self {
            BackendConfig::Notion(c) => &c.start_words,
            BackendConfig::Teamly(c) => &c.start_words,
            BackendConfig::Yonote(c) => &c.start_words,
            BackendConfig::Memory(c) => &c.start_words,
        }
    }

    fn required_fields(&self) -> Vec<(&'static str, &str)> {
        match self {
            BackendConfig::Notion(c) => vec![
                ("token", c.token.as_str()),
                ("database_id", c.database_id.as_str()),
                ("status_field_value", c.status_field_value.as_str()),
                ("done_field_id", c.done_field_id.as_str()),
            ],
            BackendConfig::Teamly(c) => vec![
                ("integration_id", c.integration_id.as_str()),
                ("client_secret", c.client_secret.as_str()),
                ("client_auth_code", c.client_auth_code.as_str()),
                ("database_id", c.database_id.as_str()),
                ("status_field_id", c.status_field_id.as_str()),
                ("done_field_id", c.done_field_id.as_str()),
            ],
            BackendConfig::Yonote(c) => vec![
                ("token", c.token.as_str()),
                ("database_id", c.database_id.as_str()),
                ("collection_id", c.collection_id.as_str()),
                ("status_field_id", c.status_field_id.as_str()),
                ("done_field_id", c.done_field_id.as_str()),
            ],
            BackendConfig::Memory(_) => vec![],
        }
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct NotionConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub token: String,

    #[serde(default)]
    pub database_id: String,

    /// Status property used on new pages
    #[serde(default = "default_notion_status_field")]
    pub status_field_id: String,

    /// Status option id given to new pages
    #[serde(default)]
    pub status_field_value: String,

    /// Checkbox property marking a page as done
    #[serde(default)]
    pub done_field_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default)]
    pub delete_done_notes: bool,

    #[serde(default)]
    pub start_words: Vec<String>,
}

fn default_notion_status_field() -> String {
    "Status".into()
}

impl std::fmt::Debug for NotionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotionConfig")
            .field("name", &self.name)
            .field("token", &redact(&self.token))
            .field("database_id", &self.database_id)
            .field("status_field_id", &self.status_field_id)
            .field("status_field_value", &self.status_field_value)
            .field("done_field_id", &self.done_field_id)
            .field("api_url", &self.api_url)
            .field("delete_done_notes", &self.delete_done_notes)
            .field("start_words", &self.start_words)
            .finish()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct TeamlyConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub integration_id: String,

    /// Redirect URI registered for the integration
    #[serde(default)]
    pub integration_url: String,

    #[serde(default)]
    pub client_secret: String,

    /// One-time authorization code for the first token exchange
    #[serde(default)]
    pub client_auth_code: String,

    /// Content database (space) receiving new articles
    #[serde(default)]
    pub database_id: String,

    #[serde(default)]
    pub status_field_id: String,

    #[serde(default)]
    pub status_field_value: String,

    #[serde(default)]
    pub done_field_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default)]
    pub delete_done_notes: bool,

    #[serde(default)]
    pub start_words: Vec<String>,
}

impl std::fmt::Debug for TeamlyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TeamlyConfig")
            .field("name", &self.name)
            .field("integration_id", &self.integration_id)
            .field("integration_url", &self.integration_url)
            .field("client_secret", &redact(&self.client_secret))
            .field("client_auth_code", &redact(&self.client_auth_code))
            .field("database_id", &self.database_id)
            .field("status_field_id", &self.status_field_id)
            .field("status_field_value", &self.status_field_value)
            .field("done_field_id", &self.done_field_id)
            .field("api_url", &self.api_url)
            .field("delete_done_notes", &self.delete_done_notes)
            .field("start_words", &self.start_words)
            .finish()
    }
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct YonoteConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub token: String,

    /// Parent document of the database rows
    #[serde(default)]
    pub database_id: String,

    #[serde(default)]
    pub collection_id: String,

    #[serde(default)]
    pub status_field_id: String,

    #[serde(default)]
    pub status_field_value: String,

    #[serde(default)]
    pub done_field_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default)]
    pub delete_done_notes: bool,

    #[serde(default)]
    pub start_words: Vec<String>,
}

impl std::fmt::Debug for YonoteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YonoteConfig")
            .field("name", &self.name)
            .field("token", &redact(&self.token))
            .field("database_id", &self.database_id)
            .field("collection_id", &self.collection_id)
            .field("status_field_id", &self.status_field_id)
            .field("status_field_value", &self.status_field_value)
            .field("done_field_id", &self.done_field_id)
            .field("api_url", &self.api_url)
            .field("delete_done_notes", &self.delete_done_notes)
            .field("start_words", &self.start_words)
            .finish()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryBackendConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default)]
    pub delete_done_notes: bool,

    #[serde(default)]
    pub start_words: Vec<String>,
}

impl AppConfig {
    /// Load configuration from `path`, `$NOTEBRIDGE_CONFIG`, or the default
    /// path (~/.notebridge/config.toml), in that order.
    ///
    /// Environment variables override file values:
    /// - `NOTEBRIDGE_TELEGRAM_TOKEN`
    /// - `NOTEBRIDGE_ALICE_USER_ID`
    /// - `NOTEBRIDGE_LOG_LEVEL`
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = Self::resolve_path(path);
        let mut config = Self::load_from(&config_path)?;

        if let Ok(token) = std::env::var("NOTEBRIDGE_TELEGRAM_TOKEN") {
            config.telegram.token = token;
        }

        if let Ok(user_id) = std::env::var("NOTEBRIDGE_ALICE_USER_ID") {
            config.alice.user_id = Some(user_id);
        }

        if let Ok(level) = std::env::var("NOTEBRIDGE_LOG_LEVEL") {
            config.log_level = level;
        }

        Ok(config)
    }

    /// Which file [`AppConfig::load`] reads for the given override.
    pub fn resolve_path(path: Option<&Path>) -> PathBuf {
        match path {
            Some(p) => p.to_path_buf(),
            None => std::env::var("NOTEBRIDGE_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|_| Self::config_dir().join("config.toml")),
        }
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Self::from_toml(&content).map_err(|e| match e {
            ConfigError::ParseError { reason, .. } => ConfigError::ParseError {
                path: path.to_path_buf(),
                reason,
            },
            other => other,
        })
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::ParseError {
            path: PathBuf::new(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".notebridge")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cleanup.interval_secs == 0 {
            return Err(ConfigError::ValidationError(
                "cleanup.interval_secs must be > 0".into(),
            ));
        }

        for (index, backend) in self.backends.iter().enumerate() {
            if backend.start_words().iter().any(|w| w.trim().is_empty()) {
                return Err(ConfigError::ValidationError(format!(
                    "backends[{index}] ({}): start_words must not contain blank entries",
                    backend.label()
                )));
            }

            for (field, value) in backend.required_fields() {
                if value.trim().is_empty() {
                    return Err(ConfigError::ValidationError(format!(
                        "backends[{index}] ({}): '{field}' is required for app '{}'",
                        backend.label(),
                        backend.app()
                    )));
                }
            }
        }

        Ok(())
    }

    /// Whether the Telegram source can be started.
    pub fn has_telegram(&self) -> bool {
        !self.telegram.token.is_empty()
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            data_dir: default_data_dir(),
            telegram: TelegramConfig::default(),
            gateway: GatewayConfig::default(),
            alice: AliceConfig::default(),
            cleanup: CleanupConfig::default(),
            transcription: None,
            backends: vec![],
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
