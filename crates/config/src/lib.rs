//! Configuration loading, validation, and management for Maitred.
//!
//! Loads an optional TOML file (`$MAITRED_CONFIG` or `./maitred.toml`), then
//! applies environment variable overrides. Database credentials and the
//! completion API key are required: a missing value fails at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// How `/ai/chat` treats conversation memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatMode {
    /// Per-caller memory keyed by the `user-id` header.
    #[default]
    Stateful,
    /// Fresh context every call, nothing remembered.
    Stateless,
}

impl std::str::FromStr for ChatMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "stateful" => Ok(ChatMode::Stateful),
            "stateless" => Ok(ChatMode::Stateless),
            other => Err(ConfigError::ValidationError(format!(
                "chat_mode must be 'stateful' or 'stateless', got '{other}'"
            ))),
        }
    }
}

impl std::fmt::Display for ChatMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatMode::Stateful => f.write_str("stateful"),
            ChatMode::Stateless => f.write_str("stateless"),
        }
    }
}

/// The root configuration structure.
///
/// Maps directly to `maitred.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Completion API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Completion endpoint settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Database connection
    #[serde(default)]
    pub database: DatabaseConfig,

    /// HTTP server configuration
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Conversation memory configuration
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Sampling settings per behavior
    #[serde(default)]
    pub completion: CompletionConfig,

    /// Context snapshot settings
    #[serde(default)]
    pub context: ContextConfig,

    /// Natural-language-to-SQL settings
    #[serde(default)]
    pub query: QueryConfig,
}

fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("provider", &self.provider)
            .field("database", &self.database)
            .field("gateway", &self.gateway)
            .field("memory", &self.memory)
            .field("completion", &self.completion)
            .field("context", &self.context)
            .field("query", &self.query)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Base URL of an OpenAI-compatible API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_model() -> String {
    "gpt-4".into()
}
fn default_timeout_secs() -> u64 {
    120
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            model: default_model(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    #[serde(default = "default_db_port")]
    pub port: u16,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,

    /// Run generated SQL inside a READ ONLY transaction
    #[serde(default = "default_true")]
    pub read_only_queries: bool,
}

fn default_db_port() -> u16 {
    5432
}
fn default_max_connections() -> u32 {
    5
}
fn default_acquire_timeout_secs() -> u64 {
    10
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: default_db_port(),
            name: None,
            user: None,
            password: None,
            max_connections: default_max_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
            read_only_queries: true,
        }
    }
}

impl std::fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &redact(&self.password))
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout_secs", &self.acquire_timeout_secs)
            .field("read_only_queries", &self.read_only_queries)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default)]
    pub chat_mode: ChatMode,

    /// Include the rendered context in stateless chat responses
    #[serde(default)]
    pub expose_context: bool,

    /// Allowed CORS origins. Empty = any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_port() -> u16 {
    5000
}
fn default_host() -> String {
    "0.0.0.0".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            chat_mode: ChatMode::default(),
            expose_context: false,
            cors_origins: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// "in_memory" or "file"
    #[serde(default = "default_memory_backend")]
    pub backend: String,

    /// Path of the JSON file for the "file" backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Idle seconds after which a conversation is rebuilt. 0 = never.
    #[serde(default)]
    pub idle_ttl_secs: u64,
}

fn default_memory_backend() -> String {
    "in_memory".into()
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            backend: default_memory_backend(),
            path: None,
            idle_ttl_secs: 0,
        }
    }
}

/// Output length and temperature for one kind of completion call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    pub max_tokens: u32,
    pub temperature: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    #[serde(default = "default_chat_sampling")]
    pub chat: SamplingConfig,

    #[serde(default = "default_ask_sampling")]
    pub ask: SamplingConfig,

    #[serde(default = "default_sql_sampling")]
    pub sql: SamplingConfig,

    #[serde(default = "default_narrate_sampling")]
    pub narrate: SamplingConfig,
}

fn default_chat_sampling() -> SamplingConfig {
    SamplingConfig {
        max_tokens: 300,
        temperature: 0.2,
    }
}
fn default_ask_sampling() -> SamplingConfig {
    SamplingConfig {
        max_tokens: 700,
        temperature: 0.5,
    }
}
fn default_sql_sampling() -> SamplingConfig {
    SamplingConfig {
        max_tokens: 200,
        temperature: 0.0,
    }
}
fn default_narrate_sampling() -> SamplingConfig {
    SamplingConfig {
        max_tokens: 300,
        temperature: 0.3,
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            chat: default_chat_sampling(),
            ask: default_ask_sampling(),
            sql: default_sql_sampling(),
            narrate: default_narrate_sampling(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// How many recent orders the snapshot includes (10-20)
    #[serde(default = "default_recent_orders_limit")]
    pub recent_orders_limit: u32,
}

fn default_recent_orders_limit() -> u32 {
    10
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            recent_orders_limit: default_recent_orders_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Ask the model to describe the query result in plain language
    #[serde(default = "default_true")]
    pub narrate: bool,

    /// Tables generated SQL may read. Empty = no table restriction.
    #[serde(default = "default_allowed_tables")]
    pub allowed_tables: Vec<String>,
}

fn default_allowed_tables() -> Vec<String> {
    vec!["menu_items".into(), "orders".into(), "users".into()]
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            narrate: true,
            allowed_tables: default_allowed_tables(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path, then apply the environment.
    ///
    /// Environment variables (highest priority):
    /// - `DB_HOST`, `DB_PORT`, `DB_NAME`, `DB_USER`, `DB_PASSWORD`
    /// - `MAITRED_API_KEY`, then `OPENAI_API_KEY`
    /// - `MAITRED_API_URL`, `MAITRED_MODEL`
    /// - `MAITRED_HOST`, `MAITRED_PORT`, `MAITRED_CHAT_MODE`
    pub fn load() -> Result<Self, ConfigError> {
        let config = Self::load_unchecked()?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`AppConfig::load`] but without validation, for diagnostics.
    pub fn load_unchecked() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::config_path())?;
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration from a specific file path, without the environment.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// The config file path: `$MAITRED_CONFIG` or `./maitred.toml`.
    pub fn config_path() -> PathBuf {
        std::env::var("MAITRED_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("maitred.toml"))
    }

    /// Apply overrides from an environment lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(host) = lookup("DB_HOST") {
            self.database.host = Some(host);
        }
        if let Some(port) = lookup("DB_PORT") {
            self.database.port = parse_port("DB_PORT", &port)?;
        }
        if let Some(name) = lookup("DB_NAME") {
            self.database.name = Some(name);
        }
        if let Some(user) = lookup("DB_USER") {
            self.database.user = Some(user);
        }
        if let Some(password) = lookup("DB_PASSWORD") {
            self.database.password = Some(password);
        }

        if let Some(key) = lookup("MAITRED_API_KEY").or_else(|| lookup("OPENAI_API_KEY")) {
            self.api_key = Some(key);
        }
        if let Some(url) = lookup("MAITRED_API_URL") {
            self.provider.api_url = url;
        }
        if let Some(model) = lookup("MAITRED_MODEL") {
            self.provider.model = model;
        }

        if let Some(host) = lookup("MAITRED_HOST") {
            self.gateway.host = host;
        }
        if let Some(port) = lookup("MAITRED_PORT") {
            self.gateway.port = parse_port("MAITRED_PORT", &port)?;
        }
        if let Some(mode) = lookup("MAITRED_CHAT_MODE") {
            self.gateway.chat_mode = mode.parse()?;
        }

        Ok(())
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("DB_HOST", &self.database.host),
            ("DB_NAME", &self.database.name),
            ("DB_USER", &self.database.user),
            ("DB_PASSWORD", &self.database.password),
            ("OPENAI_API_KEY", &self.api_key),
        ];
        for (var, value) in required {
            if value.as_deref().is_none_or(|v| v.trim().is_empty()) {
                return Err(ConfigError::Missing(var));
            }
        }

        let samplings = [
            ("chat", &self.completion.chat),
            ("ask", &self.completion.ask),
            ("sql", &self.completion.sql),
            ("narrate", &self.completion.narrate),
        ];
        for (name, sampling) in samplings {
            if !(0.0..=2.0).contains(&sampling.temperature) {
                return Err(ConfigError::ValidationError(format!(
                    "completion.{name}.temperature must be between 0.0 and 2.0"
                )));
            }
            if sampling.max_tokens == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "completion.{name}.max_tokens must be > 0"
                )));
            }
        }

        if !(10..=20).contains(&self.context.recent_orders_limit) {
            return Err(ConfigError::ValidationError(
                "context.recent_orders_limit must be between 10 and 20".into(),
            ));
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::ValidationError(
                "database.max_connections must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// The required connection settings from the database section.
    pub fn database_settings(&self) -> Result<DatabaseSettings<'_>, ConfigError> {
        let db = &self.database;
        Ok(DatabaseSettings {
            host: db.host.as_deref().ok_or(ConfigError::Missing("DB_HOST"))?,
            port: db.port,
            name: db.name.as_deref().ok_or(ConfigError::Missing("DB_NAME"))?,
            user: db.user.as_deref().ok_or(ConfigError::Missing("DB_USER"))?,
            password: db
                .password
                .as_deref()
                .ok_or(ConfigError::Missing("DB_PASSWORD"))?,
        })
    }

    /// Generate a sample config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            provider: ProviderConfig::default(),
            database: DatabaseConfig::default(),
            gateway: GatewayConfig::default(),
            memory: MemoryConfig::default(),
            completion: CompletionConfig::default(),
            context: ContextConfig::default(),
            query: QueryConfig::default(),
        }
    }
}

fn parse_port(var: &'static str, value: &str) -> Result<u16, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        var,
        value: value.to_string(),
    })
}

/// Borrowed PostgreSQL connection settings, each one present.
///
/// `Display` omits the password.
#[derive(Clone, Copy)]
pub struct DatabaseSettings<'a> {
    pub host: &'a str,
    pub port: u16,
    pub name: &'a str,
    pub user: &'a str,
    pub password: &'a str,
}

impl std::fmt::Display for DatabaseSettings<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}:{}/{}", self.user, self.host, self.port, self.name)
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {var}: '{value}'")]
    InvalidValue { var: &'static str, value: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
