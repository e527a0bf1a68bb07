//! Craftwatch Configuration
//!
//! This module defines the configuration structures with proper defaults
//! using derive macros and serde attributes for cleaner code.

use crate::error::CraftwatchError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// Constants
// ============================================================================

/// Default Minecraft server port
pub const DEFAULT_SERVER_PORT: u16 = 25565;
/// Default external server address
pub const DEFAULT_SERVER_ADDRESS: &str = "localhost:25565";
/// Default status query timeout (seconds)
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 5;
/// Default server log path
pub const DEFAULT_LOG_PATH: &str = "logs/latest.log";
/// Default idle backoff while tailing (milliseconds)
pub const DEFAULT_IDLE_BACKOFF_MS: u64 = 1000;
/// Default poll interval (seconds)
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 300;
/// Default force-check marker file
pub const DEFAULT_FORCE_CHECK_FILE: &str = "force_server_check.trigger";
/// Default force-check marker scan interval (seconds)
pub const DEFAULT_FORCE_CHECK_INTERVAL_SECS: u64 = 10;
/// Default cooldown after a forced poll (seconds)
pub const DEFAULT_FORCE_COOLDOWN_SECS: u64 = 30;
/// Default persisted message id file
pub const DEFAULT_MESSAGE_ID_PATH: &str = "status_message_id.txt";
/// Default embed title
pub const DEFAULT_TITLE: &str = "Minecraft Server Status";
/// Default minimum interval between publishes (milliseconds)
pub const DEFAULT_MIN_PUBLISH_INTERVAL_MS: u64 = 2000;
/// Default publish timeout (seconds)
pub const DEFAULT_PUBLISH_TIMEOUT_SECS: u64 = 5;
/// Default shutdown publish timeout (seconds)
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 5;

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

// ============================================================================
// Main Config
// ============================================================================

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Monitored server endpoints
    #[serde(default)]
    pub server: ServerConfig,
    /// Server log source
    #[serde(default)]
    pub log: LogConfig,
    /// Poll schedule
    #[serde(default)]
    pub poll: PollConfig,
    /// Discord sink
    #[serde(default)]
    pub discord: DiscordConfig,
    /// Publish pacing
    #[serde(default)]
    pub publish: PublishConfig,
}

// ============================================================================
// Server Config
// ============================================================================

/// Endpoints queried by the status poller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// External address ("host" or "host:port"), authoritative for online/offline
    #[serde(default = "ServerConfig::default_address")]
    pub address: String,
    /// Local-network address, queried for diagnosis only
    #[serde(default = "ServerConfig::default_local_address")]
    pub local_address: Option<String>,
    /// Per-query timeout in seconds
    #[serde(default = "ServerConfig::default_query_timeout_secs")]
    pub query_timeout_secs: u64,
}

impl ServerConfig {
    fn default_address() -> String {
        DEFAULT_SERVER_ADDRESS.to_string()
    }
    fn default_local_address() -> Option<String> {
        Some(format!("localhost:{}", DEFAULT_SERVER_PORT))
    }
    fn default_query_timeout_secs() -> u64 {
        DEFAULT_QUERY_TIMEOUT_SECS
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: Self::default_address(),
            local_address: Self::default_local_address(),
            query_timeout_secs: DEFAULT_QUERY_TIMEOUT_SECS,
        }
    }
}

// ============================================================================
// Log Config
// ============================================================================

/// Server log source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Path to the append-only server log
    #[serde(default = "LogConfig::default_path")]
    pub path: PathBuf,
    /// Sleep between reads when no new data is available (milliseconds)
    #[serde(default = "LogConfig::default_idle_backoff_ms")]
    pub idle_backoff_ms: u64,
}

impl LogConfig {
    fn default_path() -> PathBuf {
        PathBuf::from(DEFAULT_LOG_PATH)
    }
    fn default_idle_backoff_ms() -> u64 {
        DEFAULT_IDLE_BACKOFF_MS
    }

    pub fn idle_backoff(&self) -> Duration {
        Duration::from_millis(self.idle_backoff_ms)
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            path: Self::default_path(),
            idle_backoff_ms: DEFAULT_IDLE_BACKOFF_MS,
        }
    }
}

// ============================================================================
// Poll Config
// ============================================================================

/// Status poll schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Normal interval between poll cycles (seconds)
    #[serde(default = "PollConfig::default_interval_secs")]
    pub interval_secs: u64,
    /// Marker file requesting an out-of-cycle poll
    #[serde(default = "PollConfig::default_force_check_file")]
    pub force_check_file: PathBuf,
    /// How often the marker file is looked for (seconds)
    #[serde(default = "PollConfig::default_force_check_interval_secs")]
    pub force_check_interval_secs: u64,
    /// Sleep after a forced cycle before resuming the schedule (seconds)
    #[serde(default = "PollConfig::default_force_cooldown_secs")]
    pub force_cooldown_secs: u64,
}

impl PollConfig {
    fn default_interval_secs() -> u64 {
        DEFAULT_POLL_INTERVAL_SECS
    }
    fn default_force_check_file() -> PathBuf {
        PathBuf::from(DEFAULT_FORCE_CHECK_FILE)
    }
    fn default_force_check_interval_secs() -> u64 {
        DEFAULT_FORCE_CHECK_INTERVAL_SECS
    }
    fn default_force_cooldown_secs() -> u64 {
        DEFAULT_FORCE_COOLDOWN_SECS
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn force_check_interval(&self) -> Duration {
        Duration::from_secs(self.force_check_interval_secs)
    }

    pub fn force_cooldown(&self) -> Duration {
        Duration::from_secs(self.force_cooldown_secs)
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            force_check_file: Self::default_force_check_file(),
            force_check_interval_secs: DEFAULT_FORCE_CHECK_INTERVAL_SECS,
            force_cooldown_secs: DEFAULT_FORCE_COOLDOWN_SECS,
        }
    }
}

// ============================================================================
// Discord Config
// ============================================================================

/// Discord notification sink
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Bot token (optional, can be loaded from env)
    #[serde(default)]
    pub token: Option<String>,
    /// Channel holding the status message
    #[serde(default)]
    pub channel_id: String,
    /// Optional `host:port` of an HTTP proxy in front of the Discord API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    /// File holding the persisted status message id
    #[serde(default = "DiscordConfig::default_message_id_path")]
    pub message_id_path: PathBuf,
    /// Embed title
    #[serde(default = "DiscordConfig::default_title")]
    pub title: String,
}

impl DiscordConfig {
    fn default_message_id_path() -> PathBuf {
        PathBuf::from(DEFAULT_MESSAGE_ID_PATH)
    }
    fn default_title() -> String {
        DEFAULT_TITLE.to_string()
    }
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: None,
            channel_id: String::new(),
            proxy: None,
            message_id_path: Self::default_message_id_path(),
            title: DEFAULT_TITLE.to_string(),
        }
    }
}

// ============================================================================
// Publish Config
// ============================================================================

/// Publish pacing and deadlines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Minimum interval between two external writes (milliseconds)
    #[serde(default = "PublishConfig::default_min_interval_ms")]
    pub min_interval_ms: u64,
    /// Deadline for a single publish (seconds)
    #[serde(default = "PublishConfig::default_timeout_secs")]
    pub timeout_secs: u64,
    /// Deadline for the final offline publish on shutdown (seconds)
    #[serde(default = "PublishConfig::default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

impl PublishConfig {
    fn default_min_interval_ms() -> u64 {
        DEFAULT_MIN_PUBLISH_INTERVAL_MS
    }
    fn default_timeout_secs() -> u64 {
        DEFAULT_PUBLISH_TIMEOUT_SECS
    }
    fn default_shutdown_timeout_secs() -> u64 {
        DEFAULT_SHUTDOWN_TIMEOUT_SECS
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            min_interval_ms: DEFAULT_MIN_PUBLISH_INTERVAL_MS,
            timeout_secs: DEFAULT_PUBLISH_TIMEOUT_SECS,
            shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
        }
    }
}

// ============================================================================
// Config Loading and Validation
// ============================================================================

/// Configuration loader
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from file or default locations.
    ///
    /// With no explicit path and no file at any default location, the
    /// built-in defaults are used so a bare `.env` setup still works.
    pub fn load(path: Option<&str>) -> Result<Config, CraftwatchError> {
        let config_path = match path {
            Some(p) => Some(PathBuf::from(p)),
            None => Self::default_paths().into_iter().find(|p| p.exists()),
        };

        let Some(config_path) = config_path else {
            tracing::debug!("No config file found, using defaults");
            return Ok(Config::default());
        };

        if !config_path.exists() {
            return Err(CraftwatchError::config_not_found(
                config_path.display().to_string(),
            ));
        }

        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| CraftwatchError::config_parse_error(format!("Failed to read: {}", e)))?;
        Self::parse(&content)
    }

    /// Parse configuration from YAML text
    pub fn parse(content: &str) -> Result<Config, CraftwatchError> {
        if content.trim().is_empty() {
            return Ok(Config::default());
        }
        serde_yml::from_str(content)
            .map_err(|e| CraftwatchError::config_parse_error(format!("Failed to parse: {}", e)))
    }

    fn default_paths() -> [PathBuf; 3] {
        [
            home_dir().join(".craftwatch/config.yaml"),
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("craftwatch.yaml"),
            PathBuf::from("./craftwatch.yaml"),
        ]
    }
}

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the fields every command depends on
    pub fn validate(config: &Config) -> Result<(), CraftwatchError> {
        if config.server.address.trim().is_empty() {
            return Err(CraftwatchError::config_invalid(
                "server.address",
                "Server address cannot be empty",
            ));
        }
        if config.server.query_timeout_secs == 0 {
            return Err(CraftwatchError::config_invalid(
                "server.query_timeout_secs",
                "Query timeout must be at least 1 second",
            ));
        }
        if config.poll.interval_secs == 0 {
            return Err(CraftwatchError::config_invalid(
                "poll.interval_secs",
                "Poll interval must be at least 1 second",
            ));
        }
        if config.poll.force_check_interval_secs == 0 {
            return Err(CraftwatchError::config_invalid(
                "poll.force_check_interval_secs",
                "Force-check scan interval must be at least 1 second",
            ));
        }
        if config.log.idle_backoff_ms == 0 {
            return Err(CraftwatchError::config_invalid(
                "log.idle_backoff_ms",
                "Idle backoff cannot be zero",
            ));
        }
        Ok(())
    }

    /// Validate the Discord sink settings needed by `run`
    pub fn validate_sink(config: &Config) -> Result<(), CraftwatchError> {
        match config.discord.token.as_deref() {
            Some(token) if !token.trim().is_empty() => {}
            _ => {
                return Err(CraftwatchError::config_invalid(
                    "discord.token",
                    "Bot token not set (config, TOKEN or DISCORD_BOT_TOKEN)",
                ))
            }
        }
        let channel = config.discord.channel_id.trim();
        if channel.is_empty() || !channel.chars().all(|c| c.is_ascii_digit()) {
            return Err(CraftwatchError::config_invalid(
                "discord.channel_id",
                format!("Invalid channel id '{}'", config.discord.channel_id),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Config Implementation
// ============================================================================

impl Config {
    /// Load configuration
    pub fn load(path: &Option<String>) -> Result<Self, CraftwatchError> {
        ConfigLoader::load(path.as_deref())
    }

    /// Save configuration to file
    pub fn save(&self, path: &PathBuf) -> Result<(), CraftwatchError> {
        let content = serde_yml::to_string(self).map_err(|e| {
            CraftwatchError::config_parse_error(format!("Serialization failed: {}", e))
        })?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply the environment variable overrides (`TOKEN`, `CHANNEL_ID`, ...)
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(token) = get("DISCORD_BOT_TOKEN").or_else(|| get("TOKEN")) {
            self.discord.token = Some(token);
        }
        if let Some(channel) = get("CHANNEL_ID") {
            self.discord.channel_id = channel.trim().to_string();
        }
        if let Some(log_file) = get("MINECRAFT_LOG_FILE") {
            self.log.path = PathBuf::from(log_file);
        }

        let port = get("SERVER_PORT").and_then(|p| p.trim().parse::<u16>().ok());
        if let Some(ip) = get("SERVER_IP") {
            let ip = ip.trim();
            self.server.address = match port {
                Some(port) if !ip.contains(':') => format!("{}:{}", ip, port),
                _ => ip.to_string(),
            };
        }
        if let Some(port) = port {
            self.server.local_address = Some(format!("localhost:{}", port));
        }
    }

    /// Generate a sample configuration
    pub fn sample() -> Self {
        Config {
            server: ServerConfig {
                address: "play.example.com:25565".to_string(),
                ..ServerConfig::default()
            },
            discord: DiscordConfig {
                token: None,
                channel_id: "123456789012345678".to_string(),
                ..DiscordConfig::default()
            },
            ..Config::default()
        }
    }
}
