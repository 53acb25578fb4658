//! Configuration management for chatlink.
//!
//! Configuration is loaded with the following priority (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file (JSON)
//! 4. Default values

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::api::DEFAULT_ENDPOINT;
use crate::channel::DeliveryMode;
use crate::cli::Args;
use crate::session::SessionOptions;

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Connection configuration.
    pub connection: ConnectionSection,
    /// Timing configuration.
    pub timing: TimingSection,
    /// Logging configuration.
    pub logging: LoggingSection,
}

/// Connection configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionSection {
    /// Conversation endpoint base url.
    pub endpoint: String,
    /// Channel secret used for the initial handshake.
    pub secret: Option<String>,
    /// Local user id.
    pub user_id: String,
    /// Delivery mode.
    pub mode: DeliveryMode,
    /// Reconnect a dropped push channel.
    pub auto_reconnect: bool,
}

impl Default for ConnectionSection {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            secret: None,
            user_id: "user".to_string(),
            mode: DeliveryMode::Push,
            auto_reconnect: true,
        }
    }
}

/// Timing configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingSection {
    /// Delay between poll cycles in milliseconds.
    pub poll_interval_ms: u64,
    /// Seconds before credential expiry at which it is renewed.
    pub refresh_margin_secs: u64,
}

impl Default for TimingSection {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            refresh_margin_secs: 60,
        }
    }
}

/// Logging configuration section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Log level (error, warn, info, debug, trace).
    pub level: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        serde_json::from_str(&content).map_err(ConfigError::Json)
    }

    /// Apply environment variable overrides.
    pub fn apply_env(&mut self) {
        self.apply_vars(|name| std::env::var(name).ok());
    }

    fn apply_vars<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(endpoint) = var("CHATLINK_ENDPOINT") {
            self.connection.endpoint = endpoint;
        }

        if let Some(secret) = var("CHATLINK_SECRET") {
            if !secret.is_empty() {
                self.connection.secret = Some(secret);
            }
        }

        if let Some(user_id) = var("CHATLINK_USER_ID") {
            self.connection.user_id = user_id;
        }

        if let Some(mode) = var("CHATLINK_MODE") {
            if let Ok(mode) = mode.parse() {
                self.connection.mode = mode;
            }
        }

        if let Some(level) = var("CHATLINK_LOG_LEVEL") {
            self.logging.level = level;
        } else if let Some(level) = var("RUST_LOG") {
            self.logging.level = level;
        }
    }

    /// Apply CLI argument overrides.
    pub fn apply_args(&mut self, args: &Args) {
        if let Some(ref endpoint) = args.endpoint {
            self.connection.endpoint = endpoint.clone();
        }

        if let Some(ref secret) = args.secret {
            self.connection.secret = Some(secret.clone());
        }

        if let Some(ref user_id) = args.user_id {
            self.connection.user_id = user_id.clone();
        }

        if let Some(mode) = args.mode {
            self.connection.mode = mode;
        }

        if args.no_reconnect {
            self.connection.auto_reconnect = false;
        }

        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }
    }

    /// Load configuration with full priority chain.
    ///
    /// Priority: CLI args > env vars > config file > defaults
    pub fn load(args: &Args) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        if let Some(ref path) = args.config {
            config = Config::from_file(path)?;
        }

        config.apply_env();
        config.apply_args(args);

        Ok(config)
    }

    /// The channel secret, required to start a session.
    pub fn secret(&self) -> Result<&str, ConfigError> {
        self.connection
            .secret
            .as_deref()
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::MissingSecret)
    }

    /// Convert to options for [`crate::Session::start`].
    pub fn to_session_options(&self) -> SessionOptions {
        SessionOptions {
            mode: self.connection.mode,
            auto_reconnect: self.connection.auto_reconnect,
            poll_interval: Duration::from_millis(self.timing.poll_interval_ms),
            refresh_margin: Duration::from_secs(self.timing.refresh_margin_secs),
        }
    }

    /// Get the log level filter string.
    pub fn log_filter(&self) -> &str {
        &self.logging.level
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    Io(std::io::Error),
    /// JSON parsing error.
    Json(serde_json::Error),
    /// No channel secret configured.
    MissingSecret,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "failed to read config file: {}", e),
            Self::Json(e) => write!(f, "failed to parse config file: {}", e),
            Self::MissingSecret => write!(
                f,
                "no channel secret configured (use --secret or CHATLINK_SECRET)"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}
