//! Server configuration.
//!
//! Configuration can be loaded from:
//! - Environment variables (CHATHUB_HOST, CHATHUB_PORT, CHATHUB_CONFIG)
//! - TOML configuration file

use anyhow::{Context, Result};
use chathub_core::{HubConfig, RateLimitConfig};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Transport configuration.
    #[serde(default)]
    pub transport: TransportConfig,

    /// Resource limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Chat rules.
    #[serde(default)]
    pub chat: ChatConfig,

    /// Heartbeat configuration.
    #[serde(default)]
    pub heartbeat: HeartbeatConfig,

    /// Metrics configuration.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Path for WebSocket endpoint.
    #[serde(default = "default_ws_path")]
    pub websocket_path: String,
}

/// Resource limits configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum number of connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,

    /// Maximum inbound frame size in bytes.
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,
}

/// Chat rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Room every session starts in.
    #[serde(default = "default_room")]
    pub default_room: String,

    /// Prefix of generated display names.
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,

    /// Messages kept per room.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Maximum message length in characters.
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,

    /// Maximum room name length in characters.
    #[serde(default = "default_max_room_name_chars")]
    pub max_room_name_chars: usize,

    /// Messages admitted per session per window.
    #[serde(default = "default_rate_limit_max")]
    pub rate_limit_max: usize,

    /// Rate limit window in milliseconds.
    #[serde(default = "default_rate_limit_window")]
    pub rate_limit_window_ms: u64,
}

/// Heartbeat configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatConfig {
    /// Heartbeat interval in milliseconds. Zero disables probes.
    #[serde(default = "default_heartbeat_interval")]
    pub interval_ms: u64,

    /// Close sessions silent for this long, in milliseconds. Zero never closes.
    #[serde(default)]
    pub timeout_ms: u64,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics export.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics port.
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

// Default value functions
fn default_host() -> String {
    std::env::var("CHATHUB_HOST").unwrap_or_else(|_| "127.0.0.1".to_string())
}

fn default_port() -> u16 {
    std::env::var("CHATHUB_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000)
}

fn default_true() -> bool {
    true
}

fn default_ws_path() -> String {
    "/ws".to_string()
}

fn default_max_connections() -> usize {
    10_000
}

fn default_max_frame_size() -> usize {
    16 * 1024 // 16 KB
}

fn default_room() -> String {
    chathub_core::DEFAULT_ROOM.to_string()
}

fn default_name_prefix() -> String {
    chathub_core::session::DEFAULT_NAME_PREFIX.to_string()
}

fn default_history_capacity() -> usize {
    chathub_core::history::DEFAULT_HISTORY_CAPACITY
}

fn default_max_message_chars() -> usize {
    chathub_core::validate::MAX_MESSAGE_CHARS
}

fn default_max_room_name_chars() -> usize {
    chathub_core::validate::MAX_ROOM_NAME_CHARS
}

fn default_rate_limit_max() -> usize {
    chathub_core::rate_limit::DEFAULT_MAX_MESSAGES
}

fn default_rate_limit_window() -> u64 {
    chathub_core::rate_limit::DEFAULT_WINDOW_MS
}

fn default_heartbeat_interval() -> u64 {
    5_000 // 5 seconds
}

fn default_metrics_port() -> u16 {
    9090
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            transport: TransportConfig::default(),
            limits: LimitsConfig::default(),
            chat: ChatConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            websocket_path: default_ws_path(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            max_frame_size: default_max_frame_size(),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            default_room: default_room(),
            name_prefix: default_name_prefix(),
            history_capacity: default_history_capacity(),
            max_message_chars: default_max_message_chars(),
            max_room_name_chars: default_max_room_name_chars(),
            rate_limit_max: default_rate_limit_max(),
            rate_limit_window_ms: default_rate_limit_window(),
        }
    }
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_heartbeat_interval(),
            timeout_ms: 0,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_metrics_port(),
        }
    }
}

impl Config {
    /// Load configuration from file or defaults.
    ///
    /// `CHATHUB_CONFIG` names an explicit file; otherwise the usual locations
    /// are searched.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed, or if
    /// `CHATHUB_CONFIG` points at a missing file.
    pub fn load() -> Result<Self> {
        if let Ok(path) = std::env::var("CHATHUB_CONFIG") {
            return Self::from_file(shellexpand::tilde(&path).as_ref());
        }

        let config_paths = [
            "chathub.toml",
            "/etc/chathub/chathub.toml",
            "~/.config/chathub/chathub.toml",
        ];

        for path in &config_paths {
            let expanded = shellexpand::tilde(path);
            if Path::new(expanded.as_ref()).exists() {
                return Self::from_file(expanded.as_ref());
            }
        }

        // Fall back to defaults with environment overrides
        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Get the socket address to bind to.
    ///
    /// # Errors
    ///
    /// Returns an error if host and port do not form a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("Invalid bind address {}:{}", self.host, self.port))
    }

    /// Hub settings derived from this configuration.
    #[must_use]
    pub fn hub_config(&self) -> HubConfig {
        HubConfig {
            default_room: self.chat.default_room.clone(),
            name_prefix: self.chat.name_prefix.clone(),
            history_capacity: self.chat.history_capacity,
            max_message_chars: self.chat.max_message_chars,
            max_room_name_chars: self.chat.max_room_name_chars,
            rate_limit: RateLimitConfig {
                max_messages: self.chat.rate_limit_max,
                window_ms: self.chat.rate_limit_window_ms,
            },
            heartbeat_interval: Duration::from_millis(self.heartbeat.interval_ms),
            heartbeat_timeout: (self.heartbeat.timeout_ms > 0)
                .then(|| Duration::from_millis(self.heartbeat.timeout_ms)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.transport.websocket_path, "/ws");
        assert_eq!(config.chat.history_capacity, 50);
        assert_eq!(config.chat.max_message_chars, 500);
        assert_eq!(config.chat.rate_limit_max, 5);
        assert_eq!(config.chat.rate_limit_window_ms, 1_000);
        assert_eq!(config.heartbeat.interval_ms, 5_000);
        assert_eq!(config.heartbeat.timeout_ms, 0);
    }

    #[test]
    fn test_config_bind_addr() {
        let config = Config {
            host: "127.0.0.1".to_string(),
            port: 3100,
            ..Config::default()
        };
        assert_eq!(config.bind_addr().unwrap().port(), 3100);

        let bad = Config {
            host: "not a host".to_string(),
            ..Config::default()
        };
        assert!(bad.bind_addr().is_err());
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            host = "0.0.0.0"
            port = 9000

            [chat]
            default_room = "sanh-chinh"
            rate_limit_max = 10

            [heartbeat]
            timeout_ms = 15000
        "#;

        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 9000);
        assert_eq!(config.chat.default_room, "sanh-chinh");
        assert_eq!(config.chat.history_capacity, 50);

        let hub = config.hub_config();
        assert_eq!(hub.rate_limit.max_messages, 10);
        assert_eq!(hub.rate_limit.window_ms, 1_000);
        assert_eq!(hub.heartbeat_timeout, Some(Duration::from_millis(15_000)));
    }

    #[test]
    fn test_zero_timeout_means_monitoring_only() {
        assert_eq!(Config::default().hub_config().heartbeat_timeout, None);
    }
}
