//! Application settings and bridge configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::supervisor::RetryPolicy;

/// Connection settings for the WhatsApp bridge sidecar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// WebSocket URL of the bridge (`ws://` or `wss://`).
    #[serde(default = "default_bridge_url")]
    pub url: String,

    /// Directory holding the session credentials.
    #[serde(default = "default_auth_dir")]
    pub auth_dir: PathBuf,

    /// How long to wait for the bridge to answer a request, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_bridge_url() -> String {
    "ws://127.0.0.1:8790".to_owned()
}

fn default_auth_dir() -> PathBuf {
    PathBuf::from("auth_info")
}

fn default_request_timeout() -> u64 {
    30
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            url: default_bridge_url(),
            auth_dir: default_auth_dir(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl BridgeConfig {
    /// Creates configuration from environment variables.
    ///
    /// Reads `BRIDGE_URL`, `AUTH_DIR` and `BRIDGE_REQUEST_TIMEOUT`; all optional.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is set to an invalid value.
    pub fn from_env() -> Result<Self, ConfigError> {
        let url = std::env::var("BRIDGE_URL").unwrap_or_else(|_| default_bridge_url());
        if !(url.starts_with("ws://") || url.starts_with("wss://")) {
            return Err(ConfigError::InvalidBridgeUrl(url));
        }

        let auth_dir = std::env::var("AUTH_DIR").map_or_else(|_| default_auth_dir(), PathBuf::from);

        let request_timeout_secs = match std::env::var("BRIDGE_REQUEST_TIMEOUT") {
            Ok(raw) => raw
                .parse::<u64>()
                .ok()
                .filter(|&secs| secs > 0)
                .ok_or(ConfigError::InvalidNumber("BRIDGE_REQUEST_TIMEOUT"))?,
            Err(_) => default_request_timeout(),
        };

        Ok(Self {
            url,
            auth_dir,
            request_timeout_secs,
        })
    }

    /// Returns the request timeout as a duration.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Bot-specific settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotSettings {
    /// Prefix that marks a message as a command.
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,

    /// Answer `!sticker` without an image with a hint instead of staying silent.
    #[serde(default)]
    pub sticker_hint: bool,

    /// Reconnect attempts before giving up (`None` retries forever).
    #[serde(default)]
    pub reconnect_max_attempts: Option<u32>,

    /// Delay before the first reconnect attempt, in milliseconds.
    #[serde(default = "default_reconnect_initial_delay")]
    pub reconnect_initial_delay_ms: u64,

    /// Upper bound for the reconnect delay, in seconds.
    #[serde(default = "default_reconnect_max_delay")]
    pub reconnect_max_delay_secs: u64,
}

fn default_command_prefix() -> String {
    "!".to_owned()
}

fn default_reconnect_initial_delay() -> u64 {
    1000
}

fn default_reconnect_max_delay() -> u64 {
    30
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            command_prefix: default_command_prefix(),
            sticker_hint: false,
            reconnect_max_attempts: None,
            reconnect_initial_delay_ms: default_reconnect_initial_delay(),
            reconnect_max_delay_secs: default_reconnect_max_delay(),
        }
    }
}

impl BotSettings {
    /// Creates bot settings from environment variables with defaults.
    #[must_use]
    pub fn from_env_with_defaults() -> Self {
        Self {
            command_prefix: std::env::var("COMMAND_PREFIX")
                .ok()
                .filter(|p| !p.is_empty())
                .unwrap_or_else(default_command_prefix),
            sticker_hint: std::env::var("STICKER_HINT")
                .ok()
                .is_some_and(|v| parse_flag(&v)),
            reconnect_max_attempts: std::env::var("RECONNECT_MAX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok()),
            reconnect_initial_delay_ms: std::env::var("RECONNECT_INITIAL_DELAY_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_reconnect_initial_delay),
            reconnect_max_delay_secs: std::env::var("RECONNECT_MAX_DELAY_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or_else(default_reconnect_max_delay),
        }
    }

    /// Builds the reconnect policy described by these settings.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.reconnect_max_attempts,
            Duration::from_millis(self.reconnect_initial_delay_ms),
            Duration::from_secs(self.reconnect_max_delay_secs),
        )
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid bridge URL '{0}' (must start with ws:// or wss://)")]
    InvalidBridgeUrl(String),

    #[error("Invalid value for {0} (must be a positive integer)")]
    InvalidNumber(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = BotSettings::default();
        assert_eq!(settings.command_prefix, "!");
        assert!(!settings.sticker_hint);
        assert_eq!(settings.reconnect_max_attempts, None);
    }

    #[test]
    fn test_default_bridge_config() {
        let config = BridgeConfig::default();
        assert_eq!(config.url, "ws://127.0.0.1:8790");
        assert_eq!(config.auth_dir, PathBuf::from("auth_info"));
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_retry_policy_from_settings() {
        let settings = BotSettings {
            reconnect_max_attempts: Some(3),
            reconnect_initial_delay_ms: 500,
            reconnect_max_delay_secs: 2,
            ..BotSettings::default()
        };
        let policy = settings.retry_policy();
        assert_eq!(policy.delay_for(1), Some(Duration::from_millis(500)));
        assert_eq!(policy.delay_for(3), Some(Duration::from_secs(2)));
        assert_eq!(policy.delay_for(4), None);
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag(" YES "));
        assert!(parse_flag("1"));
        assert!(!parse_flag("0"));
        assert!(!parse_flag("nope"));
    }
}
