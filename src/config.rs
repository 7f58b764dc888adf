//! Client configuration, loaded from TOML.
//!
//! ```toml
//! [server]
//! hostname = "irc.example.net"
//! port = 6697
//! nick = "slircbot"
//! tls = true
//!
//! [flood]
//! max_messages = 4
//! per_seconds = 2
//!
//! [debug]
//! enabled = false
//! ```

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::flood::FloodPolicy;

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Where to connect and who to be.
    pub server: ServerConfig,
    /// Outbound rate limit.
    #[serde(default)]
    pub flood: FloodConfig,
    /// Logging verbosity.
    #[serde(default)]
    pub debug: DebugConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        config.flood_policy()?;
        Ok(config)
    }

    /// Build a configuration for `hostname` with every other value defaulted.
    pub fn new(hostname: impl Into<String>, nick: impl Into<String>) -> Self {
        Self {
            server: ServerConfig::new(hostname, nick),
            flood: FloodConfig::default(),
            debug: DebugConfig::default(),
        }
    }

    /// The configured flood policy.
    pub fn flood_policy(&self) -> Result<FloodPolicy, ConfigError> {
        FloodPolicy::new(self.flood.max_messages, self.flood.per_seconds)
    }
}

/// Server endpoint and identity.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub hostname: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub nick: String,
    #[serde(default = "default_realname")]
    pub realname: String,
    /// Sent as `PASS` before registration when set.
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub tls: bool,
    /// Cooldown between a failure and the next connection attempt.
    #[serde(default = "default_reconnect_delay_secs")]
    pub reconnect_delay_secs: u64,
}

impl ServerConfig {
    pub fn new(hostname: impl Into<String>, nick: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            port: default_port(),
            nick: nick.into(),
            realname: default_realname(),
            password: None,
            tls: false,
            reconnect_delay_secs: default_reconnect_delay_secs(),
        }
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }
}

/// `[flood]` section.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct FloodConfig {
    #[serde(default = "default_max_messages")]
    pub max_messages: u32,
    #[serde(default = "default_per_seconds")]
    pub per_seconds: u32,
}

impl Default for FloodConfig {
    fn default() -> Self {
        Self {
            max_messages: default_max_messages(),
            per_seconds: default_per_seconds(),
        }
    }
}

/// `[debug]` section.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct DebugConfig {
    #[serde(default)]
    pub enabled: bool,
}

fn default_port() -> u16 {
    6667
}

fn default_realname() -> String {
    "slirc client".to_string()
}

fn default_reconnect_delay_secs() -> u64 {
    5
}

fn default_max_messages() -> u32 {
    FloodPolicy::default().max_messages()
}

fn default_per_seconds() -> u32 {
    FloodPolicy::default().per_seconds()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = Config::from_toml_str(
            r#"
            [server]
            hostname = "irc.example.net"
            nick = "bot"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 6667);
        assert_eq!(config.server.realname, "slirc client");
        assert_eq!(config.server.password, None);
        assert!(!config.server.tls);
        assert_eq!(config.server.reconnect_delay(), Duration::from_secs(5));
        assert_eq!(config.flood_policy().unwrap(), FloodPolicy::default());
        assert!(!config.debug.enabled);
    }

    #[test]
    fn test_full_config() {
        let config = Config::from_toml_str(
            r#"
            [server]
            hostname = "irc.example.net"
            port = 6697
            nick = "bot"
            realname = "A test bot"
            password = "hunter2"
            tls = true
            reconnect_delay_secs = 30

            [flood]
            max_messages = 3
            per_seconds = 1

            [debug]
            enabled = true
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 6697);
        assert_eq!(config.server.password.as_deref(), Some("hunter2"));
        assert!(config.server.tls);
        assert_eq!(config.server.reconnect_delay_secs, 30);
        assert_eq!(config.flood_policy().unwrap(), FloodPolicy::new(3, 1).unwrap());
        assert!(config.debug.enabled);
    }

    #[test]
    fn test_zero_flood_policy_is_rejected() {
        let err = Config::from_toml_str(
            r#"
            [server]
            hostname = "irc.example.net"
            nick = "bot"

            [flood]
            max_messages = 0
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFloodPolicy { .. }));
    }

    #[test]
    fn test_missing_server_section() {
        let err = Config::from_toml_str("[debug]\nenabled = true\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load("/nonexistent/slirc-client.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
