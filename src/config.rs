//! # Configuration Management
//!
//! Protocol constants and caller-supplied settings.
//!
//! The wire constants at the top of this module must match the physical
//! devices bit for bit. Everything in [`BroadlinkConfig`] is policy: timeouts,
//! the discovery target, the handshake policy and the transport choice. The
//! core never reads configuration implicitly; callers pass these structs to
//! discovery and session constructors.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment overrides via `from_env()` (`BROADLINK_*` variables)

use crate::error::{ProtocolError, Result};
use crate::utils::timeout;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Magic bytes at the start of every request and reply frame.
pub const MAGIC_BYTES: [u8; 8] = [0x5a, 0xa5, 0xaa, 0x55, 0x5a, 0xa5, 0xaa, 0x55];

/// Key used until the handshake installs the device-issued key.
pub const BOOTSTRAP_KEY: [u8; 16] = [
    0x09, 0x76, 0x28, 0x34, 0x3f, 0xe9, 0x9e, 0x23, 0x76, 0x5c, 0x15, 0x13, 0xac, 0xcf, 0x8b, 0x02,
];

/// Fixed CBC initialization vector.
pub const PROTOCOL_IV: [u8; 16] = [
    0x56, 0x2e, 0x17, 0x99, 0x6d, 0x09, 0x3d, 0x28, 0xdd, 0xb3, 0xba, 0x69, 0x5a, 0x2e, 0x6f, 0x58,
];

/// Device id used before the handshake.
pub const BOOTSTRAP_DEVICE_ID: u32 = 0;

/// Seed of the additive frame and payload checksums.
pub const CHECKSUM_SEED: u16 = 0xBEAF;

/// UDP port devices listen on.
pub const DEVICE_PORT: u16 = 80;

/// Default discovery target.
pub const BROADCAST_ADDRESS: &str = "255.255.255.255:80";

/// Largest frame accepted from the network.
pub const MAX_FRAME_SIZE: usize = 2048;

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct BroadlinkConfig {
    /// Discovery settings
    #[serde(default)]
    pub discovery: DiscoveryConfig,

    /// Per-device session settings
    #[serde(default)]
    pub session: SessionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BroadlinkConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("BROADLINK_DISCOVERY_ADDRESS") {
            config.discovery.broadcast_address = addr;
        }

        if let Ok(addr) = std::env::var("BROADLINK_LOCAL_ADDRESS") {
            config.discovery.local_address = Some(addr.clone());
            config.session.local_address = Some(addr);
        }

        if let Ok(timeout) = std::env::var("BROADLINK_DISCOVERY_TIMEOUT_MS") {
            let val = timeout.parse::<u64>().map_err(|e| {
                ProtocolError::ConfigError(format!("Invalid BROADLINK_DISCOVERY_TIMEOUT_MS: {e}"))
            })?;
            config.discovery.timeout = Duration::from_millis(val);
        }

        if let Ok(timeout) = std::env::var("BROADLINK_REQUEST_TIMEOUT_MS") {
            let val = timeout.parse::<u64>().map_err(|e| {
                ProtocolError::ConfigError(format!("Invalid BROADLINK_REQUEST_TIMEOUT_MS: {e}"))
            })?;
            config.session.request_timeout = Duration::from_millis(val);
        }

        if let Ok(policy) = std::env::var("BROADLINK_HANDSHAKE_POLICY") {
            config.session.handshake_policy = match policy.to_ascii_lowercase().as_str() {
                "implicit" => HandshakePolicy::Implicit,
                "explicit" => HandshakePolicy::Explicit,
                other => {
                    return Err(ProtocolError::ConfigError(format!(
                        "Invalid BROADLINK_HANDSHAKE_POLICY: '{other}' (expected implicit or explicit)"
                    )))
                }
            };
        }

        if let Ok(transport) = std::env::var("BROADLINK_TRANSPORT") {
            config.session.transport = match transport.to_ascii_lowercase().as_str() {
                "udp" => TransportKind::Udp,
                "tcp" => TransportKind::Tcp,
                other => {
                    return Err(ProtocolError::ConfigError(format!(
                        "Invalid BROADLINK_TRANSPORT: '{other}' (expected udp or tcp)"
                    )))
                }
            };
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.discovery.validate());
        errors.extend(self.session.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Discovery settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Where the probe is sent (broadcast or a subnet-directed broadcast)
    pub broadcast_address: String,

    /// Local address to bind and to advertise in the probe
    #[serde(default)]
    pub local_address: Option<String>,

    /// How long replies are collected
    #[serde(with = "duration_serde")]
    pub timeout: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            broadcast_address: String::from(BROADCAST_ADDRESS),
            local_address: None,
            timeout: timeout::DISCOVERY_TIMEOUT,
        }
    }
}

impl DiscoveryConfig {
    /// Validate discovery configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.broadcast_address.parse::<SocketAddr>().is_err() {
            errors.push(format!(
                "Invalid discovery address: '{}' (expected format: '192.168.1.255:80')",
                self.broadcast_address
            ));
        }

        if let Some(local) = &self.local_address {
            if local.parse::<SocketAddr>().is_err() {
                errors.push(format!(
                    "Invalid local address: '{local}' (expected format: '192.168.1.10:0')"
                ));
            }
        }

        if self.timeout.as_millis() < 100 {
            errors.push("Discovery timeout too short (minimum: 100ms)".to_string());
        } else if self.timeout.as_secs() > 120 {
            errors.push("Discovery timeout too long (maximum: 120s)".to_string());
        }

        errors
    }

    pub fn target(&self) -> Result<SocketAddr> {
        self.broadcast_address.parse().map_err(|e| {
            ProtocolError::ConfigError(format!(
                "Invalid discovery address '{}': {e}",
                self.broadcast_address
            ))
        })
    }

    pub fn local(&self) -> Result<Option<SocketAddr>> {
        parse_optional_addr(self.local_address.as_deref())
    }
}

/// What a semantic command does when the session has not shaken hands yet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HandshakePolicy {
    /// Run the handshake before the first command
    #[default]
    Implicit,
    /// Fail with `ProtocolError::NotAuthenticated`
    Explicit,
}

/// Which transport a session uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Udp,
    Tcp,
}

/// Per-device session settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Timeout for one request/response round trip
    #[serde(with = "duration_serde")]
    pub request_timeout: Duration,

    /// Handshake behaviour for commands issued before authentication
    #[serde(default)]
    pub handshake_policy: HandshakePolicy,

    /// Transport used for requests
    #[serde(default)]
    pub transport: TransportKind,

    /// Local address to bind request sockets to
    #[serde(default)]
    pub local_address: Option<String>,

    /// First packet counter value; drawn from 0x8000..=0xFFFF when unset
    #[serde(default)]
    pub initial_counter: Option<u16>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            request_timeout: timeout::DEFAULT_TIMEOUT,
            handshake_policy: HandshakePolicy::Implicit,
            transport: TransportKind::Udp,
            local_address: None,
            initial_counter: None,
        }
    }
}

impl SessionConfig {
    /// Validate session configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.request_timeout.as_millis() < 10 {
            errors.push("Request timeout too short (minimum: 10ms)".to_string());
        } else if self.request_timeout.as_secs() > 300 {
            errors.push("Request timeout too long (maximum: 300s)".to_string());
        }

        if let Some(local) = &self.local_address {
            if local.parse::<SocketAddr>().is_err() {
                errors.push(format!(
                    "Invalid local address: '{local}' (expected format: '192.168.1.10:0')"
                ));
            }
        }

        errors
    }

    pub fn local(&self) -> Result<Option<SocketAddr>> {
        parse_optional_addr(self.local_address.as_deref())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to include the event target (module path)
    pub with_target: bool,

    /// Whether to emit ANSI colours
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("broadlink-protocol"),
            log_level: Level::INFO,
            with_target: true,
            ansi: true,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        errors
    }
}

fn parse_optional_addr(addr: Option<&str>) -> Result<Option<SocketAddr>> {
    addr.map(|a| {
        a.parse::<SocketAddr>()
            .map_err(|e| ProtocolError::ConfigError(format!("Invalid local address '{a}': {e}")))
    })
    .transpose()
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}
