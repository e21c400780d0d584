//! # Configuration Management
//!
//! Server configuration: listening address, mode selection, packet size limit
//! and the optional idle-timeout policy.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - TOML strings via `from_toml()`
//! - Environment-variable overrides via `from_env()`
//! - Direct instantiation with defaults

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::core::codec::DEFAULT_MAX_PACKET_SIZE;
use crate::core::spec::TOTAL_HEADER_LEN;
use crate::error::{ProtocolError, Result};
use crate::server::handler::Mode;

/// Server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen address (e.g., "127.0.0.1:9999")
    pub address: String,

    /// Payload-level behavior applied to every decoded packet
    pub mode: Mode,

    /// Maximum total size of a single packet, headers included
    pub max_packet_size: usize,

    /// Close connections idle for this long; `None` (the default) imposes no
    /// timeout
    #[serde(default, with = "opt_duration_serde")]
    pub idle_timeout: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: String::from("127.0.0.1:9999"),
            mode: Mode::Echo,
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            idle_timeout: None,
        }
    }
}

impl ServerConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ProtocolError::ConfigError(format!("failed to read config file: {e}")))?;
        Self::from_toml(&contents)
    }

    /// Load configuration from a TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("failed to parse TOML: {e}")))
    }

    /// Defaults overridden by environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("MATRYOSHKA_ADDRESS") {
            config.address = addr;
        }

        if let Ok(mode) = std::env::var("MATRYOSHKA_MODE") {
            config.mode = Mode::from_str(&mode)
                .map_err(|e| ProtocolError::ConfigError(format!("MATRYOSHKA_MODE: {e}")))?;
        }

        if let Ok(size) = std::env::var("MATRYOSHKA_MAX_PACKET_SIZE") {
            config.max_packet_size = size.parse::<usize>().map_err(|e| {
                ProtocolError::ConfigError(format!("MATRYOSHKA_MAX_PACKET_SIZE: {e}"))
            })?;
        }

        if let Ok(ms) = std::env::var("MATRYOSHKA_IDLE_TIMEOUT_MS") {
            let ms = ms.parse::<u64>().map_err(|e| {
                ProtocolError::ConfigError(format!("MATRYOSHKA_IDLE_TIMEOUT_MS: {e}"))
            })?;
            config.idle_timeout = Some(Duration::from_millis(ms));
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

    /// Validate the configuration for common misconfigurations.
    ///
    /// Returns a list of validation errors; empty means valid.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.address.is_empty() {
            errors.push("server address cannot be empty".to_string());
        } else if self.address.parse::<std::net::SocketAddr>().is_err() {
            errors.push(format!(
                "invalid server address format: '{}' (expected format: '127.0.0.1:9999')",
                self.address
            ));
        }

        // A packet below the fixed header total can never carry any payload.
        if self.max_packet_size <= TOTAL_HEADER_LEN {
            errors.push(format!(
                "max packet size too small: {} bytes (headers alone take {})",
                self.max_packet_size, TOTAL_HEADER_LEN
            ));
        } else if self.max_packet_size > 100 * 1024 * 1024 {
            errors.push(format!(
                "max packet size too large: {} bytes (maximum recommended: 100 MB)",
                self.max_packet_size
            ));
        }

        if let Some(timeout) = self.idle_timeout {
            if timeout.as_millis() < 100 {
                errors.push("idle timeout too short (minimum: 100ms)".to_string());
            }
        }

        errors
    }

    /// Validate and return Result - convenience method
    pub fn validate_strict(&self) -> Result<()> {
        let errors = self.validate();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Helper module for Option<Duration> serialization as milliseconds
mod opt_duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration
            .map(|d| d.as_millis() as u64)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}
