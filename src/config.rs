//! Configuration management for the ping server
//!
//! Values come from built-in defaults, then an optional `config.toml`, then
//! `PINGER_` prefixed environment variables. Everything here requires a restart
//! to take effect.

use config::{Config, ConfigBuilder, Environment, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use std::time::Duration;

const CONFIG_PATH: &str = "config";
const ENV_PREFIX: &str = "PINGER";

/// Complete server configuration
#[derive(Debug, Deserialize, Clone)]
pub struct PingerConfig {
    // ═══ NETWORK (Environment Override Supported) ═══
    /// Host or IP address the UDP socket binds to
    /// Environment: PINGER_BIND_ADDRESS
    pub bind_address: String,

    /// UDP port clients register on
    /// Environment: PINGER_PORT
    pub port: u16,

    // ═══ WORKERS ═══
    /// Number of client registries sharing the inbound traffic
    /// Environment: PINGER_POOL_SIZE
    pub pool_size: usize,

    /// Seconds a client stays registered without refreshing.
    /// Also drives the sweep cadence (half of this value).
    /// Environment: PINGER_CLIENT_EXPIRATION_SECS
    pub client_expiration_secs: u64,

    /// Delay between two ping passes of a registry
    /// Environment: PINGER_PING_INTERVAL_MS
    pub ping_interval_ms: u64,
}

impl PingerConfig {
    /// Load configuration from config.toml (if present) with environment overrides
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = Self::defaults()?
            .add_source(File::with_name(CONFIG_PATH).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true));

        Self::finish(builder)
    }

    /// Load configuration from an in-memory TOML document, on top of the defaults
    pub fn from_toml(contents: &str) -> Result<Self, config::ConfigError> {
        let builder = Self::defaults()?.add_source(File::from_str(contents, FileFormat::Toml));
        Self::finish(builder)
    }

    fn defaults() -> Result<ConfigBuilder<DefaultState>, config::ConfigError> {
        Config::builder()
            .set_default("bind_address", "0.0.0.0")?
            .set_default("port", 9999_i64)?
            .set_default("pool_size", 4_i64)?
            .set_default("client_expiration_secs", 30_i64)?
            .set_default("ping_interval_ms", 1000_i64)
    }

    fn finish(builder: ConfigBuilder<DefaultState>) -> Result<Self, config::ConfigError> {
        let config: PingerConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validation for all configuration values
    pub fn validate(&self) -> Result<(), config::ConfigError> {
        if self.bind_address.trim().is_empty() {
            return Err(config::ConfigError::Message(
                "bind_address cannot be empty".into(),
            ));
        }

        if self.pool_size == 0 {
            return Err(config::ConfigError::Message(
                "pool_size must be greater than 0".into(),
            ));
        }

        if self.client_expiration_secs == 0 {
            return Err(config::ConfigError::Message(
                "client_expiration_secs must be greater than 0".into(),
            ));
        }

        if self.ping_interval_ms == 0 {
            return Err(config::ConfigError::Message(
                "ping_interval_ms must be greater than 0".into(),
            ));
        }

        Ok(())
    }

    /// Get bind address and port as a `host:port` string
    pub fn listen_socket(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }

    /// Get the client TTL as Duration
    pub fn client_expiration(&self) -> Duration {
        Duration::from_secs(self.client_expiration_secs)
    }

    /// Get the ping cadence as Duration
    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }
}
