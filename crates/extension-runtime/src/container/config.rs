//! # Runtime Configuration
//!
//! Settings shared by every context the host boots.
//!
//! ## Security Requirements
//!
//! - `secret_token` MUST be set; frame handshake messages without it are
//!   treated as page noise, so an empty token would let any page speak it
//! - The token MUST NOT contain the `|` separator

use shared_bus::DEFAULT_CHANNEL_CAPACITY;
use shared_types::TOKEN_SEPARATOR;
use std::time::Duration;
use thiserror::Error;
use wd_04_zone_transport::TransportConfig;

/// Complete runtime configuration.
#[derive(Debug, Clone, Default)]
pub struct RuntimeConfig {
    /// Transport configuration.
    pub transport: TransportSettings,
    /// Identity configuration.
    pub identity: IdentityConfig,
    /// Bus configuration.
    pub bus: BusConfig,
}

impl RuntimeConfig {
    /// Load from `WARDEN_*` environment variables over the defaults.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `WARDEN_REQUEST_TIMEOUT_MS` | `transport.request_timeout_ms` (0 disables) |
    /// | `WARDEN_EXTENSION_ID` | `identity.secret_token` |
    /// | `WARDEN_BUS_CAPACITY` | `bus.channel_capacity` |
    ///
    /// # Errors
    ///
    /// `ConfigError::InvalidValue` when a numeric variable does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`RuntimeConfig::from_env`] with a custom variable source.
    ///
    /// # Errors
    ///
    /// `ConfigError::InvalidValue` when a numeric variable does not parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup("WARDEN_REQUEST_TIMEOUT_MS") {
            config.transport.request_timeout_ms = parse_var("WARDEN_REQUEST_TIMEOUT_MS", &raw)?;
        }
        if let Some(token) = lookup("WARDEN_EXTENSION_ID") {
            config.identity.secret_token = token;
        }
        if let Some(raw) = lookup("WARDEN_BUS_CAPACITY") {
            config.bus.channel_capacity = parse_var("WARDEN_BUS_CAPACITY", &raw)?;
        }

        Ok(config)
    }

    /// Validate before booting any context.
    ///
    /// # Errors
    ///
    /// - `MissingSecretToken` - token is empty
    /// - `InvalidSecretToken` - token contains the message separator
    /// - `InvalidValue` - bus capacity is zero
    pub fn validate(&self) -> Result<(), ConfigError> {
        let token = &self.identity.secret_token;
        if token.is_empty() {
            return Err(ConfigError::MissingSecretToken);
        }
        if token.contains(TOKEN_SEPARATOR) {
            return Err(ConfigError::InvalidSecretToken);
        }
        if self.bus.channel_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                variable: "WARDEN_BUS_CAPACITY",
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    /// Transport settings in the form `ZoneTransport` takes.
    #[must_use]
    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig::from_millis(self.transport.request_timeout_ms)
    }
}

fn parse_var<T: std::str::FromStr>(variable: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        variable,
        value: raw.to_string(),
    })
}

/// Cross-context request settings.
#[derive(Debug, Clone)]
pub struct TransportSettings {
    /// Reply timeout in milliseconds; 0 waits forever.
    pub request_timeout_ms: u64,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            request_timeout_ms: 30_000,
        }
    }
}

impl TransportSettings {
    /// Timeout as a `Duration`, `None` when disabled.
    #[must_use]
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }
}

/// Frame handshake identity.
#[derive(Debug, Clone, Default)]
pub struct IdentityConfig {
    /// Extension-unique token prefixed to every window message.
    pub secret_token: String,
}

/// Message bus sizing.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Per-endpoint inbox capacity.
    pub channel_capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// No secret token configured.
    #[error("secret token is not set; set WARDEN_EXTENSION_ID")]
    MissingSecretToken,

    /// Token would be ambiguous on the wire.
    #[error("secret token must not contain the '|' separator")]
    InvalidSecretToken,

    /// A variable holds an unusable value.
    #[error("invalid value {value:?} for {variable}")]
    InvalidValue {
        variable: &'static str,
        value: String,
    },
}
