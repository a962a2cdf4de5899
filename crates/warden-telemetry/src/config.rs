//! Telemetry configuration from environment variables.

/// Configuration for logging and metrics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Service name stamped on the startup log line
    pub service_name: String,

    /// Filter directive (`info`, `warn,wd_04_zone_transport=debug`, ...)
    pub log_level: String,

    /// Whether to write logs to stdout at all
    pub console_output: bool,

    /// Whether to enable JSON formatted logs
    pub json_logs: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "warden".to_string(),
            log_level: "info".to_string(),
            console_output: true,
            json_logs: false,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `WARDEN_SERVICE_NAME`: Service name (default: warden)
    /// - `WARDEN_LOG_LEVEL` or `RUST_LOG`: Filter directive (default: info)
    /// - `WARDEN_CONSOLE_OUTPUT`: Enable console output (default: true)
    /// - `WARDEN_JSON_LOGS`: Enable JSON logs (default: false in dev, true in containers)
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`TelemetryConfig::from_env`] with a custom variable source.
    #[must_use]
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let in_container =
            lookup("KUBERNETES_SERVICE_HOST").is_some() || lookup("DOCKER_CONTAINER").is_some();

        Self {
            service_name: lookup("WARDEN_SERVICE_NAME").unwrap_or(defaults.service_name),
            log_level: lookup("WARDEN_LOG_LEVEL")
                .or_else(|| lookup("RUST_LOG"))
                .unwrap_or(defaults.log_level),
            console_output: lookup("WARDEN_CONSOLE_OUTPUT").map_or(defaults.console_output, |v| {
                !(v.eq_ignore_ascii_case("false") || v == "0")
            }),
            json_logs: lookup("WARDEN_JSON_LOGS")
                .map_or(in_container, |v| v.eq_ignore_ascii_case("true") || v == "1"),
        }
    }
}
