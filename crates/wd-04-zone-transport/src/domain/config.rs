use std::time::Duration;

/// Default time to wait for a reply envelope.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Transport settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportConfig {
    /// How long a caller waits for a reply. `None` waits forever.
    pub request_timeout: Option<Duration>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
        }
    }
}

impl TransportConfig {
    /// Build from a millisecond count where zero means no timeout.
    #[must_use]
    pub fn from_millis(timeout_ms: u64) -> Self {
        Self {
            request_timeout: (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms)),
        }
    }
}
