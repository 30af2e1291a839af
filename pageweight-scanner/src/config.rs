use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning knobs for the relay fetch client.
///
/// Every field has a default, so a config file only needs to name the values it
/// overrides. Durations are (de)serialized as milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Timeout for each relay attempt at the root document (default: 15s)
    #[serde(with = "duration_ms")]
    pub document_timeout: Duration,

    /// Timeout for the direct HEAD size probe (default: 5s)
    #[serde(with = "duration_ms")]
    pub probe_timeout: Duration,

    /// Timeout for each relay GET of a resource (default: 10s)
    #[serde(with = "duration_ms")]
    pub relay_timeout: Duration,

    /// TCP connect timeout shared by every request (default: 5s)
    #[serde(with = "duration_ms")]
    pub connect_timeout: Duration,

    /// Minimum spacing before a root document request (default: 200ms)
    #[serde(with = "duration_ms")]
    pub document_request_delay: Duration,

    /// Minimum spacing between relay requests (default: 100ms)
    #[serde(with = "duration_ms")]
    pub min_request_delay: Duration,

    /// Retries after the first relay attempt for a resource (default: 2)
    pub max_retries: u32,

    /// First backoff after an HTTP 429, doubled on each attempt (default: 1s)
    #[serde(with = "duration_ms")]
    pub rate_limit_backoff: Duration,

    /// Upper bound for the 429 backoff (default: 5s)
    #[serde(with = "duration_ms")]
    pub max_rate_limit_backoff: Duration,

    /// Backoff after any other failure, multiplied by the attempt number (default: 500ms)
    #[serde(with = "duration_ms")]
    pub failure_backoff: Duration,

    /// Try a HEAD request against the resource itself before using relays (default: true)
    pub direct_probe: bool,

    /// Include relays that need manual authorization in rotation (default: false)
    pub allow_manual_relays: bool,

    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            document_timeout: Duration::from_secs(15),
            probe_timeout: Duration::from_secs(5),
            relay_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            document_request_delay: Duration::from_millis(200),
            min_request_delay: Duration::from_millis(100),
            max_retries: 2,
            rate_limit_backoff: Duration::from_millis(1000),
            max_rate_limit_backoff: Duration::from_millis(5000),
            failure_backoff: Duration::from_millis(500),
            direct_probe: true,
            allow_manual_relays: false,
            user_agent: format!(
                "Pageweight/{} (https://github.com/trapdoorsec/pageweight)",
                env!("CARGO_PKG_VERSION")
            ),
        }
    }
}

impl FetchConfig {
    /// Backoff before retrying a rate limited request on `attempt` (0-based).
    pub fn rate_limit_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.rate_limit_backoff
            .saturating_mul(factor)
            .min(self.max_rate_limit_backoff)
    }

    /// Backoff before retrying after any other failure on `attempt` (0-based).
    pub fn failure_delay(&self, attempt: u32) -> Duration {
        self.failure_backoff.saturating_mul(attempt.saturating_add(1))
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_delay_doubles_and_caps() {
        let config = FetchConfig::default();
        assert_eq!(config.rate_limit_delay(0), Duration::from_millis(1000));
        assert_eq!(config.rate_limit_delay(1), Duration::from_millis(2000));
        assert_eq!(config.rate_limit_delay(2), Duration::from_millis(4000));
        assert_eq!(config.rate_limit_delay(3), Duration::from_millis(5000));
        assert_eq!(config.rate_limit_delay(40), Duration::from_millis(5000));
    }

    #[test]
    fn test_failure_delay_grows_linearly() {
        let config = FetchConfig::default();
        assert_eq!(config.failure_delay(0), Duration::from_millis(500));
        assert_eq!(config.failure_delay(1), Duration::from_millis(1000));
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: FetchConfig =
            serde_json::from_str(r#"{"max_retries": 5, "relay_timeout": 2500}"#).unwrap();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.relay_timeout, Duration::from_millis(2500));
        assert_eq!(config.probe_timeout, Duration::from_secs(5));
        assert!(config.direct_probe);
    }
}
