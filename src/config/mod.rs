//! Configuration: bridge timeouts (code > env) and server files.

pub mod servers;

pub use servers::{default_servers_path, ServerEntry, ServersFile};

use std::time::Duration;

use crate::error::BridgeError;

/// Default bound on connect + initialize + list-tools.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);
/// Default bound on waiting for a background worker to stop.
pub const DEFAULT_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

const HANDSHAKE_TIMEOUT_ENV: &str = "MCP_BRIDGE_HANDSHAKE_TIMEOUT_MS";
const CLOSE_TIMEOUT_ENV: &str = "MCP_BRIDGE_CLOSE_TIMEOUT_MS";
const CALL_TIMEOUT_ENV: &str = "MCP_BRIDGE_CALL_TIMEOUT_MS";

/// Timeouts applied by every session bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeConfig {
    /// `None` waits for the handshake indefinitely.
    pub handshake_timeout: Option<Duration>,
    pub close_timeout: Duration,
    /// `None` leaves tool calls unbounded.
    pub call_timeout: Option<Duration>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            handshake_timeout: Some(DEFAULT_HANDSHAKE_TIMEOUT),
            close_timeout: DEFAULT_CLOSE_TIMEOUT,
            call_timeout: None,
        }
    }
}

impl BridgeConfig {
    pub fn with_handshake_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    pub fn with_close_timeout(mut self, timeout: Duration) -> Self {
        self.close_timeout = timeout;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Load overrides from environment variables (and `.env` if present).
    ///
    /// Values are milliseconds; `0` disables the handshake and call timeouts.
    pub fn from_env() -> Result<Self, BridgeError> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, BridgeError> {
        let mut config = Self::default();
        if let Some(ms) = parse_millis(&lookup, HANDSHAKE_TIMEOUT_ENV)? {
            config.handshake_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }
        if let Some(ms) = parse_millis(&lookup, CLOSE_TIMEOUT_ENV)? {
            config.close_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_millis(&lookup, CALL_TIMEOUT_ENV)? {
            config.call_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }
        Ok(config)
    }
}

fn parse_millis(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<u64>, BridgeError> {
    lookup(key)
        .map(|raw| {
            raw.trim().parse::<u64>().map_err(|e| {
                BridgeError::Configuration(format!("{key} must be milliseconds, got '{raw}': {e}"))
            })
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_bound_handshake_and_close() {
        let config = BridgeConfig::default();
        assert_eq!(config.handshake_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.close_timeout, Duration::from_secs(5));
        assert_eq!(config.call_timeout, None);
    }

    #[test]
    fn env_values_override_defaults() {
        let config = BridgeConfig::from_lookup(lookup_from(&[
            (HANDSHAKE_TIMEOUT_ENV, "0"),
            (CLOSE_TIMEOUT_ENV, "250"),
            (CALL_TIMEOUT_ENV, "30000"),
        ]))
        .expect("values should parse");

        assert_eq!(config.handshake_timeout, None);
        assert_eq!(config.close_timeout, Duration::from_millis(250));
        assert_eq!(config.call_timeout, Some(Duration::from_secs(30)));
    }

    #[test]
    fn malformed_env_value_is_a_configuration_error() {
        let err = BridgeConfig::from_lookup(lookup_from(&[(CLOSE_TIMEOUT_ENV, "soon")]))
            .expect_err("non-numeric value should fail");
        assert!(matches!(err, BridgeError::Configuration(message) if message.contains(CLOSE_TIMEOUT_ENV)));
    }
}
