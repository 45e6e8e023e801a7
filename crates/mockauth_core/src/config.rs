//! Core runtime configuration.
//!
//! # Responsibility
//! - Hold simulated latencies and channel sizing for one backend instance.
//! - Load overrides from JSON (FFI callers) or `MOCKAUTH_*` env vars (CLI).
//!
//! # Invariants
//! - Latencies are expressed in abstract time units; `time_unit_ms` maps one
//!   unit to wall-clock milliseconds.
//! - `error_buffer_capacity` is within `1..=MAX_ERROR_BUFFER_CAPACITY` after
//!   `validate()`.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

pub const DEFAULT_SIGN_IN_LATENCY: u64 = 500;
pub const DEFAULT_LINK_LATENCY: u64 = 500;
pub const DEFAULT_SEED_LATENCY: u64 = 500;
pub const DEFAULT_ITEM_WRITE_LATENCY: u64 = 200;
pub const DEFAULT_KEEP_ALIVE: u64 = 5_000;
pub const DEFAULT_ERROR_BUFFER_CAPACITY: usize = 64;
pub const MAX_ERROR_BUFFER_CAPACITY: usize = 65_536;

const ENV_PREFIX: &str = "MOCKAUTH_";

/// Configuration errors raised while loading or validating `CoreConfig`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An env override could not be parsed as an unsigned integer.
    InvalidEnvValue { key: String, value: String },
    /// JSON input was malformed or had wrongly typed fields.
    InvalidJson(String),
    /// Error channel must be able to hold at least one message.
    ZeroErrorBuffer,
    /// Error channel capacity above `MAX_ERROR_BUFFER_CAPACITY`.
    ErrorBufferTooLarge { capacity: u64 },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidEnvValue { key, value } => {
                write!(f, "invalid value `{value}` for `{key}`; expected unsigned integer")
            }
            Self::InvalidJson(message) => write!(f, "invalid config json: {message}"),
            Self::ZeroErrorBuffer => write!(f, "error_buffer_capacity must be at least 1"),
            Self::ErrorBufferTooLarge { capacity } => write!(
                f,
                "error_buffer_capacity {capacity} exceeds maximum {MAX_ERROR_BUFFER_CAPACITY}"
            ),
        }
    }
}

impl Error for ConfigError {}

/// Tunables for one backend instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Wall-clock milliseconds per simulated time unit. `0` disables latency.
    pub time_unit_ms: u64,
    pub sign_in_latency: u64,
    pub link_latency: u64,
    /// Wait before a never-seen key is seeded with default items.
    pub seed_latency: u64,
    /// Wait before an item update/delete is applied.
    pub item_write_latency: u64,
    /// Grace period an item feed stays subscribed after its last consumer leaves.
    pub keep_alive: u64,
    pub error_buffer_capacity: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            time_unit_ms: 1,
            sign_in_latency: DEFAULT_SIGN_IN_LATENCY,
            link_latency: DEFAULT_LINK_LATENCY,
            seed_latency: DEFAULT_SEED_LATENCY,
            item_write_latency: DEFAULT_ITEM_WRITE_LATENCY,
            keep_alive: DEFAULT_KEEP_ALIVE,
            error_buffer_capacity: DEFAULT_ERROR_BUFFER_CAPACITY,
        }
    }
}

impl CoreConfig {
    /// Parses a (possibly partial) JSON object; missing fields keep defaults.
    pub fn from_json(raw: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(raw).map_err(|err| ConfigError::InvalidJson(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `MOCKAUTH_*` environment overrides on top of defaults.
    ///
    /// Recognized keys: `MOCKAUTH_TIME_UNIT_MS`, `MOCKAUTH_SIGN_IN_LATENCY`,
    /// `MOCKAUTH_LINK_LATENCY`, `MOCKAUTH_SEED_LATENCY`,
    /// `MOCKAUTH_ITEM_WRITE_LATENCY`, `MOCKAUTH_KEEP_ALIVE`,
    /// `MOCKAUTH_ERROR_BUFFER_CAPACITY`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let read = |name: &str| -> Result<Option<u64>, ConfigError> {
            let key = format!("{ENV_PREFIX}{name}");
            match lookup(key.as_str()) {
                None => Ok(None),
                Some(raw) if raw.trim().is_empty() => Ok(None),
                Some(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .map(Some)
                    .map_err(|_| ConfigError::InvalidEnvValue { key, value: raw }),
            }
        };

        if let Some(value) = read("TIME_UNIT_MS")? {
            config.time_unit_ms = value;
        }
        if let Some(value) = read("SIGN_IN_LATENCY")? {
            config.sign_in_latency = value;
        }
        if let Some(value) = read("LINK_LATENCY")? {
            config.link_latency = value;
        }
        if let Some(value) = read("SEED_LATENCY")? {
            config.seed_latency = value;
        }
        if let Some(value) = read("ITEM_WRITE_LATENCY")? {
            config.item_write_latency = value;
        }
        if let Some(value) = read("KEEP_ALIVE")? {
            config.keep_alive = value;
        }
        if let Some(value) = read("ERROR_BUFFER_CAPACITY")? {
            config.error_buffer_capacity = usize::try_from(value)
                .map_err(|_| ConfigError::ErrorBufferTooLarge { capacity: value })?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.error_buffer_capacity == 0 {
            return Err(ConfigError::ZeroErrorBuffer);
        }
        if self.error_buffer_capacity > MAX_ERROR_BUFFER_CAPACITY {
            return Err(ConfigError::ErrorBufferTooLarge {
                capacity: self.error_buffer_capacity as u64,
            });
        }
        Ok(())
    }

    /// Converts a unit count into wall-clock time.
    pub fn units(&self, units: u64) -> Duration {
        Duration::from_millis(units.saturating_mul(self.time_unit_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CoreConfig, MAX_ERROR_BUFFER_CAPACITY};
    use std::collections::HashMap;
    use std::time::Duration;

    #[test]
    fn defaults_match_simulated_latencies() {
        let config = CoreConfig::default();
        assert_eq!(config.units(config.sign_in_latency), Duration::from_millis(500));
        assert_eq!(config.units(config.item_write_latency), Duration::from_millis(200));
        assert_eq!(config.units(config.keep_alive), Duration::from_secs(5));
        assert_eq!(config.error_buffer_capacity, 64);
    }

    #[test]
    fn from_json_keeps_defaults_for_missing_fields() {
        let config = CoreConfig::from_json(r#"{"time_unit_ms": 0, "keep_alive": 10}"#)
            .expect("partial json should parse");
        assert_eq!(config.time_unit_ms, 0);
        assert_eq!(config.keep_alive, 10);
        assert_eq!(config.seed_latency, 500);
        assert_eq!(config.units(config.seed_latency), Duration::ZERO);
    }

    #[test]
    fn from_json_rejects_zero_error_buffer() {
        let error = CoreConfig::from_json(r#"{"error_buffer_capacity": 0}"#)
            .expect_err("zero buffer must be rejected");
        assert_eq!(error, ConfigError::ZeroErrorBuffer);
    }

    #[test]
    fn oversized_error_buffer_is_rejected() {
        let error = CoreConfig::from_json(r#"{"error_buffer_capacity": 1000000}"#)
            .expect_err("oversized buffer must be rejected");
        assert_eq!(error, ConfigError::ErrorBufferTooLarge { capacity: 1_000_000 });

        let at_limit = format!(r#"{{"error_buffer_capacity": {MAX_ERROR_BUFFER_CAPACITY}}}"#);
        assert!(CoreConfig::from_json(&at_limit).is_ok());
    }

    #[test]
    fn env_oversized_error_buffer_is_rejected() {
        let error = CoreConfig::from_lookup(|key| {
            (key == "MOCKAUTH_ERROR_BUFFER_CAPACITY").then(|| u64::MAX.to_string())
        })
        .expect_err("oversized buffer must fail");
        assert!(matches!(error, ConfigError::ErrorBufferTooLarge { .. }));
    }

    #[test]
    fn from_json_reports_type_errors() {
        let error = CoreConfig::from_json(r#"{"keep_alive": "soon"}"#)
            .expect_err("string latency must be rejected");
        assert!(matches!(error, ConfigError::InvalidJson(_)));
    }

    #[test]
    fn env_overrides_apply_and_blank_values_are_ignored() {
        let vars = HashMap::from([
            ("MOCKAUTH_SEED_LATENCY".to_string(), "20".to_string()),
            ("MOCKAUTH_KEEP_ALIVE".to_string(), "  ".to_string()),
        ]);
        let config =
            CoreConfig::from_lookup(|key| vars.get(key).cloned()).expect("env should parse");
        assert_eq!(config.seed_latency, 20);
        assert_eq!(config.keep_alive, 5_000);
    }

    #[test]
    fn env_override_rejects_non_numeric_value() {
        let error = CoreConfig::from_lookup(|key| {
            (key == "MOCKAUTH_LINK_LATENCY").then(|| "fast".to_string())
        })
        .expect_err("non-numeric value must fail");
        assert!(error.to_string().contains("MOCKAUTH_LINK_LATENCY"));
    }
}
