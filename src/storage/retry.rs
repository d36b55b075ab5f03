//! Conflict retry configuration for the durable allocator.

use std::time::Duration;

use backon::ExponentialBuilder;

use crate::contracts::env::parse_or_default;

/// Configuration for retrying rolled-back increments with exponential backoff.
///
/// Only conflicts are retried. A conflict means the store rolled the
/// transaction back, so retrying cannot skip a counter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first try.
    pub max_retries: usize,
    /// Initial delay between retries in milliseconds.
    pub initial_delay_ms: u64,
    /// Maximum delay between retries in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 10,
            max_delay_ms: 200,
        }
    }
}

impl RetryConfig {
    /// Creates a RetryConfig from environment variables.
    ///
    /// Environment variables:
    /// - `TRACKSEQ_MAX_RETRIES`: Maximum retry attempts (default: 3)
    /// - `TRACKSEQ_RETRY_INITIAL_MS`: Initial backoff delay in ms (default: 10)
    /// - `TRACKSEQ_RETRY_MAX_MS`: Maximum backoff delay in ms (default: 200)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` but reads values through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let default = Self::default();
        Self {
            max_retries: parse_or_default(
                "TRACKSEQ_MAX_RETRIES",
                lookup("TRACKSEQ_MAX_RETRIES"),
                default.max_retries,
            ),
            initial_delay_ms: parse_or_default(
                "TRACKSEQ_RETRY_INITIAL_MS",
                lookup("TRACKSEQ_RETRY_INITIAL_MS"),
                default.initial_delay_ms,
            ),
            max_delay_ms: parse_or_default(
                "TRACKSEQ_RETRY_MAX_MS",
                lookup("TRACKSEQ_RETRY_MAX_MS"),
                default.max_delay_ms,
            ),
        }
    }

    /// Disables retries entirely.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Creates an exponential backoff builder with jitter.
    pub fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(self.initial_delay_ms))
            .with_max_delay(Duration::from_millis(self.max_delay_ms))
            .with_max_times(self.max_retries)
            .with_jitter()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.initial_delay_ms, 10);
        assert_eq!(config.max_delay_ms, 200);
    }

    #[test]
    fn test_lookup_with_defaults() {
        let config = RetryConfig::from_lookup(|_| None);
        assert_eq!(config, RetryConfig::default());
    }

    #[test]
    fn test_lookup_with_custom_values() {
        let config = RetryConfig::from_lookup(lookup_from(&[
            ("TRACKSEQ_MAX_RETRIES", "5"),
            ("TRACKSEQ_RETRY_INITIAL_MS", "20"),
            ("TRACKSEQ_RETRY_MAX_MS", "1000"),
        ]));
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.initial_delay_ms, 20);
        assert_eq!(config.max_delay_ms, 1000);
    }

    #[test]
    fn test_lookup_ignores_invalid_values() {
        let config = RetryConfig::from_lookup(lookup_from(&[
            ("TRACKSEQ_MAX_RETRIES", "not_a_number"),
            ("TRACKSEQ_RETRY_INITIAL_MS", ""),
            ("TRACKSEQ_RETRY_MAX_MS", "-100"),
        ]));
        assert_eq!(config, RetryConfig::default());
    }

    #[test]
    fn test_none_disables_retries() {
        assert_eq!(RetryConfig::none().max_retries, 0);
    }
}
