//! Environment-driven configuration for idempotency behaviour.

use std::time::Duration;

/// Environment variable controlling the stored-response TTL in seconds.
pub const IDEMPOTENCY_TTL_SECS_ENV: &str = "IDEMPOTENCY_TTL_SECS";

/// Environment abstraction for idempotency configuration lookups.
///
/// Lets tests supply values without unsafe process-environment mutation.
pub trait IdempotencyEnv {
    /// Fetch a string value by name.
    fn string(&self, name: &str) -> Option<String>;
}

/// Environment access backed by the real process environment.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProcessEnv;

impl IdempotencyEnv for ProcessEnv {
    fn string(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

/// TTL configuration for stored idempotency responses.
///
/// # Example
///
/// ```
/// # use backend::domain::idempotency::IdempotencyConfig;
/// # use std::time::Duration;
/// let config = IdempotencyConfig::default();
/// assert_eq!(config.ttl(), Duration::from_secs(3600));
/// ```
#[derive(Debug, Clone)]
pub struct IdempotencyConfig {
    ttl: Duration,
}

impl IdempotencyConfig {
    /// Default TTL: one hour, long enough for client retry loops.
    const DEFAULT_TTL_SECS: u64 = 3600;

    /// Floor preventing records from expiring before a retry can land.
    const MIN_TTL_SECS: u64 = 60;

    /// Ceiling preventing unbounded ledger growth (30 days).
    const MAX_TTL_SECS: u64 = 30 * 24 * 3600;

    /// Load configuration from the real process environment.
    pub fn from_env() -> Self {
        Self::from_env_with(&ProcessEnv)
    }

    /// Load configuration from a custom environment source.
    pub fn from_env_with(env: &impl IdempotencyEnv) -> Self {
        let secs = env
            .string(IDEMPOTENCY_TTL_SECS_ENV)
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(Self::DEFAULT_TTL_SECS)
            .clamp(Self::MIN_TTL_SECS, Self::MAX_TTL_SECS);
        Self {
            ttl: Duration::from_secs(secs),
        }
    }

    /// Create with an explicit TTL (for tests).
    pub fn with_ttl(ttl: Duration) -> Self {
        Self { ttl }
    }

    /// Configured TTL for stored responses.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}

impl Default for IdempotencyConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(Self::DEFAULT_TTL_SECS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::collections::HashMap;

    struct MapEnv(HashMap<&'static str, &'static str>);

    impl IdempotencyEnv for MapEnv {
        fn string(&self, name: &str) -> Option<String> {
            self.0.get(name).map(|value| (*value).to_string())
        }
    }

    #[rstest]
    #[case::absent(None, 3600)]
    #[case::explicit(Some("7200"), 7200)]
    #[case::below_floor(Some("5"), 60)]
    #[case::garbage(Some("soon"), 3600)]
    fn ttl_parsing_and_clamping(#[case] raw: Option<&'static str>, #[case] expected_secs: u64) {
        let mut vars = HashMap::new();
        if let Some(raw) = raw {
            vars.insert(IDEMPOTENCY_TTL_SECS_ENV, raw);
        }
        let config = IdempotencyConfig::from_env_with(&MapEnv(vars));
        assert_eq!(config.ttl(), Duration::from_secs(expected_secs));
    }
}
