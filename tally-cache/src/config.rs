//! Cache configuration types.

use crate::error::{CacheError, CacheResult};
use std::time::Duration;

/// Default lifetime of a memoized fetch response.
pub const DEFAULT_FETCH_TTL: Duration = Duration::from_secs(10);

/// Longest accepted fetch TTL (one year).
pub const MAX_FETCH_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Default number of keys tried before giving up on a store.
pub const DEFAULT_MAX_KEY_ATTEMPTS: u32 = 8;

/// Cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Connection URL
    pub url: String,

    /// Lifetime of memoized fetch responses
    pub fetch_ttl: Duration,

    /// Upper bound on generated keys per store call
    pub max_key_attempts: u32,

    /// Clear the store when the service is opened
    pub flush_on_start: bool,

    /// Connection timeout
    pub connection_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            fetch_ttl: DEFAULT_FETCH_TTL,
            max_key_attempts: DEFAULT_MAX_KEY_ATTEMPTS,
            flush_on_start: true,
            connection_timeout: Duration::from_secs(5),
        }
    }
}

impl CacheConfig {
    /// Create a new configuration for the given store URL.
    ///
    /// # Examples
    ///
    /// ```
    /// use tally_cache::CacheConfig;
    ///
    /// let config = CacheConfig::redis("redis://localhost:6379");
    /// assert!(config.flush_on_start);
    /// ```
    pub fn redis(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Load configuration from environment variables.
    ///
    /// - `TALLY_REDIS_URL` (falls back to `REDIS_URL`)
    /// - `TALLY_FETCH_TTL_SECS`
    /// - `TALLY_MAX_KEY_ATTEMPTS`
    /// - `TALLY_FLUSH_ON_START`
    /// - `TALLY_CONNECT_TIMEOUT_SECS`
    pub fn from_env() -> CacheResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> CacheResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("TALLY_REDIS_URL").or_else(|| lookup("REDIS_URL")) {
            config.url = url;
        }

        if let Some(secs) = lookup("TALLY_FETCH_TTL_SECS") {
            config.fetch_ttl = Duration::from_secs(parse_number("TALLY_FETCH_TTL_SECS", &secs)?);
        }

        if let Some(attempts) = lookup("TALLY_MAX_KEY_ATTEMPTS") {
            config.max_key_attempts = parse_number("TALLY_MAX_KEY_ATTEMPTS", &attempts)?;
        }

        if let Some(flag) = lookup("TALLY_FLUSH_ON_START") {
            config.flush_on_start = flag == "1" || flag.eq_ignore_ascii_case("true");
        }

        if let Some(secs) = lookup("TALLY_CONNECT_TIMEOUT_SECS") {
            config.connection_timeout =
                Duration::from_secs(parse_number("TALLY_CONNECT_TIMEOUT_SECS", &secs)?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Set the fetch TTL.
    pub fn with_fetch_ttl(mut self, ttl: Duration) -> Self {
        self.fetch_ttl = ttl;
        self
    }

    /// Set the key generation attempt budget.
    pub fn with_max_key_attempts(mut self, attempts: u32) -> Self {
        self.max_key_attempts = attempts;
        self
    }

    /// Enable or disable flushing the store on open.
    pub fn with_flush_on_start(mut self, flush: bool) -> Self {
        self.flush_on_start = flush;
        self
    }

    /// Set the connection timeout.
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Reject settings the service cannot work with.
    pub fn validate(&self) -> CacheResult<()> {
        if self.max_key_attempts == 0 {
            return Err(CacheError::Config(
                "max_key_attempts must be at least 1".to_string(),
            ));
        }
        if self.fetch_ttl.is_zero() {
            return Err(CacheError::Config("fetch_ttl must be non-zero".to_string()));
        }
        if self.fetch_ttl > MAX_FETCH_TTL {
            return Err(CacheError::Config(format!(
                "fetch_ttl must be at most {}s, got {}s",
                MAX_FETCH_TTL.as_secs(),
                self.fetch_ttl.as_secs()
            )));
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(name: &str, raw: &str) -> CacheResult<T> {
    raw.trim()
        .parse()
        .map_err(|_| CacheError::Config(format!("{name} must be a number, got {raw:?}")))
}
