//! Error types for cache operations.

use thiserror::Error;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Cache-specific errors.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Redis-specific error
    #[cfg(feature = "redis")]
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// HTTP fetch error
    #[cfg(feature = "http")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Stored bytes could not be decoded into the requested type
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Every generated key was already taken
    #[error("Key generation exhausted after {attempts} attempts")]
    KeyGenerationExhausted {
        /// Number of keys tried.
        attempts: u32,
    },

    /// Operation against a key holding the wrong kind of value
    #[error("Wrong type for key: {0}")]
    WrongType(String),

    /// Counter increment would overflow
    #[error("Increment would overflow counter: {0}")]
    Overflow(String),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation timeout
    #[error("Operation timeout")]
    Timeout,

    /// The wrapped fetch collaborator failed
    #[error("Fetch error: {0}")]
    Fetch(String),
}

impl CacheError {
    /// Check if this error indicates the store could not be reached.
    pub fn is_connection_error(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout => true,
            #[cfg(feature = "redis")]
            Self::Redis(e) => e.is_io_error() || e.is_connection_dropped(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Failure to turn raw stored bytes into a typed value.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Bytes are not valid UTF-8.
    #[error("value is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    /// Text is not an integer.
    #[error("value {0:?} is not an integer")]
    Integer(String),

    /// Text is not a floating point number.
    #[error("value {0:?} is not a float")]
    Float(String),

    /// Failure reported by a caller-supplied decoder.
    #[error("{0}")]
    Custom(String),
}
