//! Tally Logging
//!
//! Installs a [`tracing`] subscriber configured from `TALLY_*` environment
//! variables. The tally crates emit their events through `tracing`; this
//! crate only decides where and how they are written.
//!
//! # Usage
//!
//! ```rust
//! // Reads the environment and installs a global subscriber once.
//! tally_log::init();
//!
//! tracing::info!(port = 6379, "Connecting");
//! ```
//!
//! # Environment Variables
//!
//! - `TALLY_DEBUG=1` - Enable debug logging
//! - `TALLY_LOG_LEVEL=trace|debug|info|warn|error|off` - Set log level
//! - `TALLY_LOG_FORMAT=pretty|compact|json` - Set output format
//! - `TALLY_LOG_COLOR=1|0` - Enable/disable colors
//!
//! `RUST_LOG`, when set, overrides the level with a full filter directive.

use std::fmt;
use std::str::FromStr;
use tracing_subscriber::EnvFilter;

// ============================================================================
// Log Levels
// ============================================================================

/// Minimum level of events written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    /// Trace level (most verbose)
    Trace,
    /// Debug level
    Debug,
    /// Info level
    Info,
    /// Warning level
    Warn,
    /// Error level (least verbose)
    Error,
    /// Off (no logging)
    Off,
}

impl Level {
    /// The level as a filter directive.
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Off => "off",
        }
    }
}

impl FromStr for Level {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(Level::Trace),
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            "off" | "none" => Ok(Level::Off),
            _ => Err(ParseError(s.to_string())),
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Log Format
// ============================================================================

/// Output format for log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Multi-line, human oriented
    Pretty,
    /// Compact single-line format
    Compact,
    /// JSON format for structured logging
    Json,
}

impl FromStr for Format {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Format::Pretty),
            "compact" => Ok(Format::Compact),
            "json" => Ok(Format::Json),
            _ => Err(ParseError(s.to_string())),
        }
    }
}

/// Unrecognized level or format name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError(String);

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognized logging option: {:?}", self.0)
    }
}

impl std::error::Error for ParseError {}

// ============================================================================
// Configuration
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Whether debug mode is enabled
    pub debug: bool,
    /// Minimum log level
    pub level: Level,
    /// Output format
    pub format: Format,
    /// Whether colors are enabled
    pub color: bool,
    /// Whether to include the event target
    pub targets: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            debug: false,
            level: Level::Info,
            format: Format::Json,
            color: false, // JSON output doesn't use colors
            targets: true,
        }
    }
}

impl LogConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Create config through an arbitrary variable lookup.
    ///
    /// Unparseable values fall back to the defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |name: &str| {
            lookup(name).map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        };

        let debug = flag("TALLY_DEBUG").unwrap_or(false);

        let level = lookup("TALLY_LOG_LEVEL")
            .and_then(|s| s.parse().ok())
            .unwrap_or(if debug { Level::Debug } else { Level::Info });

        let format = lookup("TALLY_LOG_FORMAT")
            .and_then(|s| s.parse().ok())
            .unwrap_or(Format::Json);

        let color = flag("TALLY_LOG_COLOR")
            .unwrap_or_else(|| format != Format::Json && lookup("NO_COLOR").is_none());

        Self {
            debug,
            level,
            format,
            color,
            targets: true,
        }
    }

    /// Set the level.
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set the format.
    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    /// Enable or disable colors.
    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// Filter for this configuration; `RUST_LOG` wins when set.
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.level.as_str()))
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Install the global subscriber configured from the environment.
///
/// Returns `false` if a global subscriber was already installed, in which
/// case the existing one is left in place.
pub fn init() -> bool {
    init_with(&LogConfig::from_env())
}

/// Install the global subscriber for `config`.
pub fn init_with(config: &LogConfig) -> bool {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(config.env_filter())
        .with_ansi(config.color)
        .with_target(config.targets)
        .with_writer(std::io::stderr);

    let installed = match config.format {
        Format::Json => builder.json().try_init(),
        Format::Compact => builder.compact().try_init(),
        Format::Pretty => builder.pretty().try_init(),
    };

    installed.is_ok()
}

// ============================================================================
// Tests
// ============================================================================
