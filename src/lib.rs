// Tally - caching and call instrumentation over Redis
//
// This library stores values under unique keys, counts and records calls to
// instrumented operations for replay, and memoizes expensive fetches.

// Re-export core functionality
pub use tally_cache::*;

// Re-export logging setup
pub use tally_log as log;

/// Install the global `tracing` subscriber from `TALLY_*` environment variables.
///
/// Returns `false` if a subscriber was already installed.
pub fn init_logging() -> bool {
    tally_log::init()
}

// Prelude for common imports
pub mod prelude {
    pub use tally_cache::prelude::*;
    pub use tally_log::{Format as LogFormat, Level as LogLevel, LogConfig};
}
