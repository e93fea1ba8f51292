//! Process-wide tracing setup for job queue hosts.

pub mod tracing;

pub use self::tracing::LogFormat;

/// Initialize process-wide tracing in the format named by `LOG_FORMAT`
/// (`json` by default, or `pretty`).
///
/// Safe to call multiple times; subsequent calls are no-ops.
pub fn init() {
    self::tracing::init(LogFormat::from_env());
}

/// Initialize process-wide tracing with the given output format.
pub fn init_with(format: LogFormat) {
    self::tracing::init(format);
}
