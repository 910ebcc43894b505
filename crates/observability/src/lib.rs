//! Tracing/logging setup shared by ledger binaries.

pub mod subscriber;

pub use subscriber::LogFormat;

/// Initialize process-wide tracing/logging from the environment.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    subscriber::init(LogFormat::from_env());
}
