//! Tracing/logging setup shared by storefront binaries and tests.

pub mod subscriber;

pub use subscriber::LogFormat;

/// Initialize process-wide logging.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    subscriber::init(LogFormat::from_env());
}

/// Compact, test-captured logs. Call at the top of a test.
pub fn init_for_tests() {
    subscriber::init_for_tests();
}
