//! Tracing and logging setup shared by the binaries.

/// Initialize process-wide logging in the given format.
///
/// Safe to call multiple times; subsequent calls become no-ops.
pub fn init(format: LogFormat) {
    tracing::init(format);
}

/// Tracing configuration (filters, layers).
pub mod tracing;

pub use crate::tracing::LogFormat;
