//! Tracing and logging setup shared by the binaries.

/// Initialize tracing, falling back to `default_filter` when `RUST_LOG` is
/// unset or invalid.
pub fn init_with_default(default_filter: &str) {
    tracing::init_with_default(default_filter);
}

/// Tracing configuration (filters, layers).
pub mod tracing;
