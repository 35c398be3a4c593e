//! Tracing and logging setup shared by ledger processes.

/// Initialize process-wide tracing from `RUST_LOG` (default `info`).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Initialize process-wide tracing with an explicit filter directive,
/// e.g. the `log_filter` of the ledger configuration.
pub fn init_with_filter(directive: &str) {
    tracing::init_with_filter(directive);
}

/// Subscriber configuration (filters, formatting).
pub mod tracing;
