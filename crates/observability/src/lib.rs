//! Process-wide logging setup for hosts embedding the ledger engine.

/// Tracing subscriber configuration (filters, formatting).
pub mod tracing;

/// Initialize structured logging with the default `info` filter.
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init_with_default(tracing::DEFAULT_FILTER);
}
