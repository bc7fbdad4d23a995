//! Structured logging bootstrap, ported from the teacher's `main.rs`
//! `tracing_subscriber::fmt().with_env_filter(...)` setup.

use tracing_subscriber::{fmt, EnvFilter};

/// Installs a global `tracing` subscriber. Reads `RUST_LOG` for the filter,
/// defaulting to `info` when unset. Safe to call once at process startup;
/// subsequent calls are ignored.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(true).try_init();
}
