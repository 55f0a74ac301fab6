//! Logging utilities for Seesaw Rust components.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize tracing with sensible defaults.
///
/// Uses the RUST_LOG environment variable to control log levels.
/// Default level is INFO.
pub fn init() {
    init_with_level("info");
}

/// Initialize tracing, falling back to `level` when RUST_LOG is unset.
pub fn init_with_level(level: &str) {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(env_filter(level))
        .init();
}

/// Initialize tracing with JSON formatting (useful for structured logging).
pub fn init_json() {
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(env_filter("info"))
        .init();
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}
