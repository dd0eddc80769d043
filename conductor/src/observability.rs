//! Tracing init for the harness binary, reading `conductor_core::config::ObservabilityConfig`.

use conductor_core::config::ObservabilityConfig;
use tracing_subscriber::{EnvFilter, prelude::*};

/// Initializes the global tracing subscriber. Call once at process startup.
pub fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("conductor={}", config.log_level)));

    let registry = tracing_subscriber::registry().with(filter);
    if config.log_json {
        let _ = registry.with(tracing_subscriber::fmt::layer().json().with_target(true)).try_init();
    } else {
        let _ = registry.with(tracing_subscriber::fmt::layer().with_target(false)).try_init();
    }
}
