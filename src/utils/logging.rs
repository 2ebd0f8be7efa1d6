//! Tracing subscriber setup.

use super::toml_config::{LogFormat, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter from `RUST_LOG` when set, otherwise the configured level for this
/// crate and `tower_http`.
pub fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::try_new(format!("careflow={level},careflow_server={level},tower_http={level}"))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    })
}

/// Install the global subscriber. Safe to call twice; the second call is a
/// no-op.
pub fn init_tracing(server: &ServerConfig, verbose: bool) {
    let level = if verbose { "debug" } else { server.log_level.as_str() };
    let registry = tracing_subscriber::registry().with(build_filter(level));

    let result = match server.log_format {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(false),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(tracing_subscriber::fmt::layer().with_target(true))
            .try_init(),
    };

    if result.is_ok() {
        tracing::debug!("Logging initialised at '{}' ({:?})", level, server.log_format);
    }
}
