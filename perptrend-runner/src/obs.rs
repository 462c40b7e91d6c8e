//! Tracing initialisation for long-running modes.

/// Install the global subscriber. `PERPTREND_LOG` overrides the default
/// filter (e.g. `PERPTREND_LOG=perptrend_runner=debug`).
pub fn init_tracing(default_filter: &str) -> Result<(), String> {
    let filter = std::env::var("PERPTREND_LOG").unwrap_or_else(|_| default_filter.to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(filter)
        .map_err(|err| format!("invalid log filter: {err}"))?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .try_init()
        .map_err(|err| format!("failed to install tracing subscriber: {err}"))
}
