use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize logging for a refguard process.
///
/// Filtering defaults to `info` (or `debug` with `verbose`) and can be
/// overridden via `RUST_LOG`. Output is a compact console layer; service
/// deployments that want JSON lines set `REFGUARD_LOG_JSON=1`.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let json = std::env::var("REFGUARD_LOG_JSON").map(|v| v == "1").unwrap_or(false);

    if json {
        let layer = fmt::layer()
            .json()
            .with_current_span(false)
            .with_span_list(false)
            .with_target(false)
            .with_ansi(false);
        tracing_subscriber::registry().with(env_filter).with(layer).init();
    } else {
        let layer = fmt::layer().with_target(false);
        tracing_subscriber::registry().with(env_filter).with(layer).init();
    }
}
