// Diagnostic logging via tracing
//
// Output goes to stderr. Stdout carries protocol responses and must stay
// clean, so nothing here ever writes to it.
//
// Activation:
//   - Environment variable: RUST_LOG=debug (or trace)
//   - CLI flag: --debug
//   - Config file: logging.level

use tracing_subscriber::EnvFilter;

const DEFAULT_LEVEL: &str = "info";

/// Build the level filter.
///
/// Priority: RUST_LOG env var > `--debug` > config level > "info".
pub fn env_filter(debug_flag: bool, config_level: Option<&str>) -> EnvFilter {
    if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if debug_flag {
        EnvFilter::new("debug")
    } else if let Some(level) = config_level {
        EnvFilter::new(level)
    } else {
        EnvFilter::new(DEFAULT_LEVEL)
    }
}

/// Install the global subscriber. Call once, before any work starts.
pub fn init(debug_flag: bool, config_level: Option<&str>) -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter(debug_flag, config_level))
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(true)
        .compact()
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialise logging: {e}"))?;

    tracing::debug!(
        app = env!("CARGO_PKG_NAME"),
        version = env!("CARGO_PKG_VERSION"),
        "Logging initialised"
    );
    Ok(())
}
