//! Logging bootstrap for bridge binaries and tests.

use crate::error::CoreError;

/// Install the global logger at the configured level.
///
/// Raw packet traffic sits at `trace` in the wire layer, so
/// `RUST_LOG=iris_transport=trace` (via `IRIS__GLOBAL__LOG_LEVEL` or the
/// environment) is the switch for full protocol dumps. The actor and IO
/// runtimes are capped at `info` regardless, since their debug output
/// drowns everything else.
#[cfg(feature = "env_logger")]
pub fn init(level: &str) -> Result<(), CoreError> {
    use std::str::FromStr;

    use log::LevelFilter;

    let level = LevelFilter::from_str(level).unwrap_or(LevelFilter::Info);
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    for runtime_module in ["actix", "mio", "tokio"] {
        builder.filter_module(runtime_module, level.min(LevelFilter::Info));
    }
    builder
        .try_init()
        .map_err(|e| CoreError::LoggingSetup(e.to_string()))
}

/// Without the `env_logger` feature the embedding application owns the
/// logger and this does nothing.
#[cfg(not(feature = "env_logger"))]
pub fn init(_level: &str) -> Result<(), CoreError> {
    Ok(())
}
