use std::fs::OpenOptions;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;
use crate::error::Result;

/// Install the global subscriber: one layer on stdout, one appending to
/// the configured log file. `RUST_LOG` overrides the configured level;
/// the `DEBUG` flag forces `debug`.
pub fn init(config: &Config) -> Result<()> {
    let level = if config.debug {
        "debug"
    } else {
        config.log_level.as_str()
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.log_file)?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(false))
        .with(fmt::layer().with_writer(log_file).with_ansi(false))
        .init();

    Ok(())
}
