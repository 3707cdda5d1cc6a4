//! Tracing setup for the CLI.
//!
//! `RUST_LOG` overrides the configured filter. `RUST_LOG_FORMAT=json`
//! switches to JSON lines. Output goes to stderr so command output on
//! stdout stays clean.

use anyhow::{anyhow, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber.
pub fn init(default_filter: &str) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .map_err(|e| anyhow!("invalid log filter '{default_filter}': {e}"))?;

    let json = std::env::var("RUST_LOG_FORMAT").is_ok_and(|f| f == "json");
    let registry = tracing_subscriber::registry().with(env_filter);

    let result = if json {
        registry
            .with(fmt::layer().with_writer(std::io::stderr).with_ansi(false).json())
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr).compact())
            .try_init()
    };
    result.map_err(|e| anyhow!("failed to initialize tracing: {e}"))
}
