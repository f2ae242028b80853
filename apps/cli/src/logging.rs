//! Logging initialization for the `dstu2` binary
//!
//! Logs go to stderr so command output on stdout stays machine-readable.
//! `RUST_LOG` overrides the configured level.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogConfig;

/// Crates whose targets follow the configured level
const TARGETS: &[&str] = &[
    "dstu2",
    "dstu2_cli",
    "dstu2_models",
    "dstu2_store",
    "dstu2_codegen",
];

/// Install the global subscriber
pub fn init_logging(config: &LogConfig) -> anyhow::Result<()> {
    let subscriber = tracing_subscriber::registry().with(build_env_filter(config));

    if config.json {
        let layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_writer(std::io::stderr);
        subscriber.with(layer).try_init()?;
    } else {
        let layer = fmt::layer().with_target(true).with_writer(std::io::stderr);
        subscriber.with(layer).try_init()?;
    }

    Ok(())
}

fn build_env_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter_directives(config)))
}

fn filter_directives(config: &LogConfig) -> String {
    TARGETS
        .iter()
        .map(|target| format!("{}={}", target, config.level))
        .collect::<Vec<_>>()
        .join(",")
}
