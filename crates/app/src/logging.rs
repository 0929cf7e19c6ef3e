//! Tracing subscriber setup.

use anyhow::anyhow;
use cohortsync_domain::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured level. Logs go to stderr so stdout
/// stays free for the outbound event stream.
pub fn init(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|err| anyhow!("invalid log filter '{}': {err}", config.level))?;

    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr);

    let installed = if config.json {
        builder.json().with_current_span(false).try_init()
    } else {
        builder.with_target(false).try_init()
    };

    installed.map_err(|err| anyhow!("failed to install tracing subscriber: {err}"))
}
