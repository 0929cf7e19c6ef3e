//! CohortSync - participant lifecycle synchronizer
//!
//! Reads inbound events as NDJSON on stdin, writes bus events as NDJSON on
//! stdout and runs the scheduled genomics and retry jobs until Ctrl-C.

use anyhow::Context;
use cohortsync_app::{inbound, logging, outbound, AppContext};
use cohortsync_infra::config;
use tokio::io::BufReader;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file before reading config
    let dotenv = dotenvy::dotenv();

    let config = config::load().context("failed to load configuration")?;
    logging::init(&config.logging)?;

    match dotenv {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(err) => info!(reason = %err, "no .env file loaded"),
    }

    let mut ctx = AppContext::new(config).await.context("failed to initialise application")?;

    // The bus refuses events without a subscriber, so the writer goes first.
    let cancel = CancellationToken::new();
    let writer = outbound::spawn_writer(ctx.bus.subscribe(), tokio::io::stdout(), cancel.clone());

    ctx.start().await.context("failed to start application")?;
    info!(jobs = ?ctx.job_names(), "cohortsync running");

    let stdin = BufReader::new(tokio::io::stdin());
    let dispatcher = ctx.dispatcher()?;
    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for ctrl-c")?;
            info!("ctrl-c received");
        }
        pumped = inbound::pump(stdin, dispatcher) => {
            match pumped {
                Ok(report) => info!(
                    dispatched = report.dispatched,
                    malformed = report.malformed,
                    "stdin closed; waiting for ctrl-c"
                ),
                Err(err) => warn!(error = %err, "inbound stream failed; waiting for ctrl-c"),
            }
            tokio::signal::ctrl_c().await.context("failed to listen for ctrl-c")?;
        }
    }

    ctx.shutdown().await?;
    cancel.cancel();
    let written = writer.await.context("outbound writer panicked")?;
    info!(written, "cohortsync stopped");
    Ok(())
}
