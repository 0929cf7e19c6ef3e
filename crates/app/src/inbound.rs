//! Newline-delimited JSON intake.
//!
//! Each line is one [`InboundEvent`]. Blank lines are ignored; lines that do
//! not decode are logged and counted, never fatal.

use cohortsync_domain::{CohortSyncError, InboundEvent, Result};
use cohortsync_infra::events::InboundDispatcher;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, warn};

/// Totals for one pump run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PumpReport {
    pub dispatched: u64,
    pub malformed: u64,
}

/// Decode a single line. `None` for blank lines.
pub fn parse_line(line: &str) -> Option<serde_json::Result<InboundEvent>> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(serde_json::from_str(trimmed))
}

/// Feed every event from `reader` into the dispatcher until EOF.
pub async fn pump<R>(reader: R, dispatcher: &InboundDispatcher) -> Result<PumpReport>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut report = PumpReport::default();
    let mut line_no: u64 = 0;

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|err| CohortSyncError::Internal(format!("inbound stream read failed: {err}")))?
    {
        line_no += 1;
        match parse_line(&line) {
            None => {}
            Some(Ok(event)) => {
                dispatcher.dispatch(event).await?;
                report.dispatched += 1;
            }
            Some(Err(err)) => {
                report.malformed += 1;
                warn!(line = line_no, error = %err, "skipping malformed inbound event");
            }
        }
    }

    debug!(dispatched = report.dispatched, malformed = report.malformed, "inbound stream closed");
    Ok(report)
}
