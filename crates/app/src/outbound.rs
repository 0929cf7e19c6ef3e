//! Bus subscriber that writes every outbound event as one JSON line.

use cohortsync_domain::OutboundEvent;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

/// Spawn the writer. It stops when `cancel` fires or the bus closes.
///
/// Subscribe before anything publishes; the bus rejects events nobody
/// listens to.
pub fn spawn_writer<W>(
    mut events: broadcast::Receiver<OutboundEvent>,
    mut sink: W,
    cancel: CancellationToken,
) -> JoinHandle<u64>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut written: u64 = 0;
        loop {
            let event = tokio::select! {
                () = cancel.cancelled() => break,
                next = events.recv() => match next {
                    Ok(event) => event,
                    Err(RecvError::Lagged(missed)) => {
                        warn!(missed, "outbound writer lagged behind the bus");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                },
            };

            let mut line = match serde_json::to_vec(&event) {
                Ok(line) => line,
                Err(err) => {
                    error!(topic = %event.topic, error = %err, "cannot encode outbound event");
                    continue;
                }
            };
            line.push(b'\n');

            if let Err(err) = sink.write_all(&line).await {
                error!(error = %err, "outbound sink closed");
                break;
            }
            if let Err(err) = sink.flush().await {
                error!(error = %err, "outbound sink flush failed");
                break;
            }
            written += 1;
        }
        debug!(written, "outbound writer stopped");
        written
    })
}
