//! Write pump: single consumer of the submission queue.
//!
//! Requests reach the transport strictly in submission order. A failed
//! write resolves only that request's pending entry and the pump keeps
//! going; one bad request never tears down the multiplexer. The pump exits
//! when the queue is closed and drained (graceful stop) or when the
//! shutdown token fires (forced stop).

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use transport::{Request, TransportError, WriteHalf};

use crate::pending::{Completion, PendingTable};

/// Run the pump until the queue closes or shutdown fires. Returns the
/// write half so a cancelled `start` can reassemble the transport.
pub(crate) async fn run<W: WriteHalf>(
    mut writer: W,
    mut queue: mpsc::Receiver<Request>,
    pending: Arc<PendingTable>,
    shutdown: CancellationToken,
    armed: oneshot::Sender<()>,
) -> W {
    let _ = armed.send(());
    tracing::debug!("write pump running");

    loop {
        let request = tokio::select! {
            // forced stop bypasses whatever is still queued
            biased;
            _ = shutdown.cancelled() => {
                tracing::debug!("write pump shut down");
                break;
            }
            received = queue.recv() => match received {
                Some(request) => request,
                None => {
                    tracing::debug!("submission queue drained, write pump exiting");
                    break;
                }
            },
        };

        let id = request.id;
        tracing::trace!(%id, "writing request");
        match writer.write(request, shutdown.clone()).await {
            Ok(()) => {}
            Err(TransportError::Cancelled) => {
                tracing::debug!(%id, "write pump shut down mid-write");
                break;
            }
            Err(err) => {
                tracing::warn!(%id, error = %err, "write failed");
                if let Some(entry) = pending.take(id) {
                    entry.resolve(Completion::TransportFailed(err));
                }
            }
        }
    }

    writer
}
