//! Read pump: single reader and demultiplexer.
//!
//! Repeatedly pulls responses off the transport and routes each one to the
//! matching completion slot. A response with no matching entry is discarded
//! silently (the caller timed out, cancelled, or never existed). A fatal
//! read error poisons the whole channel: every pending entry fails and the
//! multiplexer moves to Stopping, since demultiplexing cannot recover once
//! reads stop.

use std::sync::Arc;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use transport::{ReadHalf, TransportError};

use crate::lifecycle::StateCell;
use crate::pending::{Completion, PendingTable};

/// Run the pump until shutdown, a graceful drain completes, or the
/// transport dies. Returns the read half so a cancelled `start` can
/// reassemble the transport.
pub(crate) async fn run<R: ReadHalf>(
    mut reader: R,
    pending: Arc<PendingTable>,
    state: Arc<StateCell>,
    shutdown: CancellationToken,
    armed: oneshot::Sender<()>,
) -> R {
    let _ = armed.send(());
    tracing::debug!("read pump running");

    loop {
        match reader.read(shutdown.clone()).await {
            Ok(response) => {
                let id = response.id;
                match pending.take(id) {
                    Some(entry) => {
                        tracing::trace!(%id, "response delivered");
                        entry.resolve(Completion::Delivered(response));
                    }
                    None => {
                        tracing::debug!(%id, "response without matching request, discarding");
                    }
                }
                // a graceful stop ends once the last outstanding response
                // has been routed
                if state.is_stopping() && pending.is_empty() {
                    tracing::debug!("read pump drained");
                    break;
                }
            }
            Err(TransportError::Cancelled) => {
                if state.is_stopping() && pending.is_empty() {
                    tracing::debug!("read pump shut down after drain");
                } else {
                    let outstanding = pending.fail_all(Completion::Shutdown);
                    if outstanding > 0 {
                        tracing::debug!(outstanding, "read pump shut down, pending requests failed");
                    }
                }
                break;
            }
            Err(err) => {
                tracing::error!(error = %err, "transport read failed, channel is dead");
                pending.fail_all(Completion::TransportFailed(err));
                state.note_read_failure();
                break;
            }
        }
    }

    reader
}
