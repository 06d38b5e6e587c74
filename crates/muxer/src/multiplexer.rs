//! The multiplexer facade.
//!
//! Owns the pending table, the submission queue, and the two pump tasks,
//! and wires per-request deadlines and cancellation into `send`.

use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use transport::{Request, Response, Transport};

use crate::config::Config;
use crate::error::Error;
use crate::lifecycle::{Lifecycle, StateCell};
use crate::pending::{Completion, PendingGuard, PendingTable};
use crate::{read_pump, write_pump};

struct PumpHandles<T: Transport> {
    shutdown: CancellationToken,
    write: JoinHandle<T::Writer>,
    read: JoinHandle<T::Reader>,
}

struct Inner<T: Transport> {
    config: Config,
    state: Arc<StateCell>,
    pending: Arc<PendingTable>,
    /// Present while Created; the halves travel with the pumps once armed.
    transport: Mutex<Option<(T::Reader, T::Writer)>>,
    /// Present while Running; taken by `stop` to close the queue.
    submit_tx: Mutex<Option<mpsc::Sender<Request>>>,
    pumps: Mutex<Option<PumpHandles<T>>>,
}

/// Fans many concurrent request/response exchanges out over one shared
/// full-duplex transport.
///
/// The handle is cheap to clone; all clones drive the same connection.
/// Callers submit with [`send`](Multiplexer::send) from as many tasks as
/// they like, and each receives exactly the response matching its request
/// identifier, regardless of the order the peer answers in.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use muxer::{Config, Multiplexer};
/// use tokio_util::sync::CancellationToken;
/// use transport::{testing, Request};
///
/// # async fn demo() -> Result<(), muxer::Error> {
/// let (channel, peer) = testing::channel();
/// testing::spawn_echo(peer);
///
/// let never = CancellationToken::new();
/// let mux = Multiplexer::new(channel, Config::new(Duration::from_secs(5))?);
/// mux.start(&never).await?;
///
/// let response = mux.send(Request::new(1u64, "ping".as_bytes()), &never).await?;
/// assert_eq!(response.id, 1u64.into());
///
/// mux.stop(&never).await?;
/// # Ok(())
/// # }
/// ```
pub struct Multiplexer<T: Transport> {
    inner: Arc<Inner<T>>,
}

impl<T: Transport> Clone for Multiplexer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Transport> Multiplexer<T> {
    /// Wrap a transport. The instance starts in [`Lifecycle::Created`];
    /// call [`start`](Multiplexer::start) before submitting.
    pub fn new(transport: T, config: Config) -> Self {
        let (reader, writer) = transport.into_split();
        Self {
            inner: Arc::new(Inner {
                config,
                state: Arc::new(StateCell::new()),
                pending: Arc::new(PendingTable::new()),
                transport: Mutex::new(Some((reader, writer))),
                submit_tx: Mutex::new(None),
                pumps: Mutex::new(None),
            }),
        }
    }

    /// Current lifecycle state.
    pub fn lifecycle(&self) -> Lifecycle {
        self.inner.state.lifecycle()
    }

    /// Launch both pumps and transition Created → Running.
    ///
    /// Completes once both pumps are armed and consuming. Fails with
    /// [`Error::InvalidLifecycle`] on a non-Created instance, and with
    /// [`Error::Cancelled`] if `cancel` fires first; in that case the
    /// instance returns to Created with no side effects and may be
    /// started again.
    pub async fn start(&self, cancel: &CancellationToken) -> Result<(), Error> {
        let inner = &*self.inner;
        inner.state.begin_start()?;

        let Some((reader, writer)) = inner.transport.lock().unwrap().take() else {
            // a previous arming lost the halves with a dying pump; the
            // instance cannot run again
            inner.state.force_stopped();
            return Err(Error::InvalidLifecycle(Lifecycle::Stopped));
        };

        let shutdown = CancellationToken::new();
        let (submit_tx, submit_rx) = mpsc::channel(inner.config.submission_capacity());
        let (write_armed_tx, write_armed) = oneshot::channel();
        let (read_armed_tx, read_armed) = oneshot::channel();

        let write = tokio::spawn(write_pump::run(
            writer,
            submit_rx,
            Arc::clone(&inner.pending),
            shutdown.clone(),
            write_armed_tx,
        ));
        let read = tokio::spawn(read_pump::run(
            reader,
            Arc::clone(&inner.pending),
            Arc::clone(&inner.state),
            shutdown.clone(),
            read_armed_tx,
        ));

        let armed = async move {
            write_armed.await?;
            read_armed.await?;
            Ok::<_, oneshot::error::RecvError>(())
        };

        tokio::select! {
            // an already-cancelled token must win over instant arming
            biased;
            _ = cancel.cancelled() => {
                shutdown.cancel();
                // reclaim the halves so a later start can try again
                match (read.await, write.await) {
                    (Ok(reader), Ok(writer)) => {
                        *inner.transport.lock().unwrap() = Some((reader, writer));
                        inner.state.abort_start();
                    }
                    _ => inner.state.force_stopped(),
                }
                Err(Error::Cancelled)
            }
            result = armed => match result {
                Ok(()) => {
                    *inner.submit_tx.lock().unwrap() = Some(submit_tx);
                    *inner.pumps.lock().unwrap() = Some(PumpHandles { shutdown, write, read });
                    inner.state.finish_start();
                    tracing::debug!("multiplexer running");
                    Ok(())
                }
                Err(_) => {
                    shutdown.cancel();
                    let _ = write.await;
                    let _ = read.await;
                    inner.state.force_stopped();
                    Err(Error::Shutdown)
                }
            },
        }
    }

    /// Submit a request and await its response.
    ///
    /// Thread-safe; any number of tasks may call this concurrently. The
    /// request identifier must not collide with one currently in flight.
    /// The per-request deadline starts now, not when the bytes reach the
    /// wire. Three triggers race the response: the caller's `cancel`, the
    /// deadline, and multiplexer shutdown; whichever fires first decides
    /// the outcome.
    ///
    /// A cancelled request may still reach the peer; only this call's
    /// termination is guaranteed. Any late response for it is discarded.
    pub async fn send(
        &self,
        request: Request,
        cancel: &CancellationToken,
    ) -> Result<Response, Error> {
        let inner = &*self.inner;
        inner.state.ensure_running()?;

        let id = request.id;
        let deadline = Instant::now() + inner.config.request_timeout();
        let mut slot = inner.pending.insert(id)?;
        // reclaims the entry if this future is dropped before any
        // resolver wins; a no-op otherwise
        let _guard = PendingGuard::new(&inner.pending, id);

        let submit_tx = inner.submit_tx.lock().unwrap().clone();
        let Some(submit_tx) = submit_tx else {
            let _ = inner.pending.take(id);
            return Err(Error::Shutdown);
        };

        let expired = sleep_until(deadline);
        tokio::pin!(expired);

        tracing::trace!(%id, "submitting request");
        let permit = tokio::select! {
            reserved = submit_tx.reserve() => match reserved {
                Ok(permit) => permit,
                Err(_) => {
                    let _ = inner.pending.take(id);
                    return Err(Error::Shutdown);
                }
            },
            resolved = &mut slot => {
                // shutdown or a write-side failure can resolve the slot
                // while the queue is still full
                return finish(resolved.ok());
            }
            _ = cancel.cancelled() => {
                let _ = inner.pending.take(id);
                return Err(Error::Cancelled);
            }
            () = &mut expired => {
                let _ = inner.pending.take(id);
                return Err(Error::TimedOut);
            }
        };
        permit.send(request);
        tracing::trace!(%id, "request enqueued");

        let completion = tokio::select! {
            resolved = &mut slot => resolved.ok(),
            _ = cancel.cancelled() => {
                match inner.pending.take(id) {
                    Some(_entry) => return Err(Error::Cancelled),
                    // a resolver won the race; its outcome stands
                    None => (&mut slot).await.ok(),
                }
            }
            () = &mut expired => {
                match inner.pending.take(id) {
                    Some(_entry) => return Err(Error::TimedOut),
                    None => (&mut slot).await.ok(),
                }
            }
        };
        finish(completion)
    }

    /// Submit a request without waiting for a response.
    ///
    /// No pending entry is registered, so the duplicate-identifier check
    /// does not apply and any response the peer sends back is discarded as
    /// unmatched. Backpressure from a full queue still applies, bounded
    /// only by the caller's `cancel`.
    pub async fn post(&self, request: Request, cancel: &CancellationToken) -> Result<(), Error> {
        let inner = &*self.inner;
        inner.state.ensure_running()?;

        let submit_tx = inner.submit_tx.lock().unwrap().clone();
        let Some(submit_tx) = submit_tx else {
            return Err(Error::Shutdown);
        };

        tracing::trace!(id = %request.id, "posting request");
        tokio::select! {
            reserved = submit_tx.reserve() => match reserved {
                Ok(permit) => {
                    permit.send(request);
                    Ok(())
                }
                Err(_) => Err(Error::Shutdown),
            },
            _ = cancel.cancelled() => Err(Error::Cancelled),
        }
    }

    /// Transition Running → Stopping, drain, then Stopping → Stopped.
    ///
    /// The write pump finishes every request already queued; the read pump
    /// keeps reading until every pending request has its response. If
    /// `cancel` fires first (or was already cancelled on entry, which
    /// bypasses the write drain entirely), the remaining entries resolve
    /// as shut down and this call fails with [`Error::Cancelled`]; the
    /// instance still ends up Stopped.
    pub async fn stop(&self, cancel: &CancellationToken) -> Result<(), Error> {
        let inner = &*self.inner;
        inner.state.begin_stop()?;
        tracing::debug!("stopping multiplexer");

        // no new submissions; what is already queued still drains
        drop(inner.submit_tx.lock().unwrap().take());

        let handles = inner.pumps.lock().unwrap().take();
        let Some(PumpHandles {
            shutdown,
            mut write,
            read,
        }) = handles
        else {
            inner.state.finish_stop();
            return Ok(());
        };

        let mut cancelled = cancel.is_cancelled();
        let mut write_done = false;

        if !cancelled {
            tokio::select! {
                _ = cancel.cancelled() => cancelled = true,
                _ = &mut write => write_done = true,
            }
        }
        if !cancelled {
            tokio::select! {
                _ = cancel.cancelled() => cancelled = true,
                _ = inner.pending.wait_empty() => {}
            }
        }

        shutdown.cancel();
        if !write_done {
            let _ = write.await;
        }
        let _ = read.await;

        inner.state.finish_stop();
        if cancelled {
            tracing::debug!("stop cancelled, outstanding requests were shut down");
            Err(Error::Cancelled)
        } else {
            tracing::debug!("multiplexer stopped");
            Ok(())
        }
    }
}

impl<T: Transport> Drop for Inner<T> {
    fn drop(&mut self) {
        // stop the pumps if the last handle goes away without a stop
        if let Some(handles) = self.pumps.lock().ok().and_then(|mut pumps| pumps.take()) {
            handles.shutdown.cancel();
        }
    }
}

fn finish(completion: Option<Completion>) -> Result<Response, Error> {
    match completion {
        Some(Completion::Delivered(response)) => Ok(response),
        // a slot dropped unresolved means the pumps are gone
        Some(Completion::Shutdown) | None => Err(Error::Shutdown),
        Some(Completion::TransportFailed(err)) => Err(Error::Transport(err)),
    }
}
