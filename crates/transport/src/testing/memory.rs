//! In-memory transport for tests.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::{ReadHalf, Request, Response, Transport, TransportError, WriteHalf};

const CHANNEL_CAPACITY: usize = 64;

/// An in-memory transport connected to a [`TestPeer`].
///
/// Requests written to this transport arrive on the peer's `requests`
/// receiver; responses sent on the peer's `responses` sender arrive at this
/// transport's reads. Optional per-direction delays simulate wire latency.
///
/// # Example
///
/// ```
/// use transport::testing;
/// use transport::{split, Response};
///
/// # async fn demo() {
/// let (channel, mut peer) = testing::channel();
/// let (reader, writer) = split(channel);
///
/// // a scripted peer: answer one request by hand
/// let request = peer.requests.recv().await.unwrap();
/// peer.responses
///     .send(Response::new(request.id, request.body))
///     .await
///     .unwrap();
/// # }
/// ```
pub struct ChannelTransport {
    outgoing: mpsc::Sender<Request>,
    incoming: mpsc::Receiver<Response>,
    write_delay: Duration,
    read_delay: Duration,
}

/// The far end of a [`ChannelTransport`].
///
/// Dropping `requests` makes subsequent writes fail with
/// [`TransportError::Closed`]; dropping `responses` makes subsequent reads
/// fail the same way. Tests use this to inject channel faults.
pub struct TestPeer {
    /// Requests written by the transport under test.
    pub requests: mpsc::Receiver<Request>,
    /// Responses to feed back to the transport under test.
    pub responses: mpsc::Sender<Response>,
}

/// Create a connected transport/peer pair with no artificial latency.
pub fn channel() -> (ChannelTransport, TestPeer) {
    let (request_tx, request_rx) = mpsc::channel(CHANNEL_CAPACITY);
    let (response_tx, response_rx) = mpsc::channel(CHANNEL_CAPACITY);

    let transport = ChannelTransport {
        outgoing: request_tx,
        incoming: response_rx,
        write_delay: Duration::ZERO,
        read_delay: Duration::ZERO,
    };
    let peer = TestPeer {
        requests: request_rx,
        responses: response_tx,
    };

    (transport, peer)
}

impl ChannelTransport {
    /// Apply an artificial delay to every write and read operation.
    pub fn with_delays(mut self, write_delay: Duration, read_delay: Duration) -> Self {
        self.write_delay = write_delay;
        self.read_delay = read_delay;
        self
    }
}

impl Transport for ChannelTransport {
    type Reader = ChannelReader;
    type Writer = ChannelWriter;

    fn into_split(self) -> (Self::Reader, Self::Writer) {
        (
            ChannelReader {
                incoming: self.incoming,
                delay: self.read_delay,
            },
            ChannelWriter {
                outgoing: self.outgoing,
                delay: self.write_delay,
            },
        )
    }
}

/// Receive half of a [`ChannelTransport`].
pub struct ChannelReader {
    incoming: mpsc::Receiver<Response>,
    delay: Duration,
}

impl ReadHalf for ChannelReader {
    async fn read(&mut self, cancel: CancellationToken) -> Result<Response, TransportError> {
        let incoming = &mut self.incoming;
        let delay = self.delay;
        tokio::select! {
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            received = async {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                incoming.recv().await
            } => received.ok_or(TransportError::Closed),
        }
    }
}

/// Send half of a [`ChannelTransport`].
pub struct ChannelWriter {
    outgoing: mpsc::Sender<Request>,
    delay: Duration,
}

impl WriteHalf for ChannelWriter {
    async fn write(
        &mut self,
        request: Request,
        cancel: CancellationToken,
    ) -> Result<(), TransportError> {
        let outgoing = &self.outgoing;
        let delay = self.delay;
        tokio::select! {
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            sent = async {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                outgoing.send(request).await
            } => sent.map_err(|_| TransportError::Closed),
        }
    }
}

/// Spawn a task that answers every request with a response carrying the
/// same identifier and payload.
///
/// The task exits when either side of the peer channel closes.
pub fn spawn_echo(peer: TestPeer) -> JoinHandle<()> {
    let TestPeer {
        mut requests,
        responses,
    } = peer;
    tokio::spawn(async move {
        while let Some(request) = requests.recv().await {
            let response = Response::new(request.id, request.body);
            if responses.send(response).await.is_err() {
                break;
            }
        }
    })
}
