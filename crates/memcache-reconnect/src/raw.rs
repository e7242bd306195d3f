//! One memcache transport with request multiplexing and backpressure.
//!
//! A [`RawConnection`] owns a socket split into a reader task and a writer
//! task, plus the [`Tracker`] that correlates responses with requests.
//! Requests are admitted and queued for the writer under the tracker lock,
//! so write order always equals admission order.

use crate::config::ConnectionConfig;
use crate::connection::{Connection, DisconnectListener, ResponseFuture};
use crate::error::ConnectError;
use crate::events::ConnectionEvent;
use crate::scheduler::Scheduler;
use crate::tracker::{Correlation, Entry, Next, Pending, Tracker};
use bytes::{Bytes, BytesMut};
use futures::future::{self, BoxFuture};
use futures::FutureExt;
use memcache_reconnect_core::{EventScope, MemcacheError};
use memcache_reconnect_protocol::{Codec, DecodeError, Frame, Request, Response};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

const READ_BUFFER_SIZE: usize = 16 * 1024;

/// A single connection to a memcache server.
///
/// Cloning is cheap; all clones share the transport. The transport is shut
/// down when [`shutdown`](Self::shutdown) is called, when the server goes
/// away, on a protocol failure, or when the last clone is dropped.
#[derive(Clone)]
pub struct RawConnection {
    shared: Arc<Shared>,
    _guard: Arc<DropGuard>,
}

struct DropGuard(Arc<Shared>);

impl Drop for DropGuard {
    fn drop(&mut self) {
        self.0.close("connection dropped");
    }
}

struct Shared {
    config: Arc<ConnectionConfig>,
    peer: String,
    codec: Codec,
    tracker: Tracker,
    scheduler: Scheduler,
    writer: mpsc::UnboundedSender<Bytes>,
    closed: AtomicBool,
    closed_tx: watch::Sender<bool>,
    disconnect: Mutex<Option<DisconnectListener>>,
    consecutive_timeouts: AtomicUsize,
}

impl RawConnection {
    /// Opens a TCP connection to the configured address.
    pub async fn connect(config: impl Into<Arc<ConnectionConfig>>) -> Result<Self, ConnectError> {
        let config = config.into();
        let scheduler = config.resolve_scheduler()?;
        let stream = tokio::time::timeout(
            config.connect_timeout,
            TcpStream::connect(config.address.as_str()),
        )
        .await
        .map_err(|_| ConnectError::Timeout(config.connect_timeout))??;
        stream.set_nodelay(true)?;

        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| config.address.clone());
        Ok(Self::from_stream(stream, peer, config, scheduler))
    }

    /// Wraps an already established byte stream.
    pub fn from_stream<S>(
        stream: S,
        peer: impl Into<String>,
        config: Arc<ConnectionConfig>,
        scheduler: Scheduler,
    ) -> Self
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let (writer, frames) = mpsc::unbounded_channel();
        let (closed_tx, closed_rx) = watch::channel(false);

        let shared = Arc::new(Shared {
            peer: peer.into(),
            codec: Codec::new(config.protocol),
            tracker: Tracker::new(
                config.outstanding_request_limit,
                Correlation::from(config.protocol),
            ),
            scheduler: scheduler.clone(),
            writer,
            closed: AtomicBool::new(false),
            closed_tx,
            disconnect: Mutex::new(Some(DisconnectListener::new(closed_signal(closed_rx)))),
            consecutive_timeouts: AtomicUsize::new(0),
            config,
        });

        scheduler.spawn(write_loop(Arc::clone(&shared), write_half, frames));
        scheduler.spawn(read_loop(Arc::clone(&shared), read_half));

        tracing::debug!(
            client = %shared.config.name,
            peer = %shared.peer,
            protocol = shared.config.protocol.name(),
            "connection established"
        );

        Self {
            _guard: Arc::new(DropGuard(Arc::clone(&shared))),
            shared,
        }
    }

    /// Submits a request.
    ///
    /// Admission happens before this returns: the future fails immediately
    /// with `Overloaded` when the outstanding-request limit is reached and
    /// with `Closed` once the connection is shut down.
    pub fn send(&self, request: Request) -> ResponseFuture {
        match self.dispatch(request) {
            Ok(pending) => pending.boxed(),
            Err(error) => future::ready(Err(error)).boxed(),
        }
    }

    fn dispatch(&self, request: Request) -> Result<Pending, MemcacheError> {
        let shared = &self.shared;
        let config = &shared.config;
        request.validate(config.charset, config.max_set_length)?;

        let admitted = shared.tracker.admit_with(request, |id, request| {
            let mut frame = BytesMut::new();
            shared.codec.encode(id, request, &mut frame);
            shared
                .writer
                .send(frame.freeze())
                .map_err(|_| MemcacheError::closed("writer stopped"))
        });
        let pending = match admitted {
            Ok(pending) => pending,
            Err(error) => {
                if error.is_overloaded() {
                    shared.on_rejected();
                }
                return Err(error);
            }
        };

        let id = pending.id();
        let timeout = config.request_timeout;
        let weak = Arc::downgrade(shared);
        let timer = shared.scheduler.schedule(timeout, async move {
            if let Some(shared) = weak.upgrade() {
                shared.on_timeout(id, timeout);
            }
        });
        shared.tracker.attach_timer(id, timer);

        let outstanding = shared.tracker.len();
        tracing::trace!(client = %config.name, id, outstanding, "request admitted");
        config
            .event_listeners
            .emit_with(EventScope::Request, || ConnectionEvent::RequestAdmitted {
                client_name: config.name.clone(),
                timestamp: Instant::now(),
                outstanding,
            });
        shared.record_outstanding();
        Ok(pending)
    }

    /// Returns true until the connection is closed.
    pub fn is_connected(&self) -> bool {
        !self.shared.closed.load(Ordering::Acquire)
    }

    /// Closes the transport and fails every outstanding request with
    /// `Closed`. Idempotent.
    pub fn shutdown(&self) {
        self.shared.close("connection shut down");
    }

    /// Always one: a raw connection is a single transport.
    pub fn num_total_connections(&self) -> usize {
        1
    }

    /// One while connected, zero afterwards.
    pub fn num_active_connections(&self) -> usize {
        usize::from(self.is_connected())
    }

    /// Requests admitted and not yet resolved.
    pub fn outstanding_requests(&self) -> usize {
        self.shared.tracker.len()
    }

    /// Completes once the connection is closed.
    pub fn closed(&self) -> BoxFuture<'static, ()> {
        closed_signal(self.shared.closed_tx.subscribe()).boxed()
    }

    /// Hands out the disconnect listener. Only the first call gets one.
    pub fn take_disconnect_listener(&self) -> Option<DisconnectListener> {
        self.shared
            .disconnect
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
    }

    /// The address of the server.
    pub fn peer(&self) -> &str {
        &self.shared.peer
    }

    /// The configuration this connection was created with.
    pub fn config(&self) -> &ConnectionConfig {
        &self.shared.config
    }
}

impl Shared {
    fn on_frame(&self, frame: Frame) -> bool {
        self.consecutive_timeouts.store(0, Ordering::Release);

        let entry = match self.tracker.correlation() {
            Correlation::Fifo => match self.tracker.take_next() {
                Next::Entry(entry) => entry,
                Next::Tombstone(id) => {
                    tracing::debug!(client = %self.config.name, id, "discarding late response");
                    return true;
                }
                Next::Empty => {
                    self.fail_protocol(
                        format!("unsolicited response: {}", frame.response.kind()),
                        None,
                    );
                    return false;
                }
            },
            Correlation::ById => {
                let Some(id) = frame.opaque else {
                    self.fail_protocol("response without request id".to_string(), None);
                    return false;
                };
                match self.tracker.take(id) {
                    Some(entry) => entry,
                    None => {
                        tracing::debug!(
                            client = %self.config.name,
                            id,
                            "discarding response for unknown request id"
                        );
                        return true;
                    }
                }
            }
        };
        self.record_outstanding();

        if !entry.request().accepts(&frame.response) {
            let message = format!(
                "unexpected response {} to {}",
                frame.response.kind(),
                entry.request().command()
            );
            self.fail_protocol(message, Some(entry));
            return false;
        }

        let outcome = match frame.response {
            Response::ServerError(message) => Err(MemcacheError::Server(message)),
            response => Ok(response),
        };

        #[cfg(feature = "metrics")]
        counter!(
            "memcache_requests_total",
            "client" => self.config.name.clone(),
            "outcome" => if outcome.is_ok() { "ok" } else { "server_error" }
        )
        .increment(1);

        entry.complete(outcome);
        true
    }

    /// Fails `culprit` with a protocol error and tears the connection down.
    fn fail_protocol(&self, message: String, culprit: Option<Entry>) {
        if let Some(entry) = culprit {
            entry.complete(Err(MemcacheError::Protocol(message.clone())));

            #[cfg(feature = "metrics")]
            counter!(
                "memcache_requests_total",
                "client" => self.config.name.clone(),
                "outcome" => "protocol"
            )
            .increment(1);
        }

        tracing::warn!(
            client = %self.config.name,
            peer = %self.peer,
            error = %message,
            "protocol failure, closing connection"
        );
        self.config
            .event_listeners
            .emit(&ConnectionEvent::ProtocolFailure {
                client_name: self.config.name.clone(),
                timestamp: Instant::now(),
                message: message.clone(),
            });
        self.close(&message);
    }

    fn on_decode_error(&self, error: DecodeError) {
        let culprit = match (self.tracker.correlation(), error.opaque) {
            (Correlation::Fifo, _) => match self.tracker.take_next() {
                Next::Entry(entry) => Some(entry),
                Next::Tombstone(_) | Next::Empty => None,
            },
            (Correlation::ById, Some(id)) => self.tracker.take(id),
            (Correlation::ById, None) => None,
        };
        self.fail_protocol(error.to_string(), culprit);
    }

    fn on_timeout(&self, id: u32, timeout: Duration) {
        if !self.tracker.expire(id, MemcacheError::Timeout { timeout }) {
            return;
        }
        self.record_outstanding();
        tracing::debug!(client = %self.config.name, id, ?timeout, "request timed out");
        self.config
            .event_listeners
            .emit(&ConnectionEvent::RequestTimedOut {
                client_name: self.config.name.clone(),
                timestamp: Instant::now(),
                timeout,
            });

        #[cfg(feature = "metrics")]
        counter!(
            "memcache_requests_total",
            "client" => self.config.name.clone(),
            "outcome" => "timeout"
        )
        .increment(1);

        let tombstones = self.tracker.tombstones();
        if tombstones > self.tracker.limit() {
            tracing::warn!(
                client = %self.config.name,
                peer = %self.peer,
                tombstones,
                "too many unanswered timed-out requests, closing connection"
            );
            self.close("too many unanswered timed-out requests");
            return;
        }

        let run = self.consecutive_timeouts.fetch_add(1, Ordering::AcqRel) + 1;
        if let Some(max) = self.config.max_consecutive_timeouts {
            if run >= max {
                tracing::warn!(
                    client = %self.config.name,
                    peer = %self.peer,
                    timeouts = run,
                    "too many consecutive timeouts, closing connection"
                );
                self.close("too many consecutive timeouts");
            }
        }
    }

    fn on_rejected(&self) {
        let limit = self.tracker.limit();
        tracing::debug!(client = %self.config.name, limit, "request rejected, connection overloaded");
        self.config
            .event_listeners
            .emit(&ConnectionEvent::RequestRejected {
                client_name: self.config.name.clone(),
                timestamp: Instant::now(),
                limit,
            });

        #[cfg(feature = "metrics")]
        counter!("memcache_requests_rejected_total", "client" => self.config.name.clone())
            .increment(1);
    }

    /// Closes the transport once; later calls return false.
    fn close(&self, reason: &str) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        let drained = self.tracker.drain_all(MemcacheError::closed(reason));
        self.closed_tx.send_replace(true);
        self.record_outstanding();

        tracing::debug!(
            client = %self.config.name,
            peer = %self.peer,
            reason,
            drained,
            "connection closed"
        );
        self.config.event_listeners.emit(&ConnectionEvent::Closed {
            client_name: self.config.name.clone(),
            timestamp: Instant::now(),
            reason: reason.to_string(),
            drained,
        });

        #[cfg(feature = "metrics")]
        {
            if drained > 0 {
                counter!(
                    "memcache_requests_total",
                    "client" => self.config.name.clone(),
                    "outcome" => "closed"
                )
                .increment(drained as u64);
            }
        }
        true
    }

    fn record_outstanding(&self) {
        #[cfg(feature = "metrics")]
        gauge!("memcache_outstanding_requests", "client" => self.config.name.clone())
            .set(self.tracker.len() as f64);
    }
}

async fn closed_signal(mut closed: watch::Receiver<bool>) {
    // A dropped sender also means closed.
    let _ = closed.wait_for(|closed| *closed).await;
}

async fn write_loop<W>(shared: Arc<Shared>, mut writer: W, mut frames: mpsc::UnboundedReceiver<Bytes>)
where
    W: AsyncWrite + Unpin,
{
    let closed = closed_signal(shared.closed_tx.subscribe());
    tokio::pin!(closed);

    loop {
        let frame = tokio::select! {
            biased;
            _ = &mut closed => return,
            frame = frames.recv() => frame,
        };
        let Some(frame) = frame else { return };

        let written = async {
            writer.write_all(&frame).await?;
            writer.flush().await
        };
        if let Err(error) = written.await {
            shared.close(&format!("write failed: {}", error));
            return;
        }
    }
}

async fn read_loop<R>(shared: Arc<Shared>, mut reader: R)
where
    R: AsyncRead + Unpin,
{
    let closed = closed_signal(shared.closed_tx.subscribe());
    tokio::pin!(closed);
    let mut buf = BytesMut::with_capacity(READ_BUFFER_SIZE);

    loop {
        let read = tokio::select! {
            biased;
            _ = &mut closed => return,
            read = reader.read_buf(&mut buf) => read,
        };
        match read {
            Ok(0) => {
                shared.close("connection closed by server");
                return;
            }
            Ok(_) => {}
            Err(error) => {
                shared.close(&format!("read failed: {}", error));
                return;
            }
        }

        loop {
            match shared.codec.decode(&mut buf) {
                Ok(Some(frame)) => {
                    if !shared.on_frame(frame) {
                        return;
                    }
                }
                Ok(None) => break,
                Err(error) => {
                    shared.on_decode_error(error);
                    return;
                }
            }
        }
    }
}

impl Connection for RawConnection {
    fn send(&self, request: Request) -> ResponseFuture {
        RawConnection::send(self, request)
    }

    fn is_connected(&self) -> bool {
        RawConnection::is_connected(self)
    }

    fn shutdown(&self) {
        RawConnection::shutdown(self)
    }

    fn num_total_connections(&self) -> usize {
        RawConnection::num_total_connections(self)
    }

    fn num_active_connections(&self) -> usize {
        RawConnection::num_active_connections(self)
    }

    fn closed(&self) -> BoxFuture<'static, ()> {
        RawConnection::closed(self)
    }

    fn take_disconnect_listener(&self) -> Option<DisconnectListener> {
        RawConnection::take_disconnect_listener(self)
    }
}

impl fmt::Display for RawConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawConnection({})", self.shared.peer)
    }
}

impl fmt::Debug for RawConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawConnection")
            .field("peer", &self.shared.peer)
            .field("connected", &self.is_connected())
            .field("tracker", &self.shared.tracker)
            .finish()
    }
}
