//! The connection abstraction shared by the raw connection, the
//! not-connected stand-in and the handle the reconnecting client swaps.

use futures::future::{self, BoxFuture};
use futures::FutureExt;
use memcache_reconnect_core::MemcacheError;
use memcache_reconnect_protocol::{Request, Response};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Future returned by [`Connection::send`].
pub type ResponseFuture = BoxFuture<'static, Result<Response, MemcacheError>>;

/// One-shot notification that a connection has become unusable.
///
/// Each connection hands out exactly one listener.
pub struct DisconnectListener {
    fired: BoxFuture<'static, ()>,
}

impl DisconnectListener {
    /// Wraps a future that completes when the connection goes away.
    pub fn new<F>(fired: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            fired: fired.boxed(),
        }
    }
}

impl Future for DisconnectListener {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        self.fired.as_mut().poll(cx)
    }
}

impl fmt::Debug for DisconnectListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisconnectListener").finish()
    }
}

/// A transport that accepts memcache requests.
pub trait Connection: Send + Sync + 'static {
    /// Submits a request. Admission happens before this returns; the future
    /// only waits for the outcome.
    fn send(&self, request: Request) -> ResponseFuture;

    /// Returns true while the transport is usable.
    fn is_connected(&self) -> bool;

    /// Closes the transport and fails outstanding requests. Idempotent.
    fn shutdown(&self);

    /// Number of transports behind this connection.
    fn num_total_connections(&self) -> usize;

    /// Number of usable transports behind this connection.
    fn num_active_connections(&self) -> usize;

    /// Completes once the connection is closed. Any number of callers may wait.
    fn closed(&self) -> BoxFuture<'static, ()>;

    /// Hands out the single disconnect listener. Returns `None` once taken.
    fn take_disconnect_listener(&self) -> Option<DisconnectListener>;
}

/// Stand-in installed while no transport is available.
///
/// Fails every request with [`MemcacheError::NotConnected`] without
/// queuing it.
#[derive(Debug, Clone, Copy, Default)]
pub struct NotConnected;

impl Connection for NotConnected {
    fn send(&self, _request: Request) -> ResponseFuture {
        future::ready(Err(MemcacheError::NotConnected)).boxed()
    }

    fn is_connected(&self) -> bool {
        false
    }

    fn shutdown(&self) {}

    fn num_total_connections(&self) -> usize {
        0
    }

    fn num_active_connections(&self) -> usize {
        0
    }

    fn closed(&self) -> BoxFuture<'static, ()> {
        future::ready(()).boxed()
    }

    fn take_disconnect_listener(&self) -> Option<DisconnectListener> {
        None
    }
}

impl fmt::Display for NotConnected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NotConnected")
    }
}

/// The connection currently installed in a reconnecting client.
#[derive(Debug, Clone)]
pub enum ConnectionHandle<C> {
    /// No transport is available.
    NotConnected(NotConnected),
    /// A live transport.
    Active(C),
}

impl<C> ConnectionHandle<C> {
    /// Returns true for the [`Active`](Self::Active) variant.
    pub fn is_active(&self) -> bool {
        matches!(self, ConnectionHandle::Active(_))
    }
}

impl<C> Default for ConnectionHandle<C> {
    fn default() -> Self {
        ConnectionHandle::NotConnected(NotConnected)
    }
}

impl<C: Connection> Connection for ConnectionHandle<C> {
    fn send(&self, request: Request) -> ResponseFuture {
        match self {
            ConnectionHandle::NotConnected(c) => c.send(request),
            ConnectionHandle::Active(c) => c.send(request),
        }
    }

    fn is_connected(&self) -> bool {
        match self {
            ConnectionHandle::NotConnected(c) => c.is_connected(),
            ConnectionHandle::Active(c) => c.is_connected(),
        }
    }

    fn shutdown(&self) {
        match self {
            ConnectionHandle::NotConnected(c) => c.shutdown(),
            ConnectionHandle::Active(c) => c.shutdown(),
        }
    }

    fn num_total_connections(&self) -> usize {
        match self {
            ConnectionHandle::NotConnected(c) => c.num_total_connections(),
            ConnectionHandle::Active(c) => c.num_total_connections(),
        }
    }

    fn num_active_connections(&self) -> usize {
        match self {
            ConnectionHandle::NotConnected(c) => c.num_active_connections(),
            ConnectionHandle::Active(c) => c.num_active_connections(),
        }
    }

    fn closed(&self) -> BoxFuture<'static, ()> {
        match self {
            ConnectionHandle::NotConnected(c) => c.closed(),
            ConnectionHandle::Active(c) => c.closed(),
        }
    }

    fn take_disconnect_listener(&self) -> Option<DisconnectListener> {
        match self {
            ConnectionHandle::NotConnected(c) => c.take_disconnect_listener(),
            ConnectionHandle::Active(c) => c.take_disconnect_listener(),
        }
    }
}

impl<C: fmt::Display> fmt::Display for ConnectionHandle<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionHandle::NotConnected(c) => c.fmt(f),
            ConnectionHandle::Active(c) => c.fmt(f),
        }
    }
}
