//! [`tower::Service`] adapters.
//!
//! Both services are always ready. Backpressure shows up as
//! [`MemcacheError::Overloaded`] failures, never as a pending `poll_ready`,
//! so callers never wait for capacity.

use crate::connection::ResponseFuture;
use crate::connector::Connector;
use crate::raw::RawConnection;
use crate::reconnect::ReconnectingClient;
use memcache_reconnect_core::MemcacheError;
use memcache_reconnect_protocol::{Request, Response};
use std::task::{Context, Poll};
use tower::Service;

impl Service<Request> for RawConnection {
    type Response = Response;
    type Error = MemcacheError;
    type Future = ResponseFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request) -> Self::Future {
        self.send(request)
    }
}

impl<C: Connector> Service<Request> for ReconnectingClient<C> {
    type Response = Response;
    type Error = MemcacheError;
    type Future = ResponseFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request) -> Self::Future {
        self.send(request)
    }
}
