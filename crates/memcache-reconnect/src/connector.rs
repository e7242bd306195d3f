//! Factories for new connections.

use crate::config::ConnectionConfig;
use crate::connection::Connection;
use crate::error::ConnectError;
use crate::raw::RawConnection;
use futures::future::BoxFuture;
use futures::FutureExt;
use std::fmt;
use std::sync::Arc;

/// Opens connections for a [`ReconnectingClient`](crate::ReconnectingClient).
///
/// `connect` is called once per attempt. Both a returned error and a panic,
/// whether raised synchronously or while the future runs, count as a failed
/// attempt and lead to a backoff.
pub trait Connector: Send + Sync + 'static {
    /// The connection type produced.
    type Connection: Connection + Clone + fmt::Display;

    /// Starts one connect attempt.
    fn connect(&self) -> BoxFuture<'static, Result<Self::Connection, ConnectError>>;
}

/// Connects [`RawConnection`]s over TCP.
#[derive(Debug, Clone)]
pub struct TcpConnector {
    config: Arc<ConnectionConfig>,
}

impl TcpConnector {
    /// Creates a connector for the given connection configuration.
    pub fn new(config: impl Into<Arc<ConnectionConfig>>) -> Self {
        Self {
            config: config.into(),
        }
    }

    /// The configuration used for every connection.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }
}

impl Connector for TcpConnector {
    type Connection = RawConnection;

    fn connect(&self) -> BoxFuture<'static, Result<RawConnection, ConnectError>> {
        RawConnection::connect(Arc::clone(&self.config)).boxed()
    }
}

impl<F, C> Connector for F
where
    F: Fn() -> BoxFuture<'static, Result<C, ConnectError>> + Send + Sync + 'static,
    C: Connection + Clone + fmt::Display,
{
    type Connection = C;

    fn connect(&self) -> BoxFuture<'static, Result<C, ConnectError>> {
        self()
    }
}
