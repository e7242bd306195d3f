//! Events emitted by raw connections and reconnecting clients.

use memcache_reconnect_core::events::{EventScope, MemcacheEvent};
use std::time::{Duration, Instant};

/// Events emitted by a [`RawConnection`](crate::RawConnection).
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// A request was admitted and written.
    RequestAdmitted {
        /// Name of the client instance.
        client_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Outstanding requests after admission.
        outstanding: usize,
    },
    /// A request was rejected because the outstanding-request limit was reached.
    RequestRejected {
        /// Name of the client instance.
        client_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// The configured limit.
        limit: usize,
    },
    /// No response arrived for a request in time.
    RequestTimedOut {
        /// Name of the client instance.
        client_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// The configured request timeout.
        timeout: Duration,
    },
    /// The response stream could not be decoded or did not match the request.
    ProtocolFailure {
        /// Name of the client instance.
        client_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// What went wrong.
        message: String,
    },
    /// The connection was torn down.
    Closed {
        /// Name of the client instance.
        client_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Why the connection closed.
        reason: String,
        /// Requests failed by the drain.
        drained: usize,
    },
}

impl MemcacheEvent for ConnectionEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ConnectionEvent::RequestAdmitted { .. } => "request_admitted",
            ConnectionEvent::RequestRejected { .. } => "request_rejected",
            ConnectionEvent::RequestTimedOut { .. } => "request_timed_out",
            ConnectionEvent::ProtocolFailure { .. } => "protocol_failure",
            ConnectionEvent::Closed { .. } => "closed",
        }
    }

    fn scope(&self) -> EventScope {
        match self {
            ConnectionEvent::RequestAdmitted { .. }
            | ConnectionEvent::RequestRejected { .. }
            | ConnectionEvent::RequestTimedOut { .. } => EventScope::Request,
            ConnectionEvent::ProtocolFailure { .. } | ConnectionEvent::Closed { .. } => {
                EventScope::Connection
            }
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            ConnectionEvent::RequestAdmitted { timestamp, .. }
            | ConnectionEvent::RequestRejected { timestamp, .. }
            | ConnectionEvent::RequestTimedOut { timestamp, .. }
            | ConnectionEvent::ProtocolFailure { timestamp, .. }
            | ConnectionEvent::Closed { timestamp, .. } => *timestamp,
        }
    }

    fn client_name(&self) -> &str {
        match self {
            ConnectionEvent::RequestAdmitted { client_name, .. }
            | ConnectionEvent::RequestRejected { client_name, .. }
            | ConnectionEvent::RequestTimedOut { client_name, .. }
            | ConnectionEvent::ProtocolFailure { client_name, .. }
            | ConnectionEvent::Closed { client_name, .. } => client_name,
        }
    }
}

/// Events emitted by a [`ReconnectingClient`](crate::ReconnectingClient).
#[derive(Debug, Clone)]
pub enum ReconnectEvent {
    /// A new connection was installed.
    Connected {
        /// Name of the client instance.
        client_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Description of the installed connection.
        connection: String,
    },
    /// A connect attempt failed.
    ConnectFailed {
        /// Name of the client instance.
        client_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Why the attempt failed.
        error: String,
    },
    /// The installed connection became unusable.
    Disconnected {
        /// Name of the client instance.
        client_name: String,
        /// When the event occurred.
        timestamp: Instant,
    },
    /// A reconnect attempt was scheduled.
    ReconnectScheduled {
        /// Name of the client instance.
        client_name: String,
        /// When the event occurred.
        timestamp: Instant,
        /// Attempts since the last successful connect.
        attempt: usize,
        /// Wait before the attempt.
        delay: Duration,
    },
    /// Shutdown was requested.
    ShutdownRequested {
        /// Name of the client instance.
        client_name: String,
        /// When the event occurred.
        timestamp: Instant,
    },
}

impl MemcacheEvent for ReconnectEvent {
    fn event_type(&self) -> &'static str {
        match self {
            ReconnectEvent::Connected { .. } => "connected",
            ReconnectEvent::ConnectFailed { .. } => "connect_failed",
            ReconnectEvent::Disconnected { .. } => "disconnected",
            ReconnectEvent::ReconnectScheduled { .. } => "reconnect_scheduled",
            ReconnectEvent::ShutdownRequested { .. } => "shutdown_requested",
        }
    }

    fn scope(&self) -> EventScope {
        EventScope::Connection
    }

    fn timestamp(&self) -> Instant {
        match self {
            ReconnectEvent::Connected { timestamp, .. }
            | ReconnectEvent::ConnectFailed { timestamp, .. }
            | ReconnectEvent::Disconnected { timestamp, .. }
            | ReconnectEvent::ReconnectScheduled { timestamp, .. }
            | ReconnectEvent::ShutdownRequested { timestamp, .. } => *timestamp,
        }
    }

    fn client_name(&self) -> &str {
        match self {
            ReconnectEvent::Connected { client_name, .. }
            | ReconnectEvent::ConnectFailed { client_name, .. }
            | ReconnectEvent::Disconnected { client_name, .. }
            | ReconnectEvent::ReconnectScheduled { client_name, .. }
            | ReconnectEvent::ShutdownRequested { client_name, .. } => client_name,
        }
    }
}
