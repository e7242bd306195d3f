//! Request error taxonomy.
//!
//! Every request submitted to a connection resolves with exactly one
//! [`MemcacheError`] or a response. The variants are deliberately distinct so
//! callers can apply a different policy to each:
//!
//! | variant | meaning |
//! |---|---|
//! | `NotConnected` | no live transport; the request was never written |
//! | `Overloaded` | the outstanding-request ceiling was reached |
//! | `Closed` | the request was in flight when the connection was torn down |
//! | `Timeout` | no correlated response arrived in time |
//! | `Protocol` | malformed or unexpected response |
//!
//! # Examples
//!
//! ```
//! use memcache_reconnect_core::MemcacheError;
//!
//! fn should_retry_elsewhere(error: &MemcacheError) -> bool {
//!     error.is_not_connected() || error.is_closed()
//! }
//!
//! assert!(should_retry_elsewhere(&MemcacheError::NotConnected));
//! assert!(!should_retry_elsewhere(&MemcacheError::Overloaded { limit: 10 }));
//! ```

use std::time::Duration;

/// Errors delivered through a request's completion handle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MemcacheError {
    /// There is no live transport. The request was rejected immediately.
    #[error("not connected")]
    NotConnected,

    /// The outstanding-request ceiling is reached.
    #[error("connection overloaded: {limit} outstanding requests")]
    Overloaded {
        /// The configured outstanding-request limit.
        limit: usize,
    },

    /// The request was drained by a shutdown or disconnect.
    #[error("connection closed: {reason}")]
    Closed {
        /// Why the connection closed.
        reason: String,
    },

    /// No response was correlated with the request in time.
    #[error("request timed out after {timeout:?}")]
    Timeout {
        /// The configured request timeout.
        timeout: Duration,
    },

    /// The server sent something that does not fit the request.
    #[error("{0}")]
    Protocol(String),

    /// The server reported an error for this request only.
    #[error("server error: {0}")]
    Server(String),

    /// The value exceeds the configured maximum payload size.
    #[error("value too large: {len} bytes exceeds maximum of {max}")]
    ValueTooLarge {
        /// Length of the rejected value.
        len: usize,
        /// Configured maximum.
        max: usize,
    },

    /// The key cannot be sent over the wire.
    #[error("invalid key: {0}")]
    InvalidKey(String),
}

impl MemcacheError {
    /// Creates a `Closed` error with the given reason.
    pub fn closed(reason: impl Into<String>) -> Self {
        MemcacheError::Closed {
            reason: reason.into(),
        }
    }

    /// Returns `true` if this is a not-connected error.
    pub fn is_not_connected(&self) -> bool {
        matches!(self, MemcacheError::NotConnected)
    }

    /// Returns `true` if this is an overload rejection.
    pub fn is_overloaded(&self) -> bool {
        matches!(self, MemcacheError::Overloaded { .. })
    }

    /// Returns `true` if the request was drained by a teardown.
    pub fn is_closed(&self) -> bool {
        matches!(self, MemcacheError::Closed { .. })
    }

    /// Returns `true` if this is a timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, MemcacheError::Timeout { .. })
    }

    /// Returns `true` if this is a protocol error.
    pub fn is_protocol(&self) -> bool {
        matches!(self, MemcacheError::Protocol(_))
    }

    /// Short label used for metrics and event fields.
    pub fn kind(&self) -> &'static str {
        match self {
            MemcacheError::NotConnected => "not_connected",
            MemcacheError::Overloaded { .. } => "overloaded",
            MemcacheError::Closed { .. } => "closed",
            MemcacheError::Timeout { .. } => "timeout",
            MemcacheError::Protocol(_) => "protocol",
            MemcacheError::Server(_) => "server",
            MemcacheError::ValueTooLarge { .. } => "value_too_large",
            MemcacheError::InvalidKey(_) => "invalid_key",
        }
    }
}
