//! Connect-time errors.

use std::time::Duration;

/// Why a transport could not be established.
///
/// Connect errors only drive the reconnect loop; they are never delivered to
/// request callers, who see [`MemcacheError::NotConnected`] instead.
///
/// [`MemcacheError::NotConnected`]: memcache_reconnect_core::MemcacheError::NotConnected
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    /// The socket could not be opened.
    #[error("connect failed: {0}")]
    Io(#[from] std::io::Error),

    /// The server did not accept the connection in time.
    #[error("connect timed out after {0:?}")]
    Timeout(Duration),

    /// Neither a configured scheduler nor an ambient tokio runtime exists.
    #[error("no scheduler configured and no tokio runtime running")]
    NoScheduler,

    /// The connector failed for another reason.
    #[error("connect failed: {0}")]
    Failed(String),
}

impl ConnectError {
    /// Short label used for logging and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ConnectError::Io(_) => "io",
            ConnectError::Timeout(_) => "timeout",
            ConnectError::NoScheduler => "no_scheduler",
            ConnectError::Failed(_) => "failed",
        }
    }
}
