//! Raw connection tests.
//!
//! Test organization:
//! - pipeline.rs: request/response round trips and pipelining over TCP
//! - timeouts.rs: per-request timeouts against a server that never answers
//! - teardown.rs: shutdown, server close and protocol failures

mod pipeline;
mod timeouts;

use memcache_reconnect::{ConnectionConfig, ConnectionConfigBuilder, RawConnection};

/// Connects to `address` with the given extra configuration.
pub async fn connect(
    address: &str,
    configure: impl FnOnce(ConnectionConfigBuilder) -> ConnectionConfigBuilder,
) -> RawConnection {
    let config = configure(ConnectionConfig::builder().address(address)).build();
    RawConnection::connect(config).await.unwrap()
}
