//! Always-available memcache connections.
//!
//! This crate keeps one logical connection to a memcache server alive while
//! the transport underneath it drops, fails to establish or stalls, and
//! multiplexes many concurrent requests over that single transport.
//!
//! - [`RawConnection`]: one transport. Requests are admitted into a bounded
//!   [`Tracker`], written in admission order and correlated with responses
//!   either by position (ascii) or by opaque id (binary). Each request gets
//!   its own timeout.
//! - [`ReconnectingClient`]: holds the installed [`ConnectionHandle`] and
//!   runs the connect, disconnect, backoff and reconnect cycle.
//! - [`Scheduler`]: the runtime that drives timers and connection tasks,
//!   shareable between clients.
//!
//! # Basic Example
//!
//! ```rust,no_run
//! use memcache_reconnect::{ConnectionConfig, ReconnectConfig, ReconnectingClient, Request};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = ReconnectingClient::tcp(
//!     ConnectionConfig::builder()
//!         .address("127.0.0.1:11211")
//!         .outstanding_request_limit(500)
//!         .request_timeout(Duration::from_millis(250))
//!         .build(),
//!     ReconnectConfig::default(),
//! )?;
//!
//! client.connected().await?;
//! client.send(Request::set("user:42", "alice")).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! Every request resolves exactly once, through its own future. Failures
//! never spill over to sibling requests:
//!
//! ```rust,no_run
//! use memcache_reconnect::{ConnectionConfig, MemcacheError, ReconnectConfig, ReconnectingClient, Request};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! # let client = ReconnectingClient::tcp(ConnectionConfig::default(), ReconnectConfig::default())?;
//! match client.send(Request::get("user:42")).await {
//!     Ok(response) => println!("{:?}", response),
//!     Err(MemcacheError::NotConnected) => println!("between connections, try again later"),
//!     Err(MemcacheError::Overloaded { limit }) => println!("more than {} in flight", limit),
//!     Err(e) if e.is_closed() => println!("in flight during a disconnect"),
//!     Err(e) => println!("request failed: {}", e),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Example with Event Listeners
//!
//! ```rust
//! use memcache_reconnect::{ReconnectConfig, ReconnectPolicy};
//! use std::time::Duration;
//!
//! let config = ReconnectConfig::builder()
//!     .name("sessions")
//!     .policy(ReconnectPolicy::exponential(
//!         Duration::from_millis(50),
//!         Duration::from_secs(30),
//!     ))
//!     .on_connected(|connection| println!("connected to {}", connection))
//!     .on_reconnect_scheduled(|attempt, delay| {
//!         println!("reconnect attempt {} in {:?}", attempt, delay);
//!     })
//!     .build();
//! ```
//!
//! # Sharing a Scheduler
//!
//! ```rust,no_run
//! use memcache_reconnect::{ConnectionConfig, ReconnectConfig, ReconnectingClient, Scheduler};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let scheduler = Scheduler::shared()?;
//!
//! let clients = ["10.0.0.1:11211", "10.0.0.2:11211"].map(|address| {
//!     ReconnectingClient::tcp(
//!         ConnectionConfig::builder()
//!             .address(address)
//!             .scheduler(scheduler.clone())
//!             .build(),
//!         ReconnectConfig::builder().scheduler(scheduler.clone()).build(),
//!     )
//! });
//! # let _ = clients;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod connector;
pub mod error;
pub mod events;
pub mod raw;
pub mod reconnect;
pub mod scheduler;
mod service;
pub mod tracker;

pub use config::{ConnectionConfig, ConnectionConfigBuilder, DEFAULT_ADDRESS};
pub use connection::{Connection, ConnectionHandle, DisconnectListener, NotConnected, ResponseFuture};
pub use connector::{Connector, TcpConnector};
pub use error::ConnectError;
pub use events::{ConnectionEvent, ReconnectEvent};
pub use raw::RawConnection;
pub use reconnect::{ClientState, ReconnectConfig, ReconnectConfigBuilder, ReconnectingClient};
pub use scheduler::{Scheduler, TimerHandle, SHARED_THREAD_NAME};
pub use tracker::{Correlation, Entry, Next, Pending, Tracker};

pub use memcache_reconnect_backoff::{
    BackoffFunction, ExponentialBackoff, ExponentialRandomBackoff, FixedBackoff, FnBackoff,
    ReconnectPolicy,
};
pub use memcache_reconnect_core::{
    EventListener, EventListeners, EventScope, MemcacheError, MemcacheEvent,
};
pub use memcache_reconnect_protocol::{Charset, Codec, Protocol, Request, Response, StoreMode, Value};
