//! The reconnecting client.
//!
//! A [`ReconnectingClient`] keeps exactly one [`ConnectionHandle`] installed
//! and forwards every request to it. The connect, disconnect and retry
//! continuations are delivered as messages to a single state machine task,
//! so each transition runs alone and re-checks for shutdown right before it
//! installs a connection or schedules a timer.
//!
//! ```text
//!  ConnectingFresh --ok--> Connected --disconnect--> Backoff --timer--> (connect)
//!        |                     ^                        |
//!        +------failed---------|-----> Backoff <--------+ failed
//!                              +------------------------+ ok
//!
//!  any state --shutdown()--> ShuttingDown
//! ```
//!
//! [`ConnectionHandle`]: crate::ConnectionHandle

mod client;
mod config;
mod state;

pub use client::ReconnectingClient;
pub use config::{ReconnectConfig, ReconnectConfigBuilder};
pub use state::ClientState;
