//! Core infrastructure for memcache-reconnect.
//!
//! This crate provides functionality shared by the connection and
//! reconnection crates:
//! - Event system for observability
//! - The request error taxonomy ([`MemcacheError`])

pub mod error;
pub mod events;

pub use error::MemcacheError;
pub use events::{EventListener, EventListeners, EventScope, MemcacheEvent};
