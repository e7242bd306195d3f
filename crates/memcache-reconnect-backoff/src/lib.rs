//! Backoff policies for reconnection attempts.
//!
//! A backoff policy is a pure function from an attempt count to a wait
//! duration. The reconnecting client calls it with the number of attempts
//! made since the last successful connect, so the first retry uses
//! `attempt = 0`.
//!
//! # Examples
//!
//! ```
//! use memcache_reconnect_backoff::ReconnectPolicy;
//! use std::time::Duration;
//!
//! let policy = ReconnectPolicy::exponential(
//!     Duration::from_millis(100),
//!     Duration::from_secs(5),
//! );
//!
//! assert_eq!(policy.backoff(0), Duration::from_millis(100));
//! assert_eq!(policy.backoff(1), Duration::from_millis(200));
//! assert_eq!(policy.backoff(20), Duration::from_secs(5));
//! ```

mod backoff;
mod policy;

pub use backoff::{
    BackoffFunction, ExponentialBackoff, ExponentialRandomBackoff, FixedBackoff, FnBackoff,
};
pub use policy::ReconnectPolicy;
