//! Tracker tests.
//!
//! Test organization:
//! - backpressure.rs: admission ceiling and slot reuse
//! - concurrency.rs: admit, resolve and drain racing on several threads

mod concurrency;
