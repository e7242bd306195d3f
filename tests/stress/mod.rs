//! Stress tests for memcache-reconnect
//!
//! ## What We Test
//!
//! - **High volume**: hundreds of thousands of requests over one transport
//! - **High concurrency**: many tasks sharing one connection at its ceiling
//! - **Churn**: servers dropping connections while requests are in flight
//! - **Resolution**: every request resolves exactly once, nothing hangs

pub mod raw;
pub mod reconnect;

use std::collections::HashMap;
use std::sync::Mutex;

/// Utility: count outcomes by kind
#[derive(Default)]
pub struct Outcomes {
    counts: Mutex<HashMap<&'static str, usize>>,
}

impl Outcomes {
    pub fn record<T>(&self, outcome: &Result<T, memcache_reconnect::MemcacheError>) {
        let kind = match outcome {
            Ok(_) => "ok",
            Err(e) => e.kind(),
        };
        *self.counts.lock().unwrap().entry(kind).or_default() += 1;
    }

    pub fn get(&self, kind: &str) -> usize {
        self.counts.lock().unwrap().get(kind).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.lock().unwrap().values().sum()
    }

    pub fn report(&self) -> String {
        format!("{:?}", self.counts.lock().unwrap())
    }
}
