//! Reconnection policies selecting a backoff strategy.

use crate::backoff::{
    BackoffFunction, ExponentialBackoff, ExponentialRandomBackoff, FixedBackoff, FnBackoff,
};
use std::sync::Arc;
use std::time::Duration;

/// Reconnection policy defining how long to wait between connect attempts.
pub enum ReconnectPolicy {
    /// Fixed delay between attempts
    Fixed(FixedBackoff),

    /// Exponential backoff between attempts
    Exponential(ExponentialBackoff),

    /// Exponential backoff with randomization to prevent thundering herd
    ExponentialRandom(ExponentialRandomBackoff),

    /// Custom backoff function
    Custom(Arc<dyn BackoffFunction>),
}

impl Clone for ReconnectPolicy {
    fn clone(&self) -> Self {
        match self {
            Self::Fixed(f) => Self::Fixed(f.clone()),
            Self::Exponential(e) => Self::Exponential(e.clone()),
            Self::ExponentialRandom(e) => Self::ExponentialRandom(e.clone()),
            Self::Custom(c) => Self::Custom(Arc::clone(c)),
        }
    }
}

impl ReconnectPolicy {
    /// Create a fixed delay policy
    pub fn fixed(delay: Duration) -> Self {
        ReconnectPolicy::Fixed(FixedBackoff::new(delay))
    }

    /// Create an exponential backoff policy doubling on every attempt
    ///
    /// # Arguments
    /// * `initial_delay` - Starting delay (e.g., 100ms)
    /// * `max_delay` - Maximum delay cap (e.g., 5 seconds)
    pub fn exponential(initial_delay: Duration, max_delay: Duration) -> Self {
        ReconnectPolicy::Exponential(
            ExponentialBackoff::new(initial_delay)
                .multiplier(2.0)
                .max_backoff(max_delay),
        )
    }

    /// Create an exponential backoff policy with randomization
    ///
    /// # Arguments
    /// * `initial_delay` - Starting delay
    /// * `max_delay` - Maximum delay cap
    /// * `randomization_factor` - Randomization factor (0.0 to 1.0)
    pub fn exponential_random(
        initial_delay: Duration,
        max_delay: Duration,
        randomization_factor: f64,
    ) -> Self {
        ReconnectPolicy::ExponentialRandom(
            ExponentialRandomBackoff::new(initial_delay, randomization_factor)
                .multiplier(2.0)
                .max_backoff(max_delay),
        )
    }

    /// Create a policy from any backoff function
    pub fn custom<B>(backoff: B) -> Self
    where
        B: BackoffFunction + 'static,
    {
        ReconnectPolicy::Custom(Arc::new(backoff))
    }

    /// Create a policy from a closure
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(usize) -> Duration + Send + Sync + 'static,
    {
        Self::custom(FnBackoff::new(f))
    }

    /// Get the delay before the given attempt
    pub fn backoff(&self, attempt: usize) -> Duration {
        match self {
            ReconnectPolicy::Fixed(backoff) => backoff.backoff(attempt),
            ReconnectPolicy::Exponential(backoff) => backoff.backoff(attempt),
            ReconnectPolicy::ExponentialRandom(backoff) => backoff.backoff(attempt),
            ReconnectPolicy::Custom(func) => func.backoff(attempt),
        }
    }
}

impl BackoffFunction for ReconnectPolicy {
    fn backoff(&self, attempt: usize) -> Duration {
        ReconnectPolicy::backoff(self, attempt)
    }
}

impl Default for ReconnectPolicy {
    /// Exponential backoff from 10ms growing by 2.5x per attempt, capped at
    /// one minute.
    fn default() -> Self {
        ReconnectPolicy::Exponential(
            ExponentialBackoff::new(Duration::from_millis(10))
                .multiplier(2.5)
                .max_backoff(Duration::from_secs(60)),
        )
    }
}

impl std::fmt::Debug for ReconnectPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fixed(_) => write!(f, "ReconnectPolicy::Fixed"),
            Self::Exponential(_) => write!(f, "ReconnectPolicy::Exponential"),
            Self::ExponentialRandom(_) => write!(f, "ReconnectPolicy::ExponentialRandom"),
            Self::Custom(_) => write!(f, "ReconnectPolicy::Custom"),
        }
    }
}
