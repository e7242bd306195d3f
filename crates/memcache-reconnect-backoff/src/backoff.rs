use std::time::Duration;

/// Computes the wait before a reconnection attempt.
///
/// Implementations must be cheap and must not block: the function is called
/// from the reconnect state machine each time a retry is scheduled.
pub trait BackoffFunction: Send + Sync {
    /// Computes the delay before the next reconnection attempt.
    ///
    /// # Arguments
    /// * `attempt` - Attempts made since the last successful connect (0-indexed)
    fn backoff(&self, attempt: usize) -> Duration;
}

/// Fixed backoff - returns the same duration for every attempt.
#[derive(Debug, Clone)]
pub struct FixedBackoff {
    duration: Duration,
}

impl FixedBackoff {
    /// Creates a new fixed backoff.
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

impl BackoffFunction for FixedBackoff {
    fn backoff(&self, _attempt: usize) -> Duration {
        self.duration
    }
}

/// Exponential backoff with configurable multiplier and cap.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial: Duration,
    multiplier: f64,
    max: Option<Duration>,
}

impl ExponentialBackoff {
    /// Creates a new exponential backoff with a multiplier of 2.0 and no cap.
    pub fn new(initial: Duration) -> Self {
        Self {
            initial,
            multiplier: 2.0,
            max: None,
        }
    }

    /// Sets the growth multiplier. Values below 1.0 are raised to 1.0 so the
    /// sequence never shrinks.
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = if multiplier.is_finite() {
            multiplier.max(1.0)
        } else {
            1.0
        };
        self
    }

    /// Sets the maximum delay.
    pub fn max_backoff(mut self, max: Duration) -> Self {
        self.max = Some(max);
        self
    }

    fn uncapped(&self, attempt: usize) -> Duration {
        let exponent = attempt.min(i32::MAX as usize) as i32;
        let secs = self.initial.as_secs_f64() * self.multiplier.powi(exponent);
        Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
    }
}

impl BackoffFunction for ExponentialBackoff {
    fn backoff(&self, attempt: usize) -> Duration {
        let interval = self.uncapped(attempt);
        match self.max {
            Some(max) => interval.min(max),
            None => interval,
        }
    }
}

/// Exponential backoff with randomization, so that many clients losing the
/// same server do not reconnect in lockstep.
#[derive(Debug, Clone)]
pub struct ExponentialRandomBackoff {
    inner: ExponentialBackoff,
    randomization_factor: f64,
}

impl ExponentialRandomBackoff {
    /// Creates a new exponential random backoff.
    ///
    /// # Arguments
    /// * `initial` - The base delay
    /// * `randomization_factor` - Factor for randomization (0.0 to 1.0).
    ///   A factor of 0.5 yields a delay between 50% and 150% of the
    ///   exponential value.
    pub fn new(initial: Duration, randomization_factor: f64) -> Self {
        Self {
            inner: ExponentialBackoff::new(initial),
            randomization_factor: randomization_factor.clamp(0.0, 1.0),
        }
    }

    /// Sets the growth multiplier.
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.inner = self.inner.multiplier(multiplier);
        self
    }

    /// Sets the maximum delay before randomization.
    pub fn max_backoff(mut self, max: Duration) -> Self {
        self.inner = self.inner.max_backoff(max);
        self
    }

    fn randomize(&self, duration: Duration) -> Duration {
        use rand::Rng;
        if self.randomization_factor == 0.0 || duration.is_zero() {
            return duration;
        }
        let base = duration.as_secs_f64();
        let delta = base * self.randomization_factor;
        let randomized = rand::rng().random_range((base - delta)..=(base + delta));
        Duration::try_from_secs_f64(randomized.max(0.0)).unwrap_or(duration)
    }
}

impl BackoffFunction for ExponentialRandomBackoff {
    fn backoff(&self, attempt: usize) -> Duration {
        self.randomize(self.inner.backoff(attempt))
    }
}

/// Function-based backoff.
pub struct FnBackoff<F> {
    f: F,
}

impl<F> FnBackoff<F>
where
    F: Fn(usize) -> Duration + Send + Sync,
{
    /// Creates a new function-based backoff.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> BackoffFunction for FnBackoff<F>
where
    F: Fn(usize) -> Duration + Send + Sync,
{
    fn backoff(&self, attempt: usize) -> Duration {
        (self.f)(attempt)
    }
}
