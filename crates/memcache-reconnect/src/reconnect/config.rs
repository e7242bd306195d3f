//! Configuration for the reconnecting client.

use crate::error::ConnectError;
use crate::events::ReconnectEvent;
use crate::scheduler::Scheduler;
use memcache_reconnect_backoff::ReconnectPolicy;
use memcache_reconnect_core::events::{EventListeners, EventScope};
use std::time::Duration;

/// Configuration for reconnection behavior.
#[derive(Clone, Debug)]
pub struct ReconnectConfig {
    /// The policy computing the wait before each reconnect attempt.
    pub(crate) policy: ReconnectPolicy,
    /// Name of this client instance.
    pub(crate) name: String,
    /// Event listeners.
    pub(crate) event_listeners: EventListeners<ReconnectEvent>,
    /// Runtime for the state machine and backoff timers.
    pub(crate) scheduler: Option<Scheduler>,
}

impl ReconnectConfig {
    /// Creates a new builder for configuring reconnection behavior.
    pub fn builder() -> ReconnectConfigBuilder {
        ReconnectConfigBuilder::default()
    }

    /// Returns the reconnection policy.
    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Returns the client name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn resolve_scheduler(&self) -> Result<Scheduler, ConnectError> {
        match &self.scheduler {
            Some(scheduler) => Ok(scheduler.clone()),
            None => Scheduler::current(),
        }
    }
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        ReconnectConfigBuilder::default().build()
    }
}

/// Builder for constructing a `ReconnectConfig`.
#[derive(Debug)]
pub struct ReconnectConfigBuilder {
    policy: ReconnectPolicy,
    name: String,
    event_listeners: EventListeners<ReconnectEvent>,
    scheduler: Option<Scheduler>,
}

impl ReconnectConfigBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the reconnection policy.
    ///
    /// Default: exponential from 10ms, multiplied by 2.5 per attempt, capped at one minute.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::time::Duration;
    /// use memcache_reconnect::{ReconnectConfig, ReconnectPolicy};
    ///
    /// let config = ReconnectConfig::builder()
    ///     .policy(ReconnectPolicy::exponential(
    ///         Duration::from_millis(100),
    ///         Duration::from_secs(10),
    ///     ))
    ///     .build();
    /// ```
    pub fn policy(mut self, policy: ReconnectPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the name of this client instance.
    ///
    /// Default: "memcache"
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Runs the state machine and backoff timers on the given scheduler.
    ///
    /// Default: the tokio runtime the client is created on
    pub fn scheduler(mut self, scheduler: Scheduler) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Registers a callback for every reconnect event.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&ReconnectEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add(f);
        self
    }

    /// Registers a callback when a connection is installed.
    ///
    /// The callback receives a description of the new connection.
    pub fn on_connected<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.event_listeners
            .add_scoped(EventScope::Connection, move |event: &ReconnectEvent| {
                if let ReconnectEvent::Connected { connection, .. } = event {
                    f(connection);
                }
            });
        self
    }

    /// Registers a callback when a connect attempt fails.
    ///
    /// The callback receives the error message.
    pub fn on_connect_failed<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.event_listeners
            .add_scoped(EventScope::Connection, move |event: &ReconnectEvent| {
                if let ReconnectEvent::ConnectFailed { error, .. } = event {
                    f(error);
                }
            });
        self
    }

    /// Registers a callback when the installed connection goes away.
    pub fn on_disconnected<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners
            .add_scoped(EventScope::Connection, move |event: &ReconnectEvent| {
                if let ReconnectEvent::Disconnected { .. } = event {
                    f();
                }
            });
        self
    }

    /// Registers a callback when a reconnect attempt is scheduled.
    ///
    /// # Callback Signature
    /// `Fn(usize, Duration)` - Called with the attempt number (0 for the
    /// first retry after a success) and the wait before the attempt.
    ///
    /// Never called once shutdown has been requested.
    ///
    /// # Examples
    ///
    /// ```
    /// use memcache_reconnect::ReconnectConfig;
    ///
    /// let config = ReconnectConfig::builder()
    ///     .on_reconnect_scheduled(|attempt, delay| {
    ///         println!("reconnect attempt {} in {:?}", attempt, delay);
    ///     })
    ///     .build();
    /// ```
    pub fn on_reconnect_scheduled<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, Duration) + Send + Sync + 'static,
    {
        self.event_listeners
            .add_scoped(EventScope::Connection, move |event: &ReconnectEvent| {
                if let ReconnectEvent::ReconnectScheduled { attempt, delay, .. } = event {
                    f(*attempt, *delay);
                }
            });
        self
    }

    /// Builds the `ReconnectConfig`.
    pub fn build(self) -> ReconnectConfig {
        ReconnectConfig {
            policy: self.policy,
            name: self.name,
            event_listeners: self.event_listeners,
            scheduler: self.scheduler,
        }
    }
}

impl Default for ReconnectConfigBuilder {
    fn default() -> Self {
        Self {
            policy: ReconnectPolicy::default(),
            name: "memcache".to_string(),
            event_listeners: EventListeners::new(),
            scheduler: None,
        }
    }
}
