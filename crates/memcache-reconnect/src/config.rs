//! Configuration for raw connections.

use crate::error::ConnectError;
use crate::events::ConnectionEvent;
use crate::scheduler::Scheduler;
use memcache_reconnect_core::events::{EventListeners, EventScope};
use memcache_reconnect_protocol::{binary, Charset, Protocol};
use std::time::Duration;

/// Default memcached address.
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:11211";

/// Configuration for a single memcache connection.
#[derive(Clone, Debug)]
pub struct ConnectionConfig {
    /// Server address as `host:port`.
    pub(crate) address: String,
    /// Name of this client instance, used in logs, events and metrics.
    pub(crate) name: String,
    /// Ceiling on requests admitted but not yet resolved.
    pub(crate) outstanding_request_limit: usize,
    /// Wire protocol.
    pub(crate) protocol: Protocol,
    /// Per-request timeout, started at admission.
    pub(crate) request_timeout: Duration,
    /// Time allowed to establish the transport.
    pub(crate) connect_timeout: Duration,
    /// Largest value accepted by storage commands.
    pub(crate) max_set_length: usize,
    /// Characters allowed in keys.
    pub(crate) charset: Charset,
    /// Consecutive timeouts that tear the connection down. `None` disables.
    pub(crate) max_consecutive_timeouts: Option<usize>,
    /// Event listeners.
    pub(crate) event_listeners: EventListeners<ConnectionEvent>,
    /// Runtime for I/O and timers. `None` uses the ambient runtime.
    pub(crate) scheduler: Option<Scheduler>,
}

impl ConnectionConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> ConnectionConfigBuilder {
        ConnectionConfigBuilder::new()
    }

    /// Server address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Client instance name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Outstanding-request ceiling.
    pub fn outstanding_request_limit(&self) -> usize {
        self.outstanding_request_limit
    }

    /// Wire protocol.
    pub fn protocol(&self) -> Protocol {
        self.protocol
    }

    /// Per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Connect timeout.
    pub fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }

    /// Largest accepted storage payload.
    pub fn max_set_length(&self) -> usize {
        self.max_set_length
    }

    /// Key character set.
    pub fn charset(&self) -> Charset {
        self.charset
    }

    /// Consecutive timeouts tolerated before teardown.
    pub fn max_consecutive_timeouts(&self) -> Option<usize> {
        self.max_consecutive_timeouts
    }

    /// Resolves the configured scheduler, falling back to the ambient runtime.
    pub(crate) fn resolve_scheduler(&self) -> Result<Scheduler, ConnectError> {
        match &self.scheduler {
            Some(scheduler) => Ok(scheduler.clone()),
            None => Scheduler::current(),
        }
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfigBuilder::new().build()
    }
}

/// Builder for [`ConnectionConfig`].
pub struct ConnectionConfigBuilder {
    address: String,
    name: String,
    outstanding_request_limit: usize,
    protocol: Protocol,
    request_timeout: Duration,
    connect_timeout: Duration,
    max_set_length: usize,
    charset: Charset,
    max_consecutive_timeouts: Option<usize>,
    event_listeners: EventListeners<ConnectionEvent>,
    scheduler: Option<Scheduler>,
}

impl ConnectionConfigBuilder {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            name: "memcache".to_string(),
            outstanding_request_limit: 1000,
            protocol: Protocol::Ascii,
            request_timeout: Duration::from_millis(3000),
            connect_timeout: Duration::from_millis(3000),
            max_set_length: 1024 * 1024,
            charset: Charset::Utf8,
            max_consecutive_timeouts: Some(10),
            event_listeners: EventListeners::new(),
            scheduler: None,
        }
    }

    /// Sets the server address.
    ///
    /// Default: "127.0.0.1:11211"
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// Sets the name of this client instance.
    ///
    /// Default: "memcache"
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the outstanding-request ceiling. Zero is raised to one.
    ///
    /// Default: 1000
    pub fn outstanding_request_limit(mut self, limit: usize) -> Self {
        self.outstanding_request_limit = limit.max(1);
        self
    }

    /// Selects the wire protocol.
    ///
    /// Default: `Protocol::Ascii`
    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    /// Sets the per-request timeout.
    ///
    /// Default: 3 seconds
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the connect timeout.
    ///
    /// Default: 3 seconds
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the largest value accepted by storage commands.
    ///
    /// Values above [`binary::MAX_VALUE_LEN`] are clamped to it, since no
    /// larger value fits a binary frame.
    ///
    /// Default: 1 MiB
    pub fn max_set_length(mut self, max: usize) -> Self {
        self.max_set_length = max.min(binary::MAX_VALUE_LEN);
        self
    }

    /// Sets the characters allowed in keys.
    ///
    /// Default: `Charset::Utf8`
    pub fn charset(mut self, charset: Charset) -> Self {
        self.charset = charset;
        self
    }

    /// Sets how many timeouts in a row, with no response in between, tear
    /// the connection down. `None` disables the count.
    ///
    /// With the ASCII protocol every timed-out request leaves a placeholder
    /// until its late response arrives. Independent of this setting, the
    /// connection is closed once placeholders outnumber the outstanding
    /// request limit.
    ///
    /// Default: `Some(10)`
    pub fn max_consecutive_timeouts(mut self, max: Option<usize>) -> Self {
        self.max_consecutive_timeouts = max.map(|m| m.max(1));
        self
    }

    /// Runs connection I/O and timers on the given scheduler.
    ///
    /// Default: the tokio runtime the connection is created on
    pub fn scheduler(mut self, scheduler: Scheduler) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Registers a callback for every connection event.
    pub fn on_event<F>(mut self, f: F) -> Self
    where
        F: Fn(&ConnectionEvent) + Send + Sync + 'static,
    {
        self.event_listeners.add(f);
        self
    }

    /// Registers a callback when a request is rejected with `Overloaded`.
    ///
    /// # Callback Signature
    /// `Fn(usize)` - Called with the configured outstanding-request limit.
    ///
    /// # Example
    /// ```rust
    /// use memcache_reconnect::ConnectionConfig;
    /// use std::sync::atomic::{AtomicUsize, Ordering};
    /// use std::sync::Arc;
    ///
    /// let rejected = Arc::new(AtomicUsize::new(0));
    /// let counter = Arc::clone(&rejected);
    ///
    /// let config = ConnectionConfig::builder()
    ///     .outstanding_request_limit(100)
    ///     .on_request_rejected(move |_limit| {
    ///         counter.fetch_add(1, Ordering::SeqCst);
    ///     })
    ///     .build();
    /// ```
    pub fn on_request_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners
            .add_scoped(EventScope::Request, move |event: &ConnectionEvent| {
                if let ConnectionEvent::RequestRejected { limit, .. } = event {
                    f(*limit);
                }
            });
        self
    }

    /// Registers a callback when a request times out.
    ///
    /// # Callback Signature
    /// `Fn(Duration)` - Called with the configured request timeout.
    pub fn on_request_timeout<F>(mut self, f: F) -> Self
    where
        F: Fn(Duration) + Send + Sync + 'static,
    {
        self.event_listeners
            .add_scoped(EventScope::Request, move |event: &ConnectionEvent| {
                if let ConnectionEvent::RequestTimedOut { timeout, .. } = event {
                    f(*timeout);
                }
            });
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> ConnectionConfig {
        ConnectionConfig {
            address: self.address,
            name: self.name,
            outstanding_request_limit: self.outstanding_request_limit,
            protocol: self.protocol,
            request_timeout: self.request_timeout,
            connect_timeout: self.connect_timeout,
            max_set_length: self.max_set_length,
            charset: self.charset,
            max_consecutive_timeouts: self.max_consecutive_timeouts,
            event_listeners: self.event_listeners,
            scheduler: self.scheduler,
        }
    }
}

impl Default for ConnectionConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
