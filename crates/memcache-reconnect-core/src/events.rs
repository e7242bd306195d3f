//! Event system for connection and reconnection observability.
//!
//! The raw connection and the reconnecting client report what they do as
//! typed events. Events fall into two [`EventScope`]s: per-request events
//! (admission, rejection, timeout) fire on the request path and can be very
//! frequent, while connection events (connect, disconnect, protocol failure,
//! close) are rare lifecycle changes. Listeners can subscribe to one scope
//! only, and emitters skip building request events nobody listens to.
//!
//! Any `Fn(&E) + Send + Sync` closure is a listener.
//!
//! ```
//! use memcache_reconnect_core::events::{EventListeners, EventScope, MemcacheEvent};
//! use std::time::Instant;
//!
//! #[derive(Debug)]
//! struct Admitted(Instant);
//!
//! impl MemcacheEvent for Admitted {
//!     fn event_type(&self) -> &'static str { "request_admitted" }
//!     fn scope(&self) -> EventScope { EventScope::Request }
//!     fn timestamp(&self) -> Instant { self.0 }
//!     fn client_name(&self) -> &str { "cache-1" }
//! }
//!
//! let mut listeners = EventListeners::new();
//! listeners.add_scoped(EventScope::Connection, |event: &Admitted| {
//!     panic!("not a connection event: {:?}", event);
//! });
//! assert!(!listeners.wants(EventScope::Request));
//! listeners.emit_with(EventScope::Request, || Admitted(Instant::now()));
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// What part of the client an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventScope {
    /// A single request: admitted, rejected or timed out.
    Request,
    /// The transport or the reconnect loop.
    Connection,
}

/// An event emitted by the memcache client components.
pub trait MemcacheEvent: Send + Sync + fmt::Debug {
    /// Stable snake_case name, e.g. `"request_rejected"` or `"connected"`.
    fn event_type(&self) -> &'static str;

    /// Whether this event is about one request or the connection.
    fn scope(&self) -> EventScope;

    /// When the event occurred.
    fn timestamp(&self) -> Instant;

    /// Name of the client instance that emitted the event.
    fn client_name(&self) -> &str;
}

/// Receives client events.
pub trait EventListener<E: MemcacheEvent>: Send + Sync {
    /// Called once per emitted event the listener subscribed to.
    fn on_event(&self, event: &E);
}

impl<E, F> EventListener<E> for F
where
    E: MemcacheEvent,
    F: Fn(&E) + Send + Sync,
{
    fn on_event(&self, event: &E) {
        self(event)
    }
}

struct Registration<E: MemcacheEvent> {
    // None listens to every scope.
    scope: Option<EventScope>,
    listener: Arc<dyn EventListener<E>>,
}

impl<E: MemcacheEvent> Clone for Registration<E> {
    fn clone(&self) -> Self {
        Self {
            scope: self.scope,
            listener: Arc::clone(&self.listener),
        }
    }
}

impl<E: MemcacheEvent> Registration<E> {
    fn accepts(&self, scope: EventScope) -> bool {
        self.scope.is_none_or(|wanted| wanted == scope)
    }
}

/// The listeners registered on one client or connection.
pub struct EventListeners<E: MemcacheEvent> {
    registrations: Vec<Registration<E>>,
}

impl<E: MemcacheEvent> EventListeners<E> {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self {
            registrations: Vec::new(),
        }
    }

    /// Adds a listener for events of every scope.
    pub fn add<L>(&mut self, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.registrations.push(Registration {
            scope: None,
            listener: Arc::new(listener),
        });
    }

    /// Adds a listener that only sees events of `scope`.
    pub fn add_scoped<L>(&mut self, scope: EventScope, listener: L)
    where
        L: EventListener<E> + 'static,
    {
        self.registrations.push(Registration {
            scope: Some(scope),
            listener: Arc::new(listener),
        });
    }

    /// Returns true if any listener would receive an event of `scope`.
    pub fn wants(&self, scope: EventScope) -> bool {
        self.registrations.iter().any(|r| r.accepts(scope))
    }

    /// Delivers `event` to every listener subscribed to its scope.
    ///
    /// Listener panics are caught; the remaining listeners still run and the
    /// emitting I/O or timer task is unaffected.
    pub fn emit(&self, event: &E) {
        let scope = event.scope();
        for registration in self.registrations.iter().filter(|r| r.accepts(scope)) {
            let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                registration.listener.on_event(event);
            }));
        }
    }

    /// Builds and delivers an event only if someone listens to `scope`.
    pub fn emit_with(&self, scope: EventScope, event: impl FnOnce() -> E) {
        if self.wants(scope) {
            self.emit(&event());
        }
    }

    /// Returns true if there are no listeners.
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Returns the number of listeners.
    pub fn len(&self) -> usize {
        self.registrations.len()
    }
}

impl<E: MemcacheEvent> Clone for EventListeners<E> {
    fn clone(&self) -> Self {
        Self {
            registrations: self.registrations.clone(),
        }
    }
}

impl<E: MemcacheEvent> Default for EventListeners<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: MemcacheEvent> fmt::Debug for EventListeners<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scoped = self
            .registrations
            .iter()
            .filter(|r| r.scope.is_some())
            .count();
        f.debug_struct("EventListeners")
            .field("len", &self.registrations.len())
            .field("scoped", &scoped)
            .finish()
    }
}
