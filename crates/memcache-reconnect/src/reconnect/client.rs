use super::config::ReconnectConfig;
use super::state::{ClientState, ReconnectState};
use crate::config::ConnectionConfig;
use crate::connection::{Connection, ConnectionHandle, DisconnectListener, ResponseFuture};
use crate::connector::{Connector, TcpConnector};
use crate::error::ConnectError;
use crate::events::ReconnectEvent;
use crate::scheduler::Scheduler;
use futures::future;
use futures::FutureExt;
use memcache_reconnect_core::MemcacheError;
use memcache_reconnect_protocol::Request;
use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};
use std::time::Instant;
use tokio::sync::{mpsc, watch};

#[cfg(feature = "metrics")]
use metrics::counter;

/// A memcache client that stays available across transport failures.
///
/// Requests are forwarded to whichever connection is currently installed.
/// Nothing is queued across a disconnect: while no connection is installed,
/// [`send`](Self::send) fails immediately with
/// [`MemcacheError::NotConnected`].
///
/// Cloning is cheap and all clones share one connection. The client shuts
/// down when [`shutdown`](Self::shutdown) is called or the last clone is
/// dropped.
///
/// # Examples
///
/// ```no_run
/// use memcache_reconnect::{ConnectionConfig, ReconnectConfig, ReconnectingClient, Request};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = ReconnectingClient::tcp(
///     ConnectionConfig::builder().address("10.0.0.5:11211").build(),
///     ReconnectConfig::default(),
/// )?;
///
/// client.connected().await?;
/// client.send(Request::set("greeting", "hello")).await?;
/// let greeting = client.send(Request::get("greeting")).await?;
/// # let _ = greeting;
///
/// client.shutdown();
/// client.disconnected().await;
/// # Ok(())
/// # }
/// ```
pub struct ReconnectingClient<C: Connector> {
    shared: Arc<Shared<C>>,
    _guard: Arc<DropGuard<C>>,
}

impl<C: Connector> Clone for ReconnectingClient<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            _guard: Arc::clone(&self._guard),
        }
    }
}

struct DropGuard<C: Connector>(Arc<Shared<C>>);

impl<C: Connector> Drop for DropGuard<C> {
    fn drop(&mut self) {
        self.0.shutdown();
    }
}

enum Transition<T> {
    Connected(T),
    ConnectFailed(ConnectError),
    Disconnected { generation: u64 },
    RetryFired,
    ShutdownRequested,
}

struct Shared<C: Connector> {
    connector: C,
    config: ReconnectConfig,
    scheduler: Scheduler,
    state: ReconnectState,
    handle: RwLock<ConnectionHandle<C::Connection>>,
    transitions: mpsc::UnboundedSender<Transition<C::Connection>>,
    // Bumped whenever the installed handle or the shutdown flag changes.
    changes: watch::Sender<u64>,
}

impl<C: Connector> ReconnectingClient<C> {
    /// Creates the client and starts the first connect attempt.
    ///
    /// Never waits for the connection; use [`connected`](Self::connected)
    /// for that. Fails only when no scheduler is available.
    pub fn new(connector: C, config: ReconnectConfig) -> Result<Self, ConnectError> {
        let scheduler = config.resolve_scheduler()?;
        let (transitions, inbox) = mpsc::unbounded_channel();
        let (changes, _) = watch::channel(0);

        let shared = Arc::new(Shared {
            connector,
            config,
            scheduler: scheduler.clone(),
            state: ReconnectState::new(),
            handle: RwLock::new(ConnectionHandle::default()),
            transitions,
            changes,
        });

        scheduler.spawn(run(Arc::clone(&shared), inbox));

        Ok(Self {
            _guard: Arc::new(DropGuard(Arc::clone(&shared))),
            shared,
        })
    }

    /// Forwards a request to the installed connection.
    pub fn send(&self, request: Request) -> ResponseFuture {
        self.shared.current().send(request)
    }

    /// Returns true while the installed connection is usable.
    pub fn is_connected(&self) -> bool {
        self.shared.current().is_connected()
    }

    /// Transports behind the installed connection.
    pub fn num_total_connections(&self) -> usize {
        self.shared.current().num_total_connections()
    }

    /// Usable transports behind the installed connection.
    pub fn num_active_connections(&self) -> usize {
        self.shared.current().num_active_connections()
    }

    /// Stops reconnecting and shuts the installed connection down.
    ///
    /// Idempotent and irreversible. Requests in flight fail with
    /// [`MemcacheError::Closed`]; await [`disconnected`](Self::disconnected)
    /// to observe the drain.
    pub fn shutdown(&self) {
        self.shared.shutdown();
    }

    /// Completes once a connection is installed.
    ///
    /// Fails with [`MemcacheError::Closed`] once the client is shut down.
    pub async fn connected(&self) -> Result<(), MemcacheError> {
        let mut changes = self.shared.changes.subscribe();
        loop {
            if !self.shared.state.stay_connected() {
                return Err(MemcacheError::closed("client shut down"));
            }
            if self.is_connected() {
                return Ok(());
            }
            if changes.changed().await.is_err() {
                return Err(MemcacheError::closed("client shut down"));
            }
        }
    }

    /// Completes once the installed connection is no longer usable.
    ///
    /// After [`shutdown`](Self::shutdown) this resolves when every request
    /// in flight on the last connection has been failed.
    pub async fn disconnected(&self) {
        loop {
            let closed = self.shared.current().closed();
            closed.await;
            if !self.is_connected() {
                return;
            }
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ClientState {
        self.shared.state.state()
    }

    /// Reconnect attempts made since the last successful connect.
    pub fn reconnect_count(&self) -> usize {
        self.shared.state.reconnect_count()
    }

    /// The configuration this client was created with.
    pub fn config(&self) -> &ReconnectConfig {
        &self.shared.config
    }
}

impl ReconnectingClient<TcpConnector> {
    /// Creates a client that connects over TCP.
    pub fn tcp(
        connection: impl Into<Arc<ConnectionConfig>>,
        config: ReconnectConfig,
    ) -> Result<Self, ConnectError> {
        Self::new(TcpConnector::new(connection), config)
    }
}

impl<C: Connector> fmt::Display for ReconnectingClient<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Reconnecting({})", self.shared.current())
    }
}

impl<C: Connector> fmt::Debug for ReconnectingClient<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReconnectingClient")
            .field("name", &self.shared.config.name)
            .field("state", &self.state())
            .field("reconnect_count", &self.reconnect_count())
            .finish()
    }
}

impl<C: Connector> Shared<C> {
    fn current(&self) -> RwLockReadGuard<'_, ConnectionHandle<C::Connection>> {
        self.handle.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn install(&self, next: ConnectionHandle<C::Connection>) -> ConnectionHandle<C::Connection> {
        let mut handle = self.handle.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *handle, next)
    }

    fn notify_change(&self) {
        self.changes.send_modify(|version| *version += 1);
    }

    fn shutdown(&self) {
        if self.state.request_shutdown() {
            tracing::info!(client = %self.config.name, "shutdown requested");
            self.config
                .event_listeners
                .emit(&ReconnectEvent::ShutdownRequested {
                    client_name: self.config.name.clone(),
                    timestamp: Instant::now(),
                });
            let _ = self.transitions.send(Transition::ShutdownRequested);
            self.notify_change();
        }
        // A connection installed after the flag flipped is shut down here or
        // by the install path, whichever runs second.
        let current = self.current().clone();
        current.shutdown();
    }

    /// Starts one connect attempt. Panics from the connector are failures.
    fn start_connect(&self) {
        let attempt = match panic::catch_unwind(AssertUnwindSafe(|| self.connector.connect())) {
            Ok(attempt) => attempt,
            Err(panic) => future::ready(Err(ConnectError::Failed(panic_message(&*panic)))).boxed(),
        };
        let transitions = self.transitions.clone();

        self.scheduler.spawn(async move {
            let transition = match AssertUnwindSafe(attempt).catch_unwind().await {
                Ok(Ok(connection)) => Transition::Connected(connection),
                Ok(Err(error)) => Transition::ConnectFailed(error),
                Err(panic) => Transition::ConnectFailed(ConnectError::Failed(panic_message(&*panic))),
            };
            if let Err(mpsc::error::SendError(Transition::Connected(orphan))) = transitions.send(transition) {
                orphan.shutdown();
            }
        });
    }

    fn on_connected(&self, connection: C::Connection, generation: u64) {
        // Taken before install so a racing shutdown can never see a
        // connection whose listener is still up for grabs.
        let listener = connection.take_disconnect_listener();
        self.state.reset_reconnect_count();

        let previous = self.install(ConnectionHandle::Active(connection.clone()));
        previous.shutdown();

        if !self.state.stay_connected() {
            tracing::debug!(
                client = %self.config.name,
                connection = %connection,
                "connected after shutdown was requested, closing"
            );
            connection.shutdown();
            drop(listener);
            self.notify_change();
            return;
        }

        self.state.transition(ClientState::Connected);
        tracing::info!(client = %self.config.name, connection = %connection, "connected");
        self.config.event_listeners.emit(&ReconnectEvent::Connected {
            client_name: self.config.name.clone(),
            timestamp: Instant::now(),
            connection: connection.to_string(),
        });

        let listener = listener.unwrap_or_else(|| {
            tracing::error!(
                client = %self.config.name,
                connection = %connection,
                "disconnect listener already taken, falling back to closed()"
            );
            DisconnectListener::new(connection.closed())
        });
        let transitions = self.transitions.clone();
        self.scheduler.spawn(async move {
            listener.await;
            let _ = transitions.send(Transition::Disconnected { generation });
        });

        self.notify_change();
    }

    fn on_connect_failed(&self, error: ConnectError) {
        if self.state.stay_connected() {
            tracing::warn!(
                client = %self.config.name,
                error = %error,
                kind = error.kind(),
                "connect failed"
            );
            self.config
                .event_listeners
                .emit(&ReconnectEvent::ConnectFailed {
                    client_name: self.config.name.clone(),
                    timestamp: Instant::now(),
                    error: error.to_string(),
                });

            #[cfg(feature = "metrics")]
            counter!("memcache_connect_failures_total", "client" => self.config.name.clone())
                .increment(1);
        }
        self.schedule_retry();
    }

    fn on_disconnected(&self) {
        if !self.state.stay_connected() {
            return;
        }
        let previous = self.install(ConnectionHandle::default());
        previous.shutdown();

        tracing::info!(client = %self.config.name, connection = %previous, "disconnected");
        self.config
            .event_listeners
            .emit(&ReconnectEvent::Disconnected {
                client_name: self.config.name.clone(),
                timestamp: Instant::now(),
            });
        self.notify_change();
        self.schedule_retry();
    }

    fn schedule_retry(&self) {
        if !self.state.stay_connected() || !self.state.transition(ClientState::Backoff) {
            return;
        }
        let attempt = self.state.reconnect_count();
        let delay = self.config.policy.backoff(attempt);

        tracing::warn!(
            client = %self.config.name,
            attempt,
            backoff_ms = delay.as_millis() as u64,
            "scheduling reconnect"
        );
        self.config
            .event_listeners
            .emit(&ReconnectEvent::ReconnectScheduled {
                client_name: self.config.name.clone(),
                timestamp: Instant::now(),
                attempt,
                delay,
            });

        // Not cancelled on shutdown; the fire is ignored once terminal.
        let transitions = self.transitions.clone();
        self.scheduler.schedule(delay, async move {
            let _ = transitions.send(Transition::RetryFired);
        });
    }

    fn on_retry_fired(&self) {
        let attempt = self.state.increment_reconnect_count();
        tracing::debug!(client = %self.config.name, attempt, "reconnecting");

        #[cfg(feature = "metrics")]
        counter!("memcache_reconnects_total", "client" => self.config.name.clone()).increment(1);

        self.start_connect();
    }
}

/// The state machine. Exits once shut down with no connect attempt in flight.
async fn run<C: Connector>(
    shared: Arc<Shared<C>>,
    mut inbox: mpsc::UnboundedReceiver<Transition<C::Connection>>,
) {
    let mut generation = 0u64;
    let mut connecting = true;
    shared.start_connect();

    while let Some(transition) = inbox.recv().await {
        match transition {
            Transition::Connected(connection) => {
                connecting = false;
                generation += 1;
                shared.on_connected(connection, generation);
            }
            Transition::ConnectFailed(error) => {
                connecting = false;
                shared.on_connect_failed(error);
            }
            Transition::Disconnected { generation: fired } => {
                if fired == generation {
                    shared.on_disconnected();
                }
            }
            Transition::RetryFired => {
                if shared.state.stay_connected() && !connecting {
                    connecting = true;
                    shared.on_retry_fired();
                }
            }
            Transition::ShutdownRequested => {}
        }

        if !shared.state.stay_connected() && !connecting {
            break;
        }
    }

    tracing::trace!(client = %shared.config.name, "reconnect state machine stopped");
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        format!("connector panicked: {}", message)
    } else if let Some(message) = panic.downcast_ref::<String>() {
        format!("connector panicked: {}", message)
    } else {
        "connector panicked".to_string()
    }
}
