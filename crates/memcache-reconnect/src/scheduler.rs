//! Shared timer and task resource.
//!
//! Per-request timeouts, backoff waits, connection I/O and the reconnect
//! state machine all run on a [`Scheduler`]. Several clients can share one
//! scheduler so they share a single lightweight thread instead of each
//! spawning their own.

use crate::error::ConnectError;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::runtime::{Builder, Handle};
use tokio::sync::oneshot;
use tokio::task::{AbortHandle, JoinHandle};

/// Name of the thread behind [`Scheduler::shared`].
pub const SHARED_THREAD_NAME: &str = "memcache-reconnecter";

static SHARED: OnceLock<Scheduler> = OnceLock::new();

/// Cloneable handle to the runtime that drives timers and connection tasks.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

struct Inner {
    handle: Handle,
    // Stops the dedicated thread when the last clone is dropped.
    _owner: Option<oneshot::Sender<()>>,
    thread_name: Option<String>,
}

impl Scheduler {
    /// Uses the tokio runtime the caller is running on.
    pub fn current() -> Result<Self, ConnectError> {
        let handle = Handle::try_current().map_err(|_| ConnectError::NoScheduler)?;
        Ok(Self::from_handle(handle))
    }

    /// Uses an existing runtime handle.
    pub fn from_handle(handle: Handle) -> Self {
        Self {
            inner: Arc::new(Inner {
                handle,
                _owner: None,
                thread_name: None,
            }),
        }
    }

    /// Starts a single named thread running its own current-thread runtime.
    ///
    /// The thread stops once every clone of the returned scheduler is
    /// dropped; tasks still pending on it are cancelled.
    pub fn dedicated(thread_name: impl Into<String>) -> std::io::Result<Self> {
        let thread_name = thread_name.into();
        let runtime = Builder::new_current_thread().enable_all().build()?;
        let handle = runtime.handle().clone();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        std::thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                runtime.block_on(async {
                    let _ = stop_rx.await;
                });
            })?;

        tracing::debug!(thread = %thread_name, "started scheduler thread");

        Ok(Self {
            inner: Arc::new(Inner {
                handle,
                _owner: Some(stop_tx),
                thread_name: Some(thread_name),
            }),
        })
    }

    /// The process-wide scheduler, created on first use.
    pub fn shared() -> std::io::Result<Self> {
        if let Some(scheduler) = SHARED.get() {
            return Ok(scheduler.clone());
        }
        let scheduler = Self::dedicated(SHARED_THREAD_NAME)?;
        // A concurrent caller may have won; the losing scheduler shuts down on drop.
        Ok(SHARED.get_or_init(|| scheduler).clone())
    }

    /// Runs `future` after `delay`.
    pub fn schedule<F>(&self, delay: Duration, future: F) -> TimerHandle
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let task = self.inner.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            future.await;
        });
        TimerHandle {
            abort: task.abort_handle(),
        }
    }

    /// Runs `future` as soon as possible.
    pub fn spawn<F>(&self, future: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.inner.handle.spawn(future)
    }

    /// The underlying runtime handle.
    pub fn handle(&self) -> &Handle {
        &self.inner.handle
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("thread", &self.inner.thread_name)
            .finish()
    }
}

/// A pending timer created by [`Scheduler::schedule`].
#[derive(Debug)]
pub struct TimerHandle {
    abort: AbortHandle,
}

impl TimerHandle {
    /// Cancels the timer. Has no effect once it has fired.
    pub fn cancel(&self) {
        self.abort.abort();
    }

    /// Returns true once the timer has fired or been cancelled.
    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }
}
