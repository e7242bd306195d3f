//! Reconnect state shared between the client handle and its state machine.

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};

/// Lifecycle state of a [`ReconnectingClient`](crate::ReconnectingClient).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// The first connect attempt is in flight.
    ConnectingFresh,

    /// A connection is installed.
    Connected,

    /// Waiting for, or running, a scheduled reconnect attempt.
    Backoff,

    /// Shutdown was requested. Terminal.
    ShuttingDown,
}

impl ClientState {
    fn encode(self) -> u8 {
        match self {
            ClientState::ConnectingFresh => 0,
            ClientState::Connected => 1,
            ClientState::Backoff => 2,
            ClientState::ShuttingDown => 3,
        }
    }

    fn decode(encoded: u8) -> Self {
        match encoded {
            0 => ClientState::ConnectingFresh,
            1 => ClientState::Connected,
            2 => ClientState::Backoff,
            _ => ClientState::ShuttingDown,
        }
    }
}

/// Atomic reconnect bookkeeping.
///
/// `stay_connected` only ever goes from true to false, and once it is false
/// the state is pinned to [`ClientState::ShuttingDown`].
#[derive(Debug)]
pub(crate) struct ReconnectState {
    state: AtomicU8,
    reconnect_count: AtomicUsize,
    stay_connected: AtomicBool,
}

impl ReconnectState {
    pub(crate) fn new() -> Self {
        Self {
            state: AtomicU8::new(ClientState::ConnectingFresh.encode()),
            reconnect_count: AtomicUsize::new(0),
            stay_connected: AtomicBool::new(true),
        }
    }

    pub(crate) fn state(&self) -> ClientState {
        ClientState::decode(self.state.load(Ordering::Acquire))
    }

    /// Moves to `next` unless shutting down. Returns false if terminal.
    pub(crate) fn transition(&self, next: ClientState) -> bool {
        self.state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (ClientState::decode(current) != ClientState::ShuttingDown).then_some(next.encode())
            })
            .is_ok()
    }

    pub(crate) fn stay_connected(&self) -> bool {
        self.stay_connected.load(Ordering::SeqCst)
    }

    /// Requests shutdown. Returns true only for the call that flipped the flag.
    pub(crate) fn request_shutdown(&self) -> bool {
        let first = self.stay_connected.swap(false, Ordering::SeqCst);
        self.state
            .store(ClientState::ShuttingDown.encode(), Ordering::Release);
        first
    }

    pub(crate) fn reconnect_count(&self) -> usize {
        self.reconnect_count.load(Ordering::Acquire)
    }

    pub(crate) fn increment_reconnect_count(&self) -> usize {
        self.reconnect_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub(crate) fn reset_reconnect_count(&self) {
        self.reconnect_count.store(0, Ordering::Release);
    }
}
