//! Outstanding-request tracker.
//!
//! A bounded map from request id to the request's completion handle. The
//! raw connection admits requests into it, correlates responses against it
//! and drains it on teardown. Every operation runs under one narrow mutex
//! that is never held across an await, so `admit`, `resolve` and
//! `drain_all` are mutually atomic and every entry is completed exactly once.
//!
//! Completion handles are always resolved after the lock is released.

use crate::scheduler::TimerHandle;
use memcache_reconnect_core::MemcacheError;
use memcache_reconnect_protocol::{Protocol, Request, Response};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Mutex, MutexGuard};
use std::task::{Context, Poll};
use std::time::Instant;
use tokio::sync::oneshot;

type Outcome = Result<Response, MemcacheError>;

/// How responses are matched to requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Correlation {
    /// The n-th response answers the n-th request.
    Fifo,
    /// Responses carry the request id.
    ById,
}

impl From<Protocol> for Correlation {
    fn from(protocol: Protocol) -> Self {
        if protocol.correlates_by_id() {
            Correlation::ById
        } else {
            Correlation::Fifo
        }
    }
}

/// A request admitted into the tracker and not yet resolved.
pub struct Entry {
    id: u32,
    request: Request,
    admitted_at: Instant,
    completion: oneshot::Sender<Outcome>,
    timer: Option<TimerHandle>,
}

impl Entry {
    /// The id the request was written with.
    pub fn id(&self) -> u32 {
        self.id
    }

    /// The original request.
    pub fn request(&self) -> &Request {
        &self.request
    }

    /// When the request was admitted.
    pub fn admitted_at(&self) -> Instant {
        self.admitted_at
    }

    /// Resolves the request and cancels its timeout.
    pub fn complete(mut self, outcome: Outcome) {
        if let Some(timer) = self.timer.take() {
            timer.cancel();
        }
        // The caller may have dropped its future.
        let _ = self.completion.send(outcome);
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("id", &self.id)
            .field("command", &self.request.command())
            .finish()
    }
}

/// Result of taking the oldest request in FIFO mode.
#[derive(Debug)]
pub enum Next {
    /// The oldest live request.
    Entry(Entry),
    /// The oldest request already timed out; its response is to be discarded.
    Tombstone(u32),
    /// Nothing is outstanding.
    Empty,
}

/// Future resolving with the outcome of an admitted request.
#[derive(Debug)]
pub struct Pending {
    id: u32,
    rx: oneshot::Receiver<Outcome>,
}

impl Pending {
    /// The id assigned at admission.
    pub fn id(&self) -> u32 {
        self.id
    }
}

impl Future for Pending {
    type Output = Outcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|received| {
            received.unwrap_or_else(|_| Err(MemcacheError::closed("request abandoned")))
        })
    }
}

struct Inner {
    next_id: u32,
    entries: HashMap<u32, Entry>,
    // Write order; FIFO mode only. Ids without an entry are tombstones.
    order: VecDeque<u32>,
    closed: Option<MemcacheError>,
}

/// Bounded registry of outstanding requests.
pub struct Tracker {
    limit: usize,
    correlation: Correlation,
    inner: Mutex<Inner>,
}

impl Tracker {
    /// Creates a tracker admitting at most `limit` requests at a time.
    pub fn new(limit: usize, correlation: Correlation) -> Self {
        Self {
            limit: limit.max(1),
            correlation,
            inner: Mutex::new(Inner {
                next_id: 0,
                entries: HashMap::new(),
                order: VecDeque::new(),
                closed: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The outstanding-request ceiling.
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// The correlation mode.
    pub fn correlation(&self) -> Correlation {
        self.correlation
    }

    /// Number of outstanding requests. Tombstones are not counted.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Number of timed-out FIFO requests whose responses are still due.
    /// Always zero when correlating by id.
    pub fn tombstones(&self) -> usize {
        let inner = self.lock();
        inner.order.len().saturating_sub(inner.entries.len())
    }

    /// Returns true if nothing is outstanding.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true once [`drain_all`](Self::drain_all) has run.
    pub fn is_closed(&self) -> bool {
        self.lock().closed.is_some()
    }

    /// Admits a request.
    pub fn admit(&self, request: Request) -> Result<Pending, MemcacheError> {
        self.admit_with(request, |_, _| Ok(()))
    }

    /// Admits a request and runs `enqueue` with its id while still holding
    /// the lock, so admission order equals enqueue order.
    ///
    /// Fails with the drain reason once closed, otherwise with `Overloaded`
    /// when the limit is reached. If `enqueue` fails nothing is stored.
    pub fn admit_with<F>(&self, request: Request, enqueue: F) -> Result<Pending, MemcacheError>
    where
        F: FnOnce(u32, &Request) -> Result<(), MemcacheError>,
    {
        let mut inner = self.lock();
        if let Some(reason) = &inner.closed {
            return Err(reason.clone());
        }
        if inner.entries.len() >= self.limit {
            return Err(MemcacheError::Overloaded { limit: self.limit });
        }

        let id = inner.allocate_id();
        enqueue(id, &request)?;

        let (tx, rx) = oneshot::channel();
        inner.entries.insert(
            id,
            Entry {
                id,
                request,
                admitted_at: Instant::now(),
                completion: tx,
                timer: None,
            },
        );
        if self.correlation == Correlation::Fifo {
            inner.order.push_back(id);
        }
        Ok(Pending { id, rx })
    }

    /// Attaches the timeout timer of an admitted request. If the request was
    /// already resolved the timer is cancelled.
    pub fn attach_timer(&self, id: u32, timer: TimerHandle) {
        let mut inner = self.lock();
        match inner.entries.get_mut(&id) {
            Some(entry) => entry.timer = Some(timer),
            None => timer.cancel(),
        }
    }

    /// Removes the entry with the given id.
    pub fn take(&self, id: u32) -> Option<Entry> {
        let mut inner = self.lock();
        let entry = inner.entries.remove(&id)?;
        if self.correlation == Correlation::Fifo {
            inner.order.retain(|queued| *queued != id);
        }
        Some(entry)
    }

    /// Removes the oldest request in write order. FIFO mode only; always
    /// [`Next::Empty`] when correlating by id.
    pub fn take_next(&self) -> Next {
        let mut inner = self.lock();
        match inner.order.pop_front() {
            None => Next::Empty,
            Some(id) => match inner.entries.remove(&id) {
                Some(entry) => Next::Entry(entry),
                None => Next::Tombstone(id),
            },
        }
    }

    /// Resolves the request with the given id.
    ///
    /// Returns false, and does nothing, if the id is unknown.
    pub fn resolve(&self, id: u32, outcome: Outcome) -> bool {
        match self.take(id) {
            Some(entry) => {
                entry.complete(outcome);
                true
            }
            None => {
                tracing::debug!(id, "resolve for unknown request id ignored");
                false
            }
        }
    }

    /// Fails a request that saw no response in time.
    ///
    /// In FIFO mode the request keeps its slot in the write order as a
    /// tombstone, so its late response is discarded rather than handed to
    /// the next request. Returns false if the request already resolved.
    pub fn expire(&self, id: u32, error: MemcacheError) -> bool {
        let entry = self.lock().entries.remove(&id);
        match entry {
            Some(mut entry) => {
                // Called from the timer itself; nothing left to cancel.
                entry.timer = None;
                entry.complete(Err(error));
                true
            }
            None => false,
        }
    }

    /// Closes the tracker and fails every outstanding request with `reason`.
    ///
    /// Later admissions fail with `reason` too. Returns the number of
    /// requests drained; a second drain finds nothing.
    pub fn drain_all(&self, reason: MemcacheError) -> usize {
        let drained: Vec<Entry> = {
            let mut inner = self.lock();
            if inner.closed.is_none() {
                inner.closed = Some(reason.clone());
            }
            inner.order.clear();
            inner.entries.drain().map(|(_, entry)| entry).collect()
        };
        let count = drained.len();
        for entry in drained {
            entry.complete(Err(reason.clone()));
        }
        count
    }
}

impl Inner {
    fn allocate_id(&mut self) -> u32 {
        loop {
            let id = self.next_id;
            self.next_id = self.next_id.wrapping_add(1);
            if !self.entries.contains_key(&id) {
                return id;
            }
        }
    }
}

impl fmt::Debug for Tracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tracker")
            .field("limit", &self.limit)
            .field("correlation", &self.correlation)
            .field("outstanding", &self.len())
            .finish()
    }
}
