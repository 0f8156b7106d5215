//! Storage session abstraction
//!
//! A session is the only way the bomber talks to a storage cluster. Every call
//! returns immediately with an [`AsyncResult`] handle; the caller decides when
//! to block on it. This lets a worker fire a whole batch of requests before
//! waiting on any of them.
//!
//! # Thread Safety
//!
//! Sessions must be `Send + Sync`. A single session is shared by every worker
//! through an `Arc`, never cloned or pooled per worker, so implementations are
//! responsible for their own internal synchronization. The bomber core holds no
//! locks around session calls.
//!
//! # Implementations
//!
//! - **LoopbackSession**: in-process cluster emulation used by the binary
//! - **MockSession**: call recorder for tests

use crate::error::Error;
use crossbeam::channel::{self, Receiver, Sender};
use serde::Serialize;
use std::fmt;

pub mod loopback;
pub mod mock;

/// Result of a single backend call
pub type BackendResult<T> = std::result::Result<T, Error>;

/// Category selector asking the monitor for every statistics category
pub const MONITOR_ALL_CATEGORIES: u64 = u64::MAX;

/// A backend shard: node address plus backend id on that node
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Route {
    pub address: String,
    pub backend_id: u32,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.address, self.backend_id)
    }
}

/// Object metadata returned by lookups and writes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ObjectInfo {
    pub size: u64,
}

pub type WriteHandle = AsyncResult<ObjectInfo>;
pub type LookupHandle = AsyncResult<ObjectInfo>;
pub type ReadHandle = AsyncResult<Vec<u8>>;
pub type RemoveHandle = AsyncResult<()>;
pub type ControlHandle = AsyncResult<()>;
pub type MonitorHandle = AsyncResult<serde_json::Value>;

/// Storage session trait
///
/// Mirrors the request surface of a key-value cluster client. Keys are plain
/// strings; the session applies its own namespace. Offsets and sizes are in
/// bytes.
pub trait Session: Send + Sync {
    /// Write a whole object (or a region of it) in one request
    fn write(&self, key: &str, data: &[u8], offset: u64, total_size: u64) -> WriteHandle;

    /// Reserve `total_size` bytes for a multi-part write and store `data` at `offset`
    fn write_prepare(&self, key: &str, data: &[u8], offset: u64, total_size: u64) -> WriteHandle;

    /// Store `data` at `offset` inside a prepared object
    fn write_plain(&self, key: &str, data: &[u8], offset: u64) -> WriteHandle;

    /// Store the final part of a prepared object and fix its size at `total_size`
    fn write_commit(&self, key: &str, data: &[u8], offset: u64, total_size: u64) -> WriteHandle;

    /// Write into the memory cache tier with the given ttl
    fn write_cache(&self, key: &str, data: &[u8], ttl: u64) -> WriteHandle;

    /// Discover whether an object exists and its current size
    fn lookup(&self, key: &str) -> LookupHandle;

    /// Read `size` bytes at `offset`
    fn read(&self, key: &str, offset: u64, size: u64) -> ReadHandle;

    /// Delete an object
    fn remove(&self, key: &str) -> RemoveHandle;

    /// Current routing table; may be empty while the cluster is (re)configuring
    fn routes(&self) -> Vec<Route>;

    fn set_backend_readonly(&self, route: &Route) -> ControlHandle;

    fn set_backend_writable(&self, route: &Route) -> ControlHandle;

    fn start_defrag(&self, route: &Route) -> ControlHandle;

    /// Aggregate monitoring statistics for the selected categories
    fn monitor_stat(&self, categories: u64) -> MonitorHandle;
}

enum State<T> {
    Empty,
    Pending(Receiver<BackendResult<T>>),
    Ready(BackendResult<T>),
}

/// Awaitable handle for an in-flight backend call
///
/// A handle that was never issued is "empty": waiting on it is a no-op. This
/// is how operations represent rounds where their preconditions were unmet.
pub struct AsyncResult<T> {
    state: State<T>,
}

impl<T> AsyncResult<T> {
    /// Handle for a request that was never issued
    pub fn empty() -> Self {
        Self { state: State::Empty }
    }

    /// Handle that is already resolved
    pub fn ready(result: BackendResult<T>) -> Self {
        Self {
            state: State::Ready(result),
        }
    }

    /// Pending handle plus the completer that resolves it
    pub fn channel() -> (Completer<T>, Self) {
        let (tx, rx) = channel::bounded(1);
        (
            Completer { tx: Some(tx) },
            Self {
                state: State::Pending(rx),
            },
        )
    }

    /// True if a request was issued for this handle
    pub fn is_valid(&self) -> bool {
        !matches!(self.state, State::Empty)
    }

    /// True while the request is still in flight
    pub fn is_pending(&self) -> bool {
        match &self.state {
            State::Pending(rx) => rx.is_empty(),
            _ => false,
        }
    }

    /// Block until the request resolves; no-op for empty or resolved handles
    pub fn wait(&mut self) {
        let result = match &self.state {
            State::Pending(rx) => rx
                .recv()
                .unwrap_or_else(|_| Err(Error::Backend("completion channel closed".to_string()))),
            _ => return,
        };
        self.state = State::Ready(result);
    }

    /// Resolved outcome, if the handle has been waited on
    pub fn result(&self) -> Option<&BackendResult<T>> {
        match &self.state {
            State::Ready(result) => Some(result),
            _ => None,
        }
    }

    /// Wait and take the outcome
    pub fn get(mut self) -> BackendResult<T> {
        self.wait();
        match self.state {
            State::Ready(result) => result,
            State::Empty => Err(Error::Backend("request was never issued".to_string())),
            State::Pending(_) => Err(Error::Backend("request still pending".to_string())),
        }
    }
}

impl<T> Default for AsyncResult<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> fmt::Debug for AsyncResult<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match &self.state {
            State::Empty => "empty",
            State::Pending(rx) if rx.is_empty() => "pending",
            State::Pending(_) => "completed",
            State::Ready(Ok(_)) => "ok",
            State::Ready(Err(_)) => "failed",
        };
        f.debug_struct("AsyncResult").field("state", &state).finish()
    }
}

/// Resolves exactly one [`AsyncResult`]
///
/// Dropping a completer without calling [`Completer::complete`] resolves the
/// handle with a backend error, so a waiter can never block forever on a
/// request the session abandoned.
pub struct Completer<T> {
    tx: Option<Sender<BackendResult<T>>>,
}

impl<T> Completer<T> {
    pub fn complete(mut self, result: BackendResult<T>) {
        if let Some(tx) = self.tx.take() {
            // The waiter may have abandoned the handle during shutdown
            let _ = tx.send(result);
        }
    }
}

impl<T> Drop for Completer<T> {
    fn drop(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Err(Error::Backend(
                "request dropped before completion".to_string(),
            )));
        }
    }
}
