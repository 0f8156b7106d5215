//! Mock session for testing
//!
//! Records every call in issue order without talking to any cluster, so tests
//! can assert on the exact request sequence an operation produced.
//!
//! # Features
//!
//! - Configurable blanket failure
//! - Configurable lookup outcome (size or not found)
//! - Configurable routing table
//! - Optional completion latency (handles resolve from a helper thread)
//!
//! # Example
//!
//! ```
//! use bomber::session::Session;
//! use bomber::session::mock::MockSession;
//!
//! let session = MockSession::new();
//! session.set_lookup_size(Some(128));
//!
//! let info = session.lookup("42").get().unwrap();
//! assert_eq!(info.size, 128);
//! assert_eq!(session.count("lookup"), 1);
//! ```

use super::{
    AsyncResult, BackendResult, ControlHandle, LookupHandle, MonitorHandle, ObjectInfo, ReadHandle,
    RemoveHandle, Route, Session, WriteHandle,
};
use crate::error::Error;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Record of a session call for test verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCall {
    Write { key: String, offset: u64, total_size: u64, len: usize },
    WritePrepare { key: String, offset: u64, total_size: u64, len: usize },
    WritePlain { key: String, offset: u64, len: usize },
    WriteCommit { key: String, offset: u64, total_size: u64, len: usize },
    WriteCache { key: String, ttl: u64, len: usize },
    Lookup { key: String },
    Read { key: String, offset: u64, size: u64 },
    Remove { key: String },
    Routes,
    SetBackendReadonly(Route),
    SetBackendWritable(Route),
    StartDefrag(Route),
    MonitorStat { categories: u64 },
}

impl SessionCall {
    /// Short call name, matching the session method
    pub fn name(&self) -> &'static str {
        match self {
            SessionCall::Write { .. } => "write",
            SessionCall::WritePrepare { .. } => "write_prepare",
            SessionCall::WritePlain { .. } => "write_plain",
            SessionCall::WriteCommit { .. } => "write_commit",
            SessionCall::WriteCache { .. } => "write_cache",
            SessionCall::Lookup { .. } => "lookup",
            SessionCall::Read { .. } => "read",
            SessionCall::Remove { .. } => "remove",
            SessionCall::Routes => "routes",
            SessionCall::SetBackendReadonly(_) => "set_backend_readonly",
            SessionCall::SetBackendWritable(_) => "set_backend_writable",
            SessionCall::StartDefrag(_) => "start_defrag",
            SessionCall::MonitorStat { .. } => "monitor_stat",
        }
    }
}

/// Mock storage session
///
/// Clones share the same call log and settings, so a test can keep one clone
/// for inspection while workers use another.
#[derive(Clone)]
pub struct MockSession {
    /// Every call, in issue order
    calls: Arc<Mutex<Vec<SessionCall>>>,

    /// Whether calls should fail
    should_fail: Arc<Mutex<bool>>,

    /// Lookup outcome: `Some(size)` or `None` for "not found"
    lookup_size: Arc<Mutex<Option<u64>>>,

    /// Routing table to report
    routes: Arc<Mutex<Vec<Route>>>,

    /// Delay before handles resolve; `None` resolves immediately
    latency: Arc<Mutex<Option<Duration>>>,
}

impl MockSession {
    /// Create a mock session with default settings
    ///
    /// By default the session:
    /// - Succeeds all calls
    /// - Reports every lookup as "not found"
    /// - Has an empty routing table
    /// - Resolves handles immediately
    pub fn new() -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            should_fail: Arc::new(Mutex::new(false)),
            lookup_size: Arc::new(Mutex::new(None)),
            routes: Arc::new(Mutex::new(Vec::new())),
            latency: Arc::new(Mutex::new(None)),
        }
    }

    /// Configure every call to fail with a backend error
    pub fn set_should_fail(&self, should_fail: bool) {
        *self.should_fail.lock().unwrap() = should_fail;
    }

    pub fn set_lookup_size(&self, size: Option<u64>) {
        *self.lookup_size.lock().unwrap() = size;
    }

    pub fn set_routes(&self, routes: Vec<Route>) {
        *self.routes.lock().unwrap() = routes;
    }

    /// Resolve handles from a helper thread after `latency`
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock().unwrap() = latency;
    }

    /// Get a copy of all recorded calls
    pub fn calls(&self) -> Vec<SessionCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Names of all recorded calls, in order
    pub fn call_names(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().iter().map(SessionCall::name).collect()
    }

    /// Number of recorded calls with the given name
    pub fn count(&self, name: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.name() == name)
            .count()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    fn record(&self, call: SessionCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn respond<T: Send + 'static>(&self, result: BackendResult<T>) -> AsyncResult<T> {
        let result = if *self.should_fail.lock().unwrap() {
            Err(Error::Backend("mock failure".to_string()))
        } else {
            result
        };

        match *self.latency.lock().unwrap() {
            Some(latency) => {
                let (completer, handle) = AsyncResult::channel();
                thread::spawn(move || {
                    thread::sleep(latency);
                    completer.complete(result);
                });
                handle
            }
            None => AsyncResult::ready(result),
        }
    }
}

impl Default for MockSession {
    fn default() -> Self {
        Self::new()
    }
}

impl Session for MockSession {
    fn write(&self, key: &str, data: &[u8], offset: u64, total_size: u64) -> WriteHandle {
        self.record(SessionCall::Write {
            key: key.to_string(),
            offset,
            total_size,
            len: data.len(),
        });
        self.respond(Ok(ObjectInfo { size: total_size }))
    }

    fn write_prepare(&self, key: &str, data: &[u8], offset: u64, total_size: u64) -> WriteHandle {
        self.record(SessionCall::WritePrepare {
            key: key.to_string(),
            offset,
            total_size,
            len: data.len(),
        });
        self.respond(Ok(ObjectInfo { size: total_size }))
    }

    fn write_plain(&self, key: &str, data: &[u8], offset: u64) -> WriteHandle {
        self.record(SessionCall::WritePlain {
            key: key.to_string(),
            offset,
            len: data.len(),
        });
        self.respond(Ok(ObjectInfo {
            size: offset + data.len() as u64,
        }))
    }

    fn write_commit(&self, key: &str, data: &[u8], offset: u64, total_size: u64) -> WriteHandle {
        self.record(SessionCall::WriteCommit {
            key: key.to_string(),
            offset,
            total_size,
            len: data.len(),
        });
        self.respond(Ok(ObjectInfo { size: total_size }))
    }

    fn write_cache(&self, key: &str, data: &[u8], ttl: u64) -> WriteHandle {
        self.record(SessionCall::WriteCache {
            key: key.to_string(),
            ttl,
            len: data.len(),
        });
        self.respond(Ok(ObjectInfo {
            size: data.len() as u64,
        }))
    }

    fn lookup(&self, key: &str) -> LookupHandle {
        self.record(SessionCall::Lookup { key: key.to_string() });
        let result = match *self.lookup_size.lock().unwrap() {
            Some(size) => Ok(ObjectInfo { size }),
            None => Err(Error::NotFound(key.to_string())),
        };
        self.respond(result)
    }

    fn read(&self, key: &str, offset: u64, size: u64) -> ReadHandle {
        self.record(SessionCall::Read {
            key: key.to_string(),
            offset,
            size,
        });
        self.respond(Ok(vec![0u8; size as usize]))
    }

    fn remove(&self, key: &str) -> RemoveHandle {
        self.record(SessionCall::Remove { key: key.to_string() });
        self.respond(Ok(()))
    }

    fn routes(&self) -> Vec<Route> {
        self.record(SessionCall::Routes);
        self.routes.lock().unwrap().clone()
    }

    fn set_backend_readonly(&self, route: &Route) -> ControlHandle {
        self.record(SessionCall::SetBackendReadonly(route.clone()));
        self.respond(Ok(()))
    }

    fn set_backend_writable(&self, route: &Route) -> ControlHandle {
        self.record(SessionCall::SetBackendWritable(route.clone()));
        self.respond(Ok(()))
    }

    fn start_defrag(&self, route: &Route) -> ControlHandle {
        self.record(SessionCall::StartDefrag(route.clone()));
        self.respond(Ok(()))
    }

    fn monitor_stat(&self, categories: u64) -> MonitorHandle {
        self.record(SessionCall::MonitorStat { categories });
        self.respond(Ok(serde_json::json!({ "categories": categories })))
    }
}
