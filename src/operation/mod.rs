//! Storage operations
//!
//! An [`Operation`] is one request a worker issues against the cluster each
//! round. It is a closed set of tagged variants, one per [`OperationKind`],
//! each carrying only the in-flight handle its kind needs.
//!
//! # Contract
//!
//! - `exec()` issues the request(s) and stores a handle
//! - `wait_result()` blocks until that handle resolves
//! - every `exec()` is followed by exactly one `wait_result()` before the
//!   operation is reused; handles that were never issued make
//!   `wait_result()` a no-op
//!
//! Backend failures never escape an operation. The only error `exec()`
//! returns is a failed entropy source, which is fatal for the worker.

pub mod registry;

use crate::error::Error;
use crate::generator::RandomGenerator;
use crate::session::{
    AsyncResult, ControlHandle, MonitorHandle, ReadHandle, RemoveHandle, Route, Session, WriteHandle,
    MONITOR_ALL_CATEGORIES,
};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Number of partial writes between prepare and commit
pub const PLAIN_WRITE_ITERATIONS: u64 = 3;

/// Fixed ttl for cache-tier writes
pub const CACHE_TTL: u64 = 123;

/// Operation kind
///
/// Registration order is significant: the `all` wildcard resolves to
/// [`OperationKind::ALL`] in exactly this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Write,
    PlainWrite,
    Read,
    Remove,
    SetBackendReadonly,
    SetBackendWritable,
    StartDefrag,
    StatMonitor,
    WriteCache,
}

impl OperationKind {
    /// Every kind, in registration order
    pub const ALL: [OperationKind; 9] = [
        OperationKind::Write,
        OperationKind::PlainWrite,
        OperationKind::Read,
        OperationKind::Remove,
        OperationKind::SetBackendReadonly,
        OperationKind::SetBackendWritable,
        OperationKind::StartDefrag,
        OperationKind::StatMonitor,
        OperationKind::WriteCache,
    ];

    /// Configuration name of this kind
    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::Write => "write",
            OperationKind::PlainWrite => "plain_write",
            OperationKind::Read => "read",
            OperationKind::Remove => "remove",
            OperationKind::SetBackendReadonly => "set_backend_readonly",
            OperationKind::SetBackendWritable => "set_backend_writable",
            OperationKind::StartDefrag => "start_defrag",
            OperationKind::StatMonitor => "stat_monitor",
            OperationKind::WriteCache => "write_cache",
        }
    }

    /// Kinds that are inert unless backend control is enabled
    pub fn is_backend_control(&self) -> bool {
        matches!(
            self,
            OperationKind::SetBackendReadonly | OperationKind::SetBackendWritable
        )
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OperationKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        registry::lookup(s)
    }
}

/// Per-worker state every operation needs to issue requests
///
/// The session is shared by all workers; the generator is owned by this
/// worker alone.
pub struct OperationContext {
    session: Arc<dyn Session>,
    generator: RandomGenerator,
    backend_control: bool,
}

impl OperationContext {
    pub fn new(session: Arc<dyn Session>, generator: RandomGenerator, backend_control: bool) -> Self {
        Self {
            session,
            generator,
            backend_control,
        }
    }

    pub fn session(&self) -> &dyn Session {
        self.session.as_ref()
    }

    pub fn backend_control(&self) -> bool {
        self.backend_control
    }

    /// First route of the current routing table
    fn first_route(&self) -> Result<Route, Error> {
        self.session
            .routes()
            .into_iter()
            .next()
            .ok_or(Error::EmptyRoutingTable)
    }
}

/// One request slot in an action batch
#[derive(Debug)]
pub enum Operation {
    Write(WriteHandle),
    PlainWrite(WriteHandle),
    WriteCache(WriteHandle),
    Read(ReadHandle),
    Remove(RemoveHandle),
    SetBackendReadonly(ControlHandle),
    SetBackendWritable(ControlHandle),
    StartDefrag(ControlHandle),
    StatMonitor(MonitorHandle),
}

impl Operation {
    /// Construct an idle operation of the given kind
    pub fn new(kind: OperationKind) -> Self {
        match kind {
            OperationKind::Write => Operation::Write(AsyncResult::empty()),
            OperationKind::PlainWrite => Operation::PlainWrite(AsyncResult::empty()),
            OperationKind::WriteCache => Operation::WriteCache(AsyncResult::empty()),
            OperationKind::Read => Operation::Read(AsyncResult::empty()),
            OperationKind::Remove => Operation::Remove(AsyncResult::empty()),
            OperationKind::SetBackendReadonly => Operation::SetBackendReadonly(AsyncResult::empty()),
            OperationKind::SetBackendWritable => Operation::SetBackendWritable(AsyncResult::empty()),
            OperationKind::StartDefrag => Operation::StartDefrag(AsyncResult::empty()),
            OperationKind::StatMonitor => Operation::StatMonitor(AsyncResult::empty()),
        }
    }

    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::Write(_) => OperationKind::Write,
            Operation::PlainWrite(_) => OperationKind::PlainWrite,
            Operation::WriteCache(_) => OperationKind::WriteCache,
            Operation::Read(_) => OperationKind::Read,
            Operation::Remove(_) => OperationKind::Remove,
            Operation::SetBackendReadonly(_) => OperationKind::SetBackendReadonly,
            Operation::SetBackendWritable(_) => OperationKind::SetBackendWritable,
            Operation::StartDefrag(_) => OperationKind::StartDefrag,
            Operation::StatMonitor(_) => OperationKind::StatMonitor,
        }
    }

    /// True if the last `exec()` left a request to wait on
    pub fn is_issued(&self) -> bool {
        match self {
            Operation::Write(h) | Operation::PlainWrite(h) | Operation::WriteCache(h) => h.is_valid(),
            Operation::Read(h) => h.is_valid(),
            Operation::Remove(h) => h.is_valid(),
            Operation::SetBackendReadonly(h)
            | Operation::SetBackendWritable(h)
            | Operation::StartDefrag(h) => h.is_valid(),
            Operation::StatMonitor(h) => h.is_valid(),
        }
    }

    /// Issue this round's request(s)
    ///
    /// # Errors
    ///
    /// Only `EntropySourceUnavailable`; backend failures are absorbed.
    pub fn exec(&mut self, ctx: &mut OperationContext) -> Result<(), Error> {
        match self {
            Operation::Write(handle) => {
                let key = ctx.generator.random_key();
                let data = ctx.generator.random_payload()?;
                *handle = ctx.session.write(&key, &data, 0, data.len() as u64);
            }
            Operation::PlainWrite(handle) => {
                let key = ctx.generator.random_key();
                let data = ctx.generator.random_payload()?;
                *handle = plain_write(ctx.session(), &key, &data);
            }
            Operation::WriteCache(handle) => {
                let key = ctx.generator.random_key();
                let data = ctx.generator.random_payload()?;
                *handle = ctx.session.write_cache(&key, &data, CACHE_TTL);
            }
            Operation::Read(handle) => {
                let key = ctx.generator.random_key();
                *handle = match ctx.session.lookup(&key).get() {
                    Ok(info) => ctx.session.read(&key, 0, info.size),
                    Err(e) => {
                        tracing::trace!(key = %key, error = %e, "lookup failed, skipping read");
                        AsyncResult::empty()
                    }
                };
            }
            Operation::Remove(handle) => {
                let key = ctx.generator.random_key();
                *handle = ctx.session.remove(&key);
            }
            Operation::SetBackendReadonly(handle) => {
                *handle = backend_control(ctx, |session, route| session.set_backend_readonly(route));
            }
            Operation::SetBackendWritable(handle) => {
                *handle = backend_control(ctx, |session, route| session.set_backend_writable(route));
            }
            Operation::StartDefrag(handle) => {
                *handle = match ctx.first_route() {
                    Ok(route) => ctx.session.start_defrag(&route),
                    Err(e) => {
                        tracing::trace!(error = %e, "skipping defrag");
                        AsyncResult::empty()
                    }
                };
            }
            Operation::StatMonitor(handle) => {
                *handle = ctx.session.monitor_stat(MONITOR_ALL_CATEGORIES);
            }
        }
        Ok(())
    }

    /// Block until this round's request resolves
    pub fn wait_result(&mut self) {
        let kind = self.kind();
        match self {
            Operation::Write(h) | Operation::PlainWrite(h) | Operation::WriteCache(h) => settle(kind, h),
            Operation::Read(h) => settle(kind, h),
            Operation::Remove(h) => settle(kind, h),
            Operation::SetBackendReadonly(h)
            | Operation::SetBackendWritable(h)
            | Operation::StartDefrag(h) => settle(kind, h),
            Operation::StatMonitor(h) => settle(kind, h),
        }
    }
}

/// prepare, then the partial writes one after another, then commit
///
/// Each step is awaited before the next is issued because they share one
/// object offset cursor. Only the commit is left in flight.
fn plain_write(session: &dyn Session, key: &str, data: &[u8]) -> WriteHandle {
    let chunk = data.len() as u64;
    let total_size = chunk * (PLAIN_WRITE_ITERATIONS + 2);

    settle(OperationKind::PlainWrite, &mut session.write_prepare(key, data, 0, total_size));

    let mut offset = chunk;
    for _ in 0..PLAIN_WRITE_ITERATIONS {
        settle(OperationKind::PlainWrite, &mut session.write_plain(key, data, offset));
        offset += chunk;
    }

    session.write_commit(key, data, offset, total_size)
}

fn backend_control(
    ctx: &OperationContext,
    issue: impl FnOnce(&dyn Session, &Route) -> ControlHandle,
) -> ControlHandle {
    if !ctx.backend_control {
        return AsyncResult::empty();
    }
    match ctx.first_route() {
        Ok(route) => issue(ctx.session(), &route),
        Err(e) => {
            tracing::trace!(error = %e, "skipping backend control");
            AsyncResult::empty()
        }
    }
}

fn settle<T>(kind: OperationKind, handle: &mut AsyncResult<T>) {
    handle.wait();
    if let Some(Err(e)) = handle.result() {
        tracing::trace!(operation = %kind, error = %e, "backend call failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::payload::tests::BrokenEntropy;
    use crate::generator::{KeyGenerator, PayloadGenerator};
    use crate::session::mock::{MockSession, SessionCall};
    use crate::session::{Completer, LookupHandle, ObjectInfo};
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;
    use std::sync::Mutex;
    use std::thread;
    use std::time::{Duration, Instant};

    fn context(session: &MockSession, backend_control: bool) -> OperationContext {
        let generator = RandomGenerator::from_bounds(10, 16, Some(3)).unwrap();
        OperationContext::new(Arc::new(session.clone()), generator, backend_control)
    }

    fn route() -> Route {
        Route {
            address: "localhost:1025:2".to_string(),
            backend_id: 0,
        }
    }

    fn run_once(op: &mut Operation, ctx: &mut OperationContext) {
        op.exec(ctx).unwrap();
        op.wait_result();
    }

    #[test]
    fn test_kind_round_trips_through_constructor() {
        for kind in OperationKind::ALL {
            assert_eq!(Operation::new(kind).kind(), kind);
            assert!(!Operation::new(kind).is_issued());
        }
    }

    #[test]
    fn test_write_issues_full_object_write() {
        let session = MockSession::new();
        let mut ctx = context(&session, false);
        let mut op = Operation::new(OperationKind::Write);
        run_once(&mut op, &mut ctx);

        let calls = session.calls();
        assert_eq!(calls.len(), 1);
        match &calls[0] {
            SessionCall::Write { key, offset, total_size, len } => {
                assert!(key.parse::<u64>().unwrap() < 10);
                assert_eq!(*offset, 0);
                assert_eq!(*total_size, *len as u64);
                assert!((1..=16).contains(len));
            }
            other => panic!("unexpected call {:?}", other),
        }
    }

    #[test]
    fn test_plain_write_ordering() {
        let session = MockSession::new();
        let mut ctx = context(&session, false);
        let mut op = Operation::new(OperationKind::PlainWrite);

        op.exec(&mut ctx).unwrap();
        assert_eq!(
            session.call_names(),
            vec!["write_prepare", "write_plain", "write_plain", "write_plain", "write_commit"]
        );
        op.wait_result();

        let calls = session.calls();
        let chunk = match &calls[0] {
            SessionCall::WritePrepare { offset, total_size, len, .. } => {
                assert_eq!(*offset, 0);
                assert_eq!(*total_size, *len as u64 * 5);
                *len as u64
            }
            other => panic!("unexpected call {:?}", other),
        };
        for (i, call) in calls[1..4].iter().enumerate() {
            match call {
                SessionCall::WritePlain { offset, len, .. } => {
                    assert_eq!(*offset, chunk * (i as u64 + 1));
                    assert_eq!(*len as u64, chunk);
                }
                other => panic!("unexpected call {:?}", other),
            }
        }
        match &calls[4] {
            SessionCall::WriteCommit { offset, total_size, .. } => {
                assert_eq!(*offset, chunk * 4);
                assert_eq!(*total_size, chunk * 5);
            }
            other => panic!("unexpected call {:?}", other),
        }
    }

    #[test]
    fn test_plain_write_uses_one_key() {
        let session = MockSession::new();
        let mut ctx = context(&session, false);
        let mut op = Operation::new(OperationKind::PlainWrite);
        run_once(&mut op, &mut ctx);

        let keys: Vec<_> = session
            .calls()
            .into_iter()
            .map(|call| match call {
                SessionCall::WritePrepare { key, .. }
                | SessionCall::WritePlain { key, .. }
                | SessionCall::WriteCommit { key, .. } => key,
                other => panic!("unexpected call {:?}", other),
            })
            .collect();
        assert!(keys.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_plain_write_ordering_with_latency() {
        let session = MockSession::new();
        session.set_latency(Some(std::time::Duration::from_millis(2)));
        let mut ctx = context(&session, false);
        let mut op = Operation::new(OperationKind::PlainWrite);

        op.exec(&mut ctx).unwrap();
        assert!(op.is_issued());
        op.wait_result();
        assert_eq!(session.count("write_plain"), 3);
        assert_eq!(session.call_names().last(), Some(&"write_commit"));
    }

    /// Session whose write steps stay pending until the test releases them
    #[derive(Default)]
    struct SteppedSession {
        issued: Mutex<Vec<&'static str>>,
        parked: Mutex<Vec<Completer<ObjectInfo>>>,
    }

    impl SteppedSession {
        fn park(&self, name: &'static str) -> WriteHandle {
            self.issued.lock().unwrap().push(name);
            let (completer, handle) = AsyncResult::channel();
            self.parked.lock().unwrap().push(completer);
            handle
        }

        fn issued(&self) -> Vec<&'static str> {
            self.issued.lock().unwrap().clone()
        }

        fn release(&self) {
            let completer = self.parked.lock().unwrap().pop().unwrap();
            completer.complete(Ok(ObjectInfo { size: 0 }));
        }

        fn wait_for_issued(&self, count: usize) {
            let deadline = Instant::now() + Duration::from_secs(5);
            while self.issued().len() < count {
                assert!(Instant::now() < deadline, "only {:?} issued", self.issued());
                thread::sleep(Duration::from_millis(1));
            }
        }

        fn unsupported<T>() -> AsyncResult<T> {
            AsyncResult::ready(Err(Error::Backend("unsupported".to_string())))
        }
    }

    impl Session for SteppedSession {
        fn write(&self, _: &str, _: &[u8], _: u64, _: u64) -> WriteHandle {
            Self::unsupported()
        }
        fn write_prepare(&self, _: &str, _: &[u8], _: u64, _: u64) -> WriteHandle {
            self.park("write_prepare")
        }
        fn write_plain(&self, _: &str, _: &[u8], _: u64) -> WriteHandle {
            self.park("write_plain")
        }
        fn write_commit(&self, _: &str, _: &[u8], _: u64, _: u64) -> WriteHandle {
            self.park("write_commit")
        }
        fn write_cache(&self, _: &str, _: &[u8], _: u64) -> WriteHandle {
            Self::unsupported()
        }
        fn lookup(&self, _: &str) -> LookupHandle {
            Self::unsupported()
        }
        fn read(&self, _: &str, _: u64, _: u64) -> ReadHandle {
            Self::unsupported()
        }
        fn remove(&self, _: &str) -> RemoveHandle {
            Self::unsupported()
        }
        fn routes(&self) -> Vec<Route> {
            Vec::new()
        }
        fn set_backend_readonly(&self, _: &Route) -> ControlHandle {
            Self::unsupported()
        }
        fn set_backend_writable(&self, _: &Route) -> ControlHandle {
            Self::unsupported()
        }
        fn start_defrag(&self, _: &Route) -> ControlHandle {
            Self::unsupported()
        }
        fn monitor_stat(&self, _: u64) -> MonitorHandle {
            Self::unsupported()
        }
    }

    #[test]
    fn test_plain_write_waits_for_each_step() {
        let session = Arc::new(SteppedSession::default());
        let generator = RandomGenerator::from_bounds(10, 16, Some(3)).unwrap();
        let mut ctx = OperationContext::new(session.clone(), generator, false);

        let issuing = thread::spawn(move || {
            let mut op = Operation::new(OperationKind::PlainWrite);
            op.exec(&mut ctx).unwrap();
            op
        });

        // Nothing follows the prepare until it completes
        session.wait_for_issued(1);
        thread::sleep(Duration::from_millis(30));
        assert_eq!(session.issued(), vec!["write_prepare"]);

        // Each partial write is awaited before the next step is issued
        for issued in 2..=4 {
            session.release();
            session.wait_for_issued(issued);
            thread::sleep(Duration::from_millis(10));
            assert_eq!(session.issued().len(), issued);
        }
        assert_eq!(
            session.issued(),
            vec!["write_prepare", "write_plain", "write_plain", "write_plain"]
        );

        // The commit goes out once the last partial write completes, and
        // exec() returns with it still in flight
        session.release();
        let mut op = issuing.join().unwrap();
        assert_eq!(session.issued().last(), Some(&"write_commit"));
        assert!(op.is_issued());

        session.release();
        op.wait_result();
    }

    #[test]
    fn test_write_cache_uses_fixed_ttl() {
        let session = MockSession::new();
        let mut ctx = context(&session, false);
        let mut op = Operation::new(OperationKind::WriteCache);
        run_once(&mut op, &mut ctx);

        assert!(matches!(
            session.calls()[0],
            SessionCall::WriteCache { ttl: CACHE_TTL, .. }
        ));
    }

    #[test]
    fn test_read_skipped_when_lookup_not_found() {
        let session = MockSession::new();
        session.set_lookup_size(None);
        let mut ctx = context(&session, false);
        let mut op = Operation::new(OperationKind::Read);

        op.exec(&mut ctx).unwrap();
        assert!(!op.is_issued());
        op.wait_result();

        assert_eq!(session.call_names(), vec!["lookup"]);
    }

    #[test]
    fn test_read_skipped_when_lookup_fails() {
        let session = MockSession::new();
        session.set_lookup_size(Some(10));
        session.set_should_fail(true);
        let mut ctx = context(&session, false);
        let mut op = Operation::new(OperationKind::Read);
        run_once(&mut op, &mut ctx);

        assert_eq!(session.count("read"), 0);
    }

    #[test]
    fn test_read_uses_looked_up_size() {
        let session = MockSession::new();
        session.set_lookup_size(Some(77));
        let mut ctx = context(&session, false);
        let mut op = Operation::new(OperationKind::Read);
        run_once(&mut op, &mut ctx);

        let calls = session.calls();
        assert_eq!(session.call_names(), vec!["lookup", "read"]);
        match (&calls[0], &calls[1]) {
            (SessionCall::Lookup { key: looked_up }, SessionCall::Read { key, offset, size }) => {
                assert_eq!(looked_up, key);
                assert_eq!(*offset, 0);
                assert_eq!(*size, 77);
            }
            other => panic!("unexpected calls {:?}", other),
        }
    }

    #[test]
    fn test_remove() {
        let session = MockSession::new();
        let mut ctx = context(&session, false);
        let mut op = Operation::new(OperationKind::Remove);
        run_once(&mut op, &mut ctx);
        assert_eq!(session.call_names(), vec!["remove"]);
    }

    #[test]
    fn test_backend_control_disabled_by_default() {
        let session = MockSession::new();
        session.set_routes(vec![route()]);
        let mut ctx = context(&session, false);

        for kind in [OperationKind::SetBackendReadonly, OperationKind::SetBackendWritable] {
            let mut op = Operation::new(kind);
            op.exec(&mut ctx).unwrap();
            assert!(!op.is_issued());
            op.wait_result();
        }
        assert_eq!(session.call_count(), 0);
    }

    #[test]
    fn test_backend_control_enabled_targets_first_route() {
        let session = MockSession::new();
        let second = Route {
            address: "localhost:1026:2".to_string(),
            backend_id: 1,
        };
        session.set_routes(vec![route(), second]);
        let mut ctx = context(&session, true);

        run_once(&mut Operation::new(OperationKind::SetBackendReadonly), &mut ctx);
        run_once(&mut Operation::new(OperationKind::SetBackendWritable), &mut ctx);

        let calls = session.calls();
        assert_eq!(
            calls,
            vec![
                SessionCall::Routes,
                SessionCall::SetBackendReadonly(route()),
                SessionCall::Routes,
                SessionCall::SetBackendWritable(route()),
            ]
        );
    }

    #[test]
    fn test_backend_control_enabled_skips_empty_routing_table() {
        let session = MockSession::new();
        let mut ctx = context(&session, true);

        for kind in [OperationKind::SetBackendReadonly, OperationKind::SetBackendWritable] {
            let mut op = Operation::new(kind);
            op.exec(&mut ctx).unwrap();
            assert!(!op.is_issued());
            op.wait_result();
        }
        assert_eq!(session.calls(), vec![SessionCall::Routes, SessionCall::Routes]);
    }

    #[test]
    fn test_start_defrag_skips_empty_routing_table() {
        let session = MockSession::new();
        let mut ctx = context(&session, false);
        let mut op = Operation::new(OperationKind::StartDefrag);

        op.exec(&mut ctx).unwrap();
        assert!(!op.is_issued());
        op.wait_result();
        assert_eq!(session.call_names(), vec!["routes"]);
    }

    #[test]
    fn test_start_defrag_uses_first_route() {
        let session = MockSession::new();
        session.set_routes(vec![route()]);
        let mut ctx = context(&session, false);
        run_once(&mut Operation::new(OperationKind::StartDefrag), &mut ctx);

        assert_eq!(session.calls()[1], SessionCall::StartDefrag(route()));
    }

    #[test]
    fn test_stat_monitor_requests_all_categories() {
        let session = MockSession::new();
        let mut ctx = context(&session, false);
        run_once(&mut Operation::new(OperationKind::StatMonitor), &mut ctx);

        assert_eq!(
            session.calls(),
            vec![SessionCall::MonitorStat {
                categories: MONITOR_ALL_CATEGORIES
            }]
        );
    }

    #[test]
    fn test_backend_failures_are_absorbed() {
        let session = MockSession::new();
        session.set_should_fail(true);
        session.set_routes(vec![route()]);
        let mut ctx = context(&session, true);

        for kind in OperationKind::ALL {
            let mut op = Operation::new(kind);
            assert!(op.exec(&mut ctx).is_ok());
            op.wait_result();
        }
    }

    #[test]
    fn test_entropy_failure_propagates_from_write_kinds() {
        let session = MockSession::new();
        let payloads = PayloadGenerator::with_entropy(
            16,
            Box::new(BrokenEntropy),
            Xoshiro256PlusPlus::seed_from_u64(1),
        )
        .unwrap();
        let generator = RandomGenerator::new(KeyGenerator::new(10).unwrap(), payloads);
        let mut ctx = OperationContext::new(Arc::new(session.clone()), generator, false);

        for kind in [OperationKind::Write, OperationKind::PlainWrite, OperationKind::WriteCache] {
            let err = Operation::new(kind).exec(&mut ctx).unwrap_err();
            assert!(matches!(err, Error::EntropySourceUnavailable(_)));
        }
        assert_eq!(session.call_count(), 0);

        // Kinds without a payload are unaffected
        assert!(Operation::new(OperationKind::Remove).exec(&mut ctx).is_ok());
    }

    #[test]
    fn test_kind_names_parse() {
        assert_eq!("plain_write".parse::<OperationKind>().unwrap(), OperationKind::PlainWrite);
        assert!("bogus".parse::<OperationKind>().is_err());
        assert_eq!(OperationKind::WriteCache.to_string(), "write_cache");
    }
}
