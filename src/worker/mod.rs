//! Action batches
//!
//! An [`ActionBatch`] is the unit of work a single worker thread runs: a
//! fixed, ordered list of operations executed in rounds. Each round fires
//! every operation in order, then waits on every result in the same order.
//! Firing everything first keeps up to `len()` requests in flight per worker.
//!
//! # Stopping
//!
//! [`BatchControl::stop`] only raises a flag. The worker observes it at round
//! boundaries and before each wait; once set, the remaining waits of the
//! current round are abandoned and no new round starts. A request already
//! being waited on is allowed to finish.
//!
//! # Example
//!
//! ```
//! use bomber::generator::RandomGenerator;
//! use bomber::operation::{Operation, OperationContext, OperationKind};
//! use bomber::session::mock::MockSession;
//! use bomber::worker::{ActionBatch, RepeatMode};
//! use std::sync::Arc;
//!
//! let session = MockSession::new();
//! let generator = RandomGenerator::from_bounds(10, 16, None)?;
//! let ctx = OperationContext::new(Arc::new(session.clone()), generator, false);
//!
//! let mut batch = ActionBatch::new(0, ctx, 1);
//! batch.add(Operation::new(OperationKind::Write));
//! batch.add(Operation::new(OperationKind::Remove));
//!
//! let rounds = batch.run(RepeatMode::Rounds(2))?;
//! assert_eq!(rounds, 2);
//! assert_eq!(session.call_count(), 4);
//! # Ok::<(), bomber::error::Error>(())
//! ```

use crate::error::Error;
use crate::operation::{Operation, OperationContext, OperationKind};
use rand::Rng;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

/// How many rounds a batch runs before returning on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatMode {
    /// Run until stopped
    Unbounded,
    /// Run this many rounds, or fewer if stopped first
    Rounds(u64),
}

impl RepeatMode {
    pub fn from_rounds(rounds: Option<u64>) -> Self {
        match rounds {
            Some(n) if n > 0 => RepeatMode::Rounds(n),
            _ => RepeatMode::Unbounded,
        }
    }

    #[inline]
    fn allows(&self, completed: u64) -> bool {
        match self {
            RepeatMode::Unbounded => true,
            RepeatMode::Rounds(n) => completed < *n,
        }
    }
}

/// Batch lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BatchState {
    Idle = 0,
    Running = 1,
    /// Stop requested while running; the current round is winding down
    Stopping = 2,
    Stopped = 3,
}

impl BatchState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => BatchState::Idle,
            1 => BatchState::Running,
            2 => BatchState::Stopping,
            _ => BatchState::Stopped,
        }
    }
}

/// Cross-thread view of a batch: stop flag, state and round counter
///
/// The stop flag only ever goes from false to true.
#[derive(Debug)]
pub struct BatchControl {
    stopped: AtomicBool,
    state: AtomicU8,
    rounds: AtomicU64,
}

impl BatchControl {
    fn new() -> Self {
        Self {
            stopped: AtomicBool::new(false),
            state: AtomicU8::new(BatchState::Idle as u8),
            rounds: AtomicU64::new(0),
        }
    }

    /// Request the batch to stop; idempotent and non-blocking
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        let _ = self.state.compare_exchange(
            BatchState::Running as u8,
            BatchState::Stopping as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    pub fn state(&self) -> BatchState {
        BatchState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Rounds finished (or abandoned) so far
    pub fn rounds_completed(&self) -> u64 {
        self.rounds.load(Ordering::Acquire)
    }

    fn begin(&self) {
        self.state.store(BatchState::Running as u8, Ordering::Release);
        // A stop that raced ahead of the worker must not be lost
        if self.is_stopped() {
            self.state.store(BatchState::Stopping as u8, Ordering::Release);
        }
    }

    fn finish(&self) {
        self.state.store(BatchState::Stopped as u8, Ordering::Release);
    }
}

/// One batch slot: an operation plus how many times it is issued per round
struct Action {
    operation: Operation,
    repeat: u32,
}

impl Action {
    /// Issue the operation; with `repeat > 1` the first `repeat - 1` issues
    /// are awaited serially and only the last stays in flight
    fn fire(&mut self, ctx: &mut OperationContext) -> Result<(), Error> {
        for _ in 1..self.repeat {
            self.operation.exec(ctx)?;
            self.operation.wait_result();
        }
        self.operation.exec(ctx)
    }
}

/// Fixed set of operations run round after round by one worker
pub struct ActionBatch {
    id: usize,
    actions: Vec<Action>,
    ctx: OperationContext,
    repeat: u32,
    control: Arc<BatchControl>,
}

impl ActionBatch {
    /// Create an empty batch
    ///
    /// `repeat` below 1 is treated as 1.
    pub fn new(id: usize, ctx: OperationContext, repeat: u32) -> Self {
        Self {
            id,
            actions: Vec::new(),
            ctx,
            repeat: repeat.max(1),
            control: Arc::new(BatchControl::new()),
        }
    }

    /// Create a batch of `size` operations sampled from `kinds` with replacement
    pub fn random<R: Rng>(
        id: usize,
        kinds: &[OperationKind],
        size: usize,
        ctx: OperationContext,
        repeat: u32,
        rng: &mut R,
    ) -> Result<Self, Error> {
        if kinds.is_empty() {
            return Err(Error::config("no operations specified"));
        }
        let mut batch = Self::new(id, ctx, repeat);
        for _ in 0..size {
            let kind = kinds[rng.gen_range(0..kinds.len())];
            batch.add(Operation::new(kind));
        }
        Ok(batch)
    }

    pub fn add(&mut self, operation: Operation) {
        self.actions.push(Action {
            operation,
            repeat: self.repeat,
        });
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Kinds of the batch's operations, in fire order
    pub fn kinds(&self) -> Vec<OperationKind> {
        self.actions.iter().map(|a| a.operation.kind()).collect()
    }

    /// Shared handle for stopping and observing this batch from other threads
    pub fn control(&self) -> Arc<BatchControl> {
        Arc::clone(&self.control)
    }

    pub fn stop(&self) {
        self.control.stop();
    }

    /// Run rounds until stopped or `mode` is exhausted
    ///
    /// Returns the number of rounds run.
    ///
    /// # Errors
    ///
    /// Only `EntropySourceUnavailable`, which ends the loop immediately.
    pub fn run(&mut self, mode: RepeatMode) -> Result<u64, Error> {
        self.control.begin();
        tracing::debug!(worker = self.id, operations = self.len(), ?mode, "batch running");

        let result = self.run_rounds(mode);

        self.control.finish();
        match &result {
            Ok(rounds) => tracing::debug!(worker = self.id, rounds, "batch stopped"),
            Err(e) => tracing::error!(worker = self.id, error = %e, "batch failed"),
        }
        result
    }

    fn run_rounds(&mut self, mode: RepeatMode) -> Result<u64, Error> {
        let mut completed = 0;
        while !self.control.is_stopped() && mode.allows(completed) {
            self.round()?;
            completed += 1;
            self.control.rounds.fetch_add(1, Ordering::AcqRel);
        }
        Ok(completed)
    }

    /// Fire every operation, then wait on each in the same order
    fn round(&mut self) -> Result<(), Error> {
        for action in &mut self.actions {
            action.fire(&mut self.ctx)?;
        }

        for action in &mut self.actions {
            if self.control.is_stopped() {
                // Abandoned handles are dropped with the batch; it never runs again
                break;
            }
            action.operation.wait_result();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::payload::tests::BrokenEntropy;
    use crate::generator::{KeyGenerator, PayloadGenerator, RandomGenerator};
    use crate::session::mock::MockSession;
    use crate::session::{
        AsyncResult, Completer, ControlHandle, LookupHandle, MonitorHandle, ReadHandle, RemoveHandle,
        Route, Session, WriteHandle,
    };
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;

    fn context(session: Arc<dyn Session>) -> OperationContext {
        let generator = RandomGenerator::from_bounds(100, 32, Some(11)).unwrap();
        OperationContext::new(session, generator, false)
    }

    fn batch_of(session: &MockSession, kinds: &[OperationKind], repeat: u32) -> ActionBatch {
        let mut batch = ActionBatch::new(0, context(Arc::new(session.clone())), repeat);
        for &kind in kinds {
            batch.add(Operation::new(kind));
        }
        batch
    }

    /// Session that resolves removes only once `expected` of them are in flight
    struct GatedSession {
        expected: usize,
        pending: Mutex<Vec<Completer<()>>>,
    }

    impl GatedSession {
        fn unsupported<T>() -> AsyncResult<T> {
            AsyncResult::ready(Err(Error::Backend("unsupported".to_string())))
        }
    }

    impl Session for GatedSession {
        fn write(&self, _: &str, _: &[u8], _: u64, _: u64) -> WriteHandle {
            Self::unsupported()
        }
        fn write_prepare(&self, _: &str, _: &[u8], _: u64, _: u64) -> WriteHandle {
            Self::unsupported()
        }
        fn write_plain(&self, _: &str, _: &[u8], _: u64) -> WriteHandle {
            Self::unsupported()
        }
        fn write_commit(&self, _: &str, _: &[u8], _: u64, _: u64) -> WriteHandle {
            Self::unsupported()
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
            let (completer, handle) = AsyncResult::channel();
            let mut pending = self.pending.lock().unwrap();
            pending.push(completer);
            if pending.len() == self.expected {
                for completer in pending.drain(..) {
                    completer.complete(Ok(()));
                }
            }
            handle
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
    fn test_round_fires_everything_before_waiting() {
        let session = Arc::new(GatedSession {
            expected: 4,
            pending: Mutex::new(Vec::new()),
        });
        let mut batch = ActionBatch::new(0, context(session), 1);
        for _ in 0..4 {
            batch.add(Operation::new(OperationKind::Remove));
        }

        // Waiting on the first remove before firing the rest would never resolve
        let (tx, rx) = crossbeam::channel::bounded(1);
        thread::spawn(move || {
            let _ = tx.send(batch.run(RepeatMode::Rounds(3)));
        });
        let rounds = rx
            .recv_timeout(Duration::from_secs(10))
            .expect("round waited before firing every operation");
        assert_eq!(rounds.unwrap(), 3);
    }

    #[test]
    fn test_counted_rounds() {
        let session = MockSession::new();
        let mut batch = batch_of(&session, &[OperationKind::Remove; 3], 1);
        let control = batch.control();

        assert_eq!(control.state(), BatchState::Idle);
        assert_eq!(batch.run(RepeatMode::Rounds(4)).unwrap(), 4);
        assert_eq!(session.count("remove"), 12);
        assert_eq!(control.rounds_completed(), 4);
        assert_eq!(control.state(), BatchState::Stopped);
    }

    #[test]
    fn test_fire_order_matches_declaration_order() {
        let session = MockSession::new();
        let mut batch = batch_of(
            &session,
            &[OperationKind::Remove, OperationKind::StatMonitor, OperationKind::Write],
            1,
        );
        batch.run(RepeatMode::Rounds(2)).unwrap();
        assert_eq!(
            session.call_names(),
            vec!["remove", "monitor_stat", "write", "remove", "monitor_stat", "write"]
        );
    }

    #[test]
    fn test_stop_before_run() {
        let session = MockSession::new();
        let mut batch = batch_of(&session, &[OperationKind::Remove], 1);
        batch.stop();
        batch.stop();

        assert_eq!(batch.run(RepeatMode::Unbounded).unwrap(), 0);
        assert_eq!(session.call_count(), 0);
        assert_eq!(batch.control().state(), BatchState::Stopped);
    }

    #[test]
    fn test_stop_mid_run_ends_within_one_round() {
        let session = MockSession::new();
        session.set_latency(Some(Duration::from_millis(1)));
        let mut batch = batch_of(&session, &[OperationKind::Remove, OperationKind::Write], 1);
        let control = batch.control();

        let worker = thread::spawn(move || batch.run(RepeatMode::Unbounded));

        while control.rounds_completed() < 3 {
            thread::sleep(Duration::from_millis(1));
        }
        control.stop();
        let observed = control.rounds_completed();
        assert!(matches!(
            control.state(),
            BatchState::Stopping | BatchState::Stopped
        ));

        let rounds = worker.join().unwrap().unwrap();
        assert!(
            rounds <= observed + 1,
            "ran {} rounds after stop observed at {}",
            rounds,
            observed
        );
        assert_eq!(control.rounds_completed(), rounds);
        assert_eq!(control.state(), BatchState::Stopped);
    }

    #[test]
    fn test_counted_mode_stops_early_when_stopped() {
        let session = MockSession::new();
        session.set_latency(Some(Duration::from_millis(1)));
        let mut batch = batch_of(&session, &[OperationKind::Remove], 1);
        let control = batch.control();

        let worker = thread::spawn(move || batch.run(RepeatMode::Rounds(1_000_000)));
        while control.rounds_completed() < 2 {
            thread::sleep(Duration::from_millis(1));
        }
        control.stop();

        let rounds = worker.join().unwrap().unwrap();
        assert!(rounds < 1_000_000);
    }

    #[test]
    fn test_repeat_issues_serially() {
        let session = MockSession::new();
        let mut batch = batch_of(&session, &[OperationKind::Remove, OperationKind::StatMonitor], 3);
        batch.run(RepeatMode::Rounds(2)).unwrap();

        assert_eq!(session.count("remove"), 6);
        assert_eq!(session.count("monitor_stat"), 6);
        assert_eq!(
            &session.call_names()[..6],
            &["remove", "remove", "remove", "monitor_stat", "monitor_stat", "monitor_stat"]
        );
    }

    #[test]
    fn test_random_batch_composition() {
        let session = MockSession::new();
        let kinds = [OperationKind::Write, OperationKind::Read];
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(5);
        let batch = ActionBatch::random(
            3,
            &kinds,
            10,
            context(Arc::new(session)),
            1,
            &mut rng,
        )
        .unwrap();

        assert_eq!(batch.id(), 3);
        assert_eq!(batch.len(), 10);
        assert!(batch.kinds().iter().all(|k| kinds.contains(k)));
    }

    #[test]
    fn test_random_batch_requires_kinds() {
        let session = MockSession::new();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(5);
        let result = ActionBatch::random(0, &[], 10, context(Arc::new(session)), 1, &mut rng);
        assert!(matches!(result, Err(e) if e.is_configuration()));
    }

    #[test]
    fn test_entropy_failure_ends_run() {
        let session = MockSession::new();
        let payloads = PayloadGenerator::with_entropy(
            8,
            Box::new(BrokenEntropy),
            Xoshiro256PlusPlus::seed_from_u64(2),
        )
        .unwrap();
        let generator = RandomGenerator::new(KeyGenerator::new(10).unwrap(), payloads);
        let ctx = OperationContext::new(Arc::new(session.clone()), generator, false);
        let mut batch = ActionBatch::new(0, ctx, 1);
        batch.add(Operation::new(OperationKind::Remove));
        batch.add(Operation::new(OperationKind::Write));

        let err = batch.run(RepeatMode::Unbounded).unwrap_err();
        assert!(matches!(err, Error::EntropySourceUnavailable(_)));
        assert_eq!(batch.control().state(), BatchState::Stopped);
        assert_eq!(batch.control().rounds_completed(), 0);
    }

    #[test]
    fn test_failing_backend_keeps_running() {
        let session = MockSession::new();
        session.set_should_fail(true);
        let mut batch = batch_of(&session, &OperationKind::ALL, 1);
        assert_eq!(batch.run(RepeatMode::Rounds(5)).unwrap(), 5);
    }

    #[test]
    fn test_repeat_mode_from_rounds() {
        assert_eq!(RepeatMode::from_rounds(None), RepeatMode::Unbounded);
        assert_eq!(RepeatMode::from_rounds(Some(0)), RepeatMode::Unbounded);
        assert_eq!(RepeatMode::from_rounds(Some(7)), RepeatMode::Rounds(7));
    }
}
