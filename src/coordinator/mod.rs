//! Coordinator module
//!
//! The [`Dispatcher`] owns the worker pool: one OS thread per worker, each
//! running its own [`ActionBatch`] against the shared session. Workers
//! report their exit on a channel so the entry point can react to a failed
//! worker, or to every worker finishing in counted mode, without polling.

use crate::config::WorkloadConfig;
use crate::error::Error;
use crate::generator::RandomGenerator;
use crate::operation::{registry, OperationContext, OperationKind};
use crate::session::Session;
use crate::worker::{ActionBatch, BatchControl, RepeatMode};
use crossbeam::channel::{self, Receiver, Sender};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Exit notice sent by every worker thread, including on panic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerExit {
    pub index: usize,
    pub failed: bool,
}

/// Sends the exit notice when the worker thread unwinds or returns
struct ExitNotice {
    index: usize,
    failed: bool,
    tx: Sender<WorkerExit>,
}

impl Drop for ExitNotice {
    fn drop(&mut self) {
        let _ = self.tx.send(WorkerExit {
            index: self.index,
            failed: self.failed,
        });
    }
}

/// What ended an [`ExitWatcher::wait`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchOutcome {
    /// Every worker returned normally
    AllFinished,
    /// A worker ended with an error or panicked
    WorkerFailed(usize),
}

/// Blocks until the pool needs attention
pub struct ExitWatcher {
    rx: Receiver<WorkerExit>,
    remaining: usize,
}

impl ExitWatcher {
    /// Wait for a failed worker or for every worker to finish
    ///
    /// In unbounded mode this only returns once a worker fails or the pool
    /// has been shut down.
    pub fn wait(&mut self) -> WatchOutcome {
        while self.remaining > 0 {
            match self.rx.recv() {
                Ok(exit) if exit.failed => return WatchOutcome::WorkerFailed(exit.index),
                Ok(_) => self.remaining -= 1,
                Err(_) => break,
            }
        }
        WatchOutcome::AllFinished
    }
}

struct WorkerHandle {
    index: usize,
    control: Arc<BatchControl>,
    thread: Option<JoinHandle<Result<u64, Error>>>,
}

/// Rounds completed by each worker, in worker order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    pub rounds: Vec<u64>,
}

impl ShutdownReport {
    pub fn workers_joined(&self) -> usize {
        self.rounds.len()
    }

    pub fn total_rounds(&self) -> u64 {
        self.rounds.iter().sum()
    }
}

/// Worker pool driving one action batch per thread
pub struct Dispatcher {
    workers: Vec<WorkerHandle>,
    exits: Receiver<WorkerExit>,
    kinds: Vec<OperationKind>,
}

impl Dispatcher {
    /// Resolve the operation set and start `threads` workers
    ///
    /// Operation names are resolved before any thread is created, so an
    /// unknown name leaves nothing running. Each worker gets its own
    /// generator and a batch of `commands_per_worker` operations sampled
    /// from the resolved set. With a seed, worker `i` is seeded from
    /// `seed + i` and runs are reproducible.
    pub fn start(
        workload: &WorkloadConfig,
        threads: usize,
        session: Arc<dyn Session>,
    ) -> Result<Self, Error> {
        if threads == 0 {
            return Err(Error::config("workers.threads must be at least 1"));
        }
        if workload.rounds == Some(0) {
            return Err(Error::config("rounds must be at least 1 (omit for unbounded)"));
        }
        let kinds = registry::resolve(&workload.commands)?;
        let mode = RepeatMode::from_rounds(workload.rounds);
        tracing::info!(
            operations = %kinds.iter().map(|k| k.name()).collect::<Vec<_>>().join(","),
            workers = threads,
            ?mode,
            "starting workers"
        );

        // Build every batch first so a bad generator bound fails before spawning
        let mut batches = Vec::with_capacity(threads);
        for index in 0..threads {
            let mut rng = match workload.seed {
                Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed.wrapping_add(index as u64)),
                None => Xoshiro256PlusPlus::from_entropy(),
            };
            let generator_seed = workload.seed.map(|_| rng.gen::<u64>());
            let generator = RandomGenerator::from_bounds(
                workload.max_key_value,
                workload.max_data_size,
                generator_seed,
            )?;
            let ctx = OperationContext::new(Arc::clone(&session), generator, workload.backend_control);
            batches.push(ActionBatch::random(
                index,
                &kinds,
                workload.commands_per_worker,
                ctx,
                workload.repeat,
                &mut rng,
            )?);
        }

        let (tx, exits) = channel::unbounded();
        let mut dispatcher = Self {
            workers: Vec::with_capacity(threads),
            exits,
            kinds,
        };

        for mut batch in batches {
            let index = batch.id();
            let control = batch.control();
            let tx = tx.clone();
            let spawned = thread::Builder::new()
                .name(format!("bomber-worker-{}", index))
                .spawn(move || {
                    let mut notice = ExitNotice {
                        index,
                        failed: true,
                        tx,
                    };
                    tracing::debug!(worker = index, kinds = ?batch.kinds(), "worker started");
                    let result = batch.run(mode);
                    notice.failed = result.is_err();
                    result
                });

            match spawned {
                Ok(thread) => dispatcher.workers.push(WorkerHandle {
                    index,
                    control,
                    thread: Some(thread),
                }),
                // Drop stops and joins whatever did start
                Err(e) => return Err(Error::Spawn(e)),
            }
        }

        Ok(dispatcher)
    }

    /// Number of workers started
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// The resolved operation set batches were sampled from
    pub fn kinds(&self) -> &[OperationKind] {
        &self.kinds
    }

    /// Watcher over worker exits
    pub fn watcher(&self) -> ExitWatcher {
        ExitWatcher {
            rx: self.exits.clone(),
            remaining: self.workers.len(),
        }
    }

    /// Signal every worker to stop without waiting
    pub fn stop(&self) {
        for worker in &self.workers {
            worker.control.stop();
        }
    }

    /// Stop every worker and join them all
    ///
    /// Every thread is joined even when some failed; the first failure is
    /// returned after that.
    pub fn shutdown(mut self) -> Result<ShutdownReport, Error> {
        tracing::info!(workers = self.workers.len(), "shutting down workers");
        self.stop();

        let mut report = ShutdownReport::default();
        let mut first_error = None;
        for worker in &mut self.workers {
            let Some(thread) = worker.thread.take() else {
                continue;
            };
            let outcome = thread
                .join()
                .unwrap_or(Err(Error::WorkerPanicked(worker.index)));
            match outcome {
                Ok(rounds) => {
                    tracing::debug!(worker = worker.index, rounds, "worker joined");
                    report.rounds.push(rounds);
                }
                Err(e) => {
                    tracing::error!(worker = worker.index, error = %e, "worker failed");
                    report.rounds.push(worker.control.rounds_completed());
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.stop();
        for worker in &mut self.workers {
            if let Some(thread) = worker.thread.take() {
                let _ = thread.join();
            }
        }
    }
}
