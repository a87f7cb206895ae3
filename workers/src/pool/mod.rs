// src/pool/mod.rs

//! A fixed set of worker threads sharing one input and one output channel.
//!
//! Every worker competes for jobs on the same [`Receiver`], so each job goes
//! to exactly one worker and idle workers pick up work first. Results, failed
//! ones included, are sent to the shared output as [`JobResult`]s.
//!
//! ### Lifecycle
//!
//! Workers run until one of the following happens:
//! - the input is closed and drained ([`WorkerExit::Drained`]), the normal
//!   way to wind a pool down,
//! - the stop signal fires ([`WorkerPool::stop`]); a job already taken but
//!   not finished is reported as cancelled with its payload handed back,
//!   and a worker waiting for room in a full output drops its result
//!   (logged at `error` with the job id) and exits,
//! - the output is closed, so results can no longer be delivered.
//!
//! By default the last worker to exit closes the output, so a consumer can
//! simply iterate the output until it ends.
//!
//! A panic in the work function unwinds that worker's thread and is surfaced
//! by [`WorkerPool::join`].

mod job;
mod worker;

pub use job::{Job, JobId, JobResult, Submitter};
pub use worker::{WorkerContext, WorkerExit};

use crate::channel::{Receiver, Sender};
use crate::config::{PoolConfig, RetryPolicy};
use crate::coord::WaitGroup;
use crate::error::{CloseError, PoolError, Result};
use crate::shutdown::Shutdown;
use worker::{ExitGuard, Worker};

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
  pub(crate) completed: AtomicU64,
  pub(crate) failed: AtomicU64,
  pub(crate) cancelled: AtomicU64,
}

impl PoolCounters {
  fn snapshot(&self) -> JobCounts {
    JobCounts {
      completed: self.completed.load(Ordering::Relaxed),
      failed: self.failed.load(Ordering::Relaxed),
      cancelled: self.cancelled.load(Ordering::Relaxed),
    }
  }
}

/// How many jobs each outcome has been reported for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobCounts {
  pub completed: u64,
  pub failed: u64,
  pub cancelled: u64,
}

impl JobCounts {
  pub fn total(&self) -> u64 {
    self.completed + self.failed + self.cancelled
  }
}

/// Returned by [`WorkerPool::join`] once every worker has exited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolReport {
  pub name: String,
  /// Exit reason per worker, indexed by worker id.
  pub exits: Vec<WorkerExit>,
  pub jobs: JobCounts,
}

impl PoolReport {
  /// `true` if every worker exited because the input was drained.
  pub fn drained(&self) -> bool {
    self.exits.iter().all(|exit| *exit == WorkerExit::Drained)
  }
}

/// Settings for a pool, for when [`WorkerPool::spawn`]'s defaults don't fit.
#[derive(Debug, Clone)]
pub struct PoolBuilder {
  name: String,
  workers: usize,
  retry: RetryPolicy,
  close_output_on_exit: bool,
  shutdown: Option<Shutdown>,
}

impl PoolBuilder {
  pub fn new(workers: usize) -> Self {
    PoolBuilder {
      name: "worker-pool".to_string(),
      workers,
      retry: RetryPolicy::Never,
      close_output_on_exit: true,
      shutdown: None,
    }
  }

  /// Takes name, worker count, retry policy and output handling from a
  /// loaded configuration. Capacities are used by
  /// [`PoolConfig::channels`].
  pub fn from_config(config: &PoolConfig) -> Self {
    PoolBuilder {
      name: config.name.clone(),
      workers: config.workers,
      retry: config.retry,
      close_output_on_exit: config.close_output_on_exit,
      shutdown: None,
    }
  }

  pub fn name(mut self, name: impl Into<String>) -> Self {
    self.name = name.into();
    self
  }

  pub fn retry(mut self, retry: RetryPolicy) -> Self {
    self.retry = retry;
    self
  }

  pub fn close_output_on_exit(mut self, close: bool) -> Self {
    self.close_output_on_exit = close;
    self
  }

  /// Makes the pool obey an existing stop signal, so one
  /// [`Shutdown::signal_stop`] can stop several pools. Without it the pool
  /// gets its own.
  ///
  /// A failed [`spawn`](PoolBuilder::spawn) never fires a shared signal,
  /// since other pools may obey it. Workers it already started keep running
  /// until their input closes or the shared signal fires.
  pub fn shutdown(mut self, shutdown: &Shutdown) -> Self {
    self.shutdown = Some(shutdown.clone());
    self
  }

  /// Starts the worker threads.
  ///
  /// # Errors
  ///
  /// - [`PoolError::NoWorkers`] for a worker count of zero.
  /// - [`PoolError::Spawn`] if the OS refuses a thread. Workers already
  ///   started are stopped if the pool owns its stop signal.
  pub fn spawn<P, R, E, F>(
    self,
    input: Receiver<Job<P>>,
    output: Sender<JobResult<P, R, E>>,
    work: F,
  ) -> Result<WorkerPool>
  where
    P: Send + 'static,
    R: Send + 'static,
    E: fmt::Display + Send + 'static,
    F: Fn(&WorkerContext<'_>, &P) -> std::result::Result<R, E> + Send + Sync + 'static,
  {
    if self.workers == 0 {
      return Err(PoolError::NoWorkers);
    }

    let name: Arc<str> = Arc::from(self.name.as_str());
    let owns_shutdown = self.shutdown.is_none();
    let shutdown = self.shutdown.unwrap_or_default();
    let running = WaitGroup::new();
    let counters = Arc::new(PoolCounters::default());
    let remaining = Arc::new(AtomicUsize::new(self.workers));
    let work = Arc::new(work);

    // One guard per worker up front: if a spawn fails, the guards of workers
    // that never started drop here and keep the counts consistent.
    running.add(self.workers);
    let guards: Vec<_> = (0..self.workers)
      .map(|worker| ExitGuard {
        worker,
        output: output.clone(),
        close_output: self.close_output_on_exit,
        remaining: Arc::clone(&remaining),
        running: running.clone(),
      })
      .collect();

    let mut handles = Vec::with_capacity(self.workers);
    for guard in guards {
      let id = guard.worker;
      let worker = Worker {
        id,
        pool: Arc::clone(&name),
        input: input.clone(),
        output: output.clone(),
        stop: shutdown.listener(),
        retry: self.retry,
        work: Arc::clone(&work),
        counters: Arc::clone(&counters),
      };
      let thread_name = format!("{}-{}", name, id);
      let spawned = thread::Builder::new().name(thread_name.clone()).spawn(move || {
        let _guard = guard;
        worker.run()
      });
      match spawned {
        Ok(handle) => handles.push((id, handle)),
        Err(source) => {
          tracing::error!(pool = %name, worker = id, error = %source, "failed to spawn worker thread");
          stop_after_failed_spawn(&shutdown, owns_shutdown);
          return Err(PoolError::Spawn {
            name: thread_name,
            source,
          });
        }
      }
    }

    tracing::debug!(pool = %name, workers = self.workers, retry = ?self.retry, "worker pool started");
    Ok(WorkerPool {
      name: self.name,
      handles,
      shutdown,
      running,
      counters,
    })
  }
}

/// Stops the workers a failed spawn already started, unless the signal is
/// shared with code outside this pool.
fn stop_after_failed_spawn(shutdown: &Shutdown, owned: bool) {
  if owned {
    let _ = shutdown.signal_stop();
  }
}

/// A running set of worker threads. See the [module docs](self).
///
/// Dropping the pool without calling [`join`](WorkerPool::join) detaches the
/// threads. If the pool owns its stop signal (no
/// [`PoolBuilder::shutdown`]), dropping it also signals stop.
pub struct WorkerPool {
  name: String,
  handles: Vec<(usize, JoinHandle<WorkerExit>)>,
  shutdown: Shutdown,
  running: WaitGroup,
  counters: Arc<PoolCounters>,
}

impl fmt::Debug for WorkerPool {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("WorkerPool")
      .field("name", &self.name)
      .field("workers", &self.handles.len())
      .field("running", &self.running.count())
      .field("stopped", &self.shutdown.is_stopped())
      .finish()
  }
}

impl WorkerPool {
  /// Starts `workers` threads that apply `work` to every job received on
  /// `input` and send a [`JobResult`] for it to `output`.
  ///
  /// Failed jobs are reported once and never retried. Use
  /// [`WorkerPool::builder`] or [`WorkerPool::spawn_with`] to configure a
  /// [`RetryPolicy`].
  ///
  /// ```
  /// use fibre_workers::{channel, collect_exact, Submitter, WorkerPool};
  ///
  /// let (job_tx, job_rx) = channel::bounded(8);
  /// let (result_tx, result_rx) = channel::bounded(8);
  /// let pool = WorkerPool::spawn(3, job_rx, result_tx, |_ctx, n: &u64| Ok::<_, String>(n * n)).unwrap();
  ///
  /// let submitter = Submitter::new(job_tx);
  /// for n in 1..=6 {
  ///   submitter.submit(n).unwrap();
  /// }
  /// submitter.finish().unwrap();
  ///
  /// let mut squares: Vec<u64> = collect_exact(&result_rx, 6)
  ///   .unwrap()
  ///   .into_iter()
  ///   .map(|result| result.outcome.unwrap())
  ///   .collect();
  /// squares.sort();
  /// assert_eq!(squares, vec![1, 4, 9, 16, 25, 36]);
  /// assert!(pool.join().unwrap().drained());
  /// ```
  pub fn spawn<P, R, E, F>(
    workers: usize,
    input: Receiver<Job<P>>,
    output: Sender<JobResult<P, R, E>>,
    work: F,
  ) -> Result<Self>
  where
    P: Send + 'static,
    R: Send + 'static,
    E: fmt::Display + Send + 'static,
    F: Fn(&WorkerContext<'_>, &P) -> std::result::Result<R, E> + Send + Sync + 'static,
  {
    PoolBuilder::new(workers).spawn(input, output, work)
  }

  /// Like [`spawn`](WorkerPool::spawn), configured from a [`PoolConfig`].
  pub fn spawn_with<P, R, E, F>(
    config: &PoolConfig,
    input: Receiver<Job<P>>,
    output: Sender<JobResult<P, R, E>>,
    work: F,
  ) -> Result<Self>
  where
    P: Send + 'static,
    R: Send + 'static,
    E: fmt::Display + Send + 'static,
    F: Fn(&WorkerContext<'_>, &P) -> std::result::Result<R, E> + Send + Sync + 'static,
  {
    PoolBuilder::from_config(config).spawn(input, output, work)
  }

  pub fn builder(workers: usize) -> PoolBuilder {
    PoolBuilder::new(workers)
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn worker_count(&self) -> usize {
    self.handles.len()
  }

  /// Workers that have not exited yet.
  pub fn running(&self) -> usize {
    self.running.count()
  }

  /// Signals every worker to stop. Idle workers and workers blocked on a
  /// full output exit at once, busy ones after their current job.
  ///
  /// # Errors
  ///
  /// `CloseError` if stop was already signaled.
  pub fn stop(&self) -> std::result::Result<(), CloseError> {
    self.shutdown.signal_stop()
  }

  /// The stop signal this pool obeys.
  pub fn shutdown(&self) -> &Shutdown {
    &self.shutdown
  }

  /// Counts of reported jobs so far.
  pub fn stats(&self) -> JobCounts {
    self.counters.snapshot()
  }

  /// Waits at most `timeout` for every worker to exit. Returns `true` if
  /// they all did.
  pub fn wait_timeout(&self, timeout: Duration) -> bool {
    self.running.wait_timeout(timeout)
  }

  /// Waits for every worker to exit.
  ///
  /// # Errors
  ///
  /// [`PoolError::WorkerPanicked`] for the first worker (by id) whose work
  /// function panicked. Every thread is joined before returning.
  pub fn join(mut self) -> Result<PoolReport> {
    let mut exits = Vec::with_capacity(self.handles.len());
    let mut panicked = None;

    for (worker, handle) in self.handles.drain(..) {
      match handle.join() {
        Ok(exit) => exits.push(exit),
        Err(payload) => {
          let message = panic_message(payload.as_ref());
          tracing::error!(pool = %self.name, worker, panic = %message, "worker panicked");
          panicked.get_or_insert(PoolError::WorkerPanicked { worker, message });
        }
      }
    }

    if let Some(error) = panicked {
      return Err(error);
    }
    let report = PoolReport {
      name: std::mem::take(&mut self.name),
      exits,
      jobs: self.counters.snapshot(),
    };
    tracing::debug!(pool = %report.name, jobs = ?report.jobs, "worker pool joined");
    Ok(report)
  }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(message) = payload.downcast_ref::<&str>() {
    (*message).to_string()
  } else if let Some(message) = payload.downcast_ref::<String>() {
    message.clone()
  } else {
    "non-string panic payload".to_string()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::channel;

  #[test]
  fn zero_workers_is_rejected() {
    let (_job_tx, job_rx) = channel::bounded::<Job<u8>>(1);
    let (result_tx, _result_rx) = channel::bounded::<JobResult<u8, u8, String>>(1);
    let result = WorkerPool::spawn(0, job_rx, result_tx, |_, n| Ok(*n));
    assert!(matches!(result, Err(PoolError::NoWorkers)));
  }

  #[test]
  fn failed_spawn_only_stops_an_owned_signal() {
    let owned = Shutdown::new();
    stop_after_failed_spawn(&owned, true);
    assert!(owned.is_stopped());

    let shared = Shutdown::new();
    stop_after_failed_spawn(&shared, false);
    assert!(!shared.is_stopped());
    assert!(shared.signal_stop().is_ok());
  }

  #[test]
  fn panic_messages_are_extracted() {
    let text: Box<dyn Any + Send> = Box::new("boom");
    assert_eq!(panic_message(text.as_ref()), "boom");
    let owned: Box<dyn Any + Send> = Box::new(String::from("kaboom"));
    assert_eq!(panic_message(owned.as_ref()), "kaboom");
    let other: Box<dyn Any + Send> = Box::new(7u8);
    assert_eq!(panic_message(other.as_ref()), "non-string panic payload");
  }

  #[test]
  fn worker_panic_surfaces_from_join() {
    let (job_tx, job_rx) = channel::bounded(4);
    let (result_tx, _result_rx) = channel::bounded::<JobResult<u8, u8, String>>(4);
    let pool = WorkerPool::builder(1)
      .name("panicky")
      .spawn(job_rx, result_tx, |_, n: &u8| {
        if *n == 0 {
          panic!("zero is not allowed");
        }
        Ok(*n)
      })
      .unwrap();

    job_tx.send(Job::new(0, 0)).unwrap();
    job_tx.close().unwrap();
    match pool.join() {
      Err(PoolError::WorkerPanicked { worker, message }) => {
        assert_eq!(worker, 0);
        assert_eq!(message, "zero is not allowed");
      }
      other => panic!("expected a worker panic, got {:?}", other),
    }
  }

  #[test]
  fn last_worker_closes_output() {
    let (job_tx, job_rx) = channel::bounded::<Job<u8>>(4);
    let (result_tx, result_rx) = channel::bounded::<JobResult<u8, u8, String>>(4);
    let keep_open = result_tx.clone();
    let pool = WorkerPool::spawn(2, job_rx, result_tx, |_, n| Ok(*n)).unwrap();
    drop(job_tx);

    assert!(pool.wait_timeout(Duration::from_secs(5)));
    assert!(result_rx.is_closed());
    assert_eq!(pool.running(), 0);
    drop(keep_open);
    pool.join().unwrap();
  }

  #[test]
  fn output_can_stay_open() {
    let (job_tx, job_rx) = channel::bounded::<Job<u8>>(4);
    let (result_tx, result_rx) = channel::bounded::<JobResult<u8, u8, String>>(4);
    let keep_open = result_tx.clone();
    let pool = WorkerPool::builder(2)
      .close_output_on_exit(false)
      .spawn(job_rx, result_tx, |_, n| Ok(*n))
      .unwrap();
    drop(job_tx);

    let report = pool.join().unwrap();
    assert_eq!(report.exits, vec![WorkerExit::Drained; 2]);
    assert!(!result_rx.is_closed());
    drop(keep_open);
    assert!(result_rx.is_closed());
  }
}
