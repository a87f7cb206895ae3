// src/pool/worker.rs
//! The loop each pool thread runs.

use super::job::{Job, JobId, JobResult};
use super::PoolCounters;
use crate::channel::{Receiver, Sender};
use crate::config::RetryPolicy;
use crate::coord::WaitGroup;
use crate::error::{Cancelled, TrySendError};
use crate::select::Select;
use crate::shutdown::StopListener;

use std::cell::Cell;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Why a worker thread ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerExit {
  /// The input channel was closed and drained.
  Drained,
  /// The stop signal fired.
  Stopped,
  /// A result could not be delivered because the output channel is closed.
  OutputClosed,
}

/// What the work function knows about the job it is running.
pub struct WorkerContext<'a> {
  worker: usize,
  job: JobId,
  attempt: u32,
  stop: &'a StopListener,
  abandoned: Cell<bool>,
}

impl fmt::Debug for WorkerContext<'_> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("WorkerContext")
      .field("worker", &self.worker)
      .field("job", &self.job)
      .field("attempt", &self.attempt)
      .finish_non_exhaustive()
  }
}

impl<'a> WorkerContext<'a> {
  pub(crate) fn new(worker: usize, job: JobId, attempt: u32, stop: &'a StopListener) -> Self {
    WorkerContext {
      worker,
      job,
      attempt,
      stop,
      abandoned: Cell::new(false),
    }
  }

  pub fn worker_id(&self) -> usize {
    self.worker
  }

  pub fn job_id(&self) -> JobId {
    self.job
  }

  /// 1 for the first run, incremented on every retry.
  pub fn attempt(&self) -> u32 {
    self.attempt
  }

  /// Non-blocking check of the pool's stop signal.
  pub fn is_stopped(&self) -> bool {
    self.stop.is_stopped()
  }

  /// Fails once stop has been signaled.
  ///
  /// Long-running work should call this between steps and bail out with its
  /// own error when it fails. The job is then reported as
  /// [`TaskError::Cancelled`](crate::TaskError::Cancelled) whatever error the
  /// work function returns, and the payload is handed back.
  pub fn checkpoint(&self) -> Result<(), Cancelled> {
    if self.stop.is_stopped() {
      self.abandoned.set(true);
      return Err(Cancelled);
    }
    Ok(())
  }

  fn abandoned(&self) -> bool {
    self.abandoned.get()
  }
}

/// Runs on the worker thread and marks the worker finished however the
/// thread ends, panics included.
pub(crate) struct ExitGuard<O> {
  pub(crate) worker: usize,
  pub(crate) output: Sender<O>,
  pub(crate) close_output: bool,
  pub(crate) remaining: Arc<AtomicUsize>,
  pub(crate) running: WaitGroup,
}

impl<O> Drop for ExitGuard<O> {
  fn drop(&mut self) {
    let last = self.remaining.fetch_sub(1, Ordering::AcqRel) == 1;
    if last && self.close_output && !self.output.shared.is_closed() {
      // Someone may close it between the check and here; either way it ends closed.
      let _ = self.output.shared.close();
      tracing::debug!(worker = self.worker, "last worker exited, output closed");
    }
    self.running.done();
  }
}

enum Delivery {
  Sent,
  OutputClosed,
  Stopped,
}

enum Next<P> {
  Job(Job<P>),
  Drained,
  Stop,
}

pub(crate) struct Worker<P, R, E, F> {
  pub(crate) id: usize,
  pub(crate) pool: Arc<str>,
  pub(crate) input: Receiver<Job<P>>,
  pub(crate) output: Sender<JobResult<P, R, E>>,
  pub(crate) stop: StopListener,
  pub(crate) retry: RetryPolicy,
  pub(crate) work: Arc<F>,
  pub(crate) counters: Arc<PoolCounters>,
}

impl<P, R, E, F> Worker<P, R, E, F>
where
  P: Send,
  R: Send,
  E: fmt::Display + Send,
  F: Fn(&WorkerContext<'_>, &P) -> Result<R, E>,
{
  pub(crate) fn run(self) -> WorkerExit {
    tracing::debug!(pool = %self.pool, worker = self.id, "worker started");
    let exit = self.run_loop();
    tracing::debug!(pool = %self.pool, worker = self.id, exit = ?exit, "worker exited");
    exit
  }

  fn run_loop(&self) -> WorkerExit {
    loop {
      let next = Select::new()
        .recv(self.stop.receiver(), |_| Next::Stop)
        .recv(&self.input, |job| match job {
          Some(job) => Next::Job(job),
          None => Next::Drained,
        })
        .wait();

      let job = match next {
        Next::Job(job) => job,
        Next::Drained => return WorkerExit::Drained,
        Next::Stop => return WorkerExit::Stopped,
      };

      let result = self.process(job);
      let cancelled = result.is_cancelled();
      match self.deliver(result) {
        Delivery::Sent if cancelled => return WorkerExit::Stopped,
        Delivery::Sent => {}
        Delivery::OutputClosed => return WorkerExit::OutputClosed,
        Delivery::Stopped => return WorkerExit::Stopped,
      }
    }
  }

  /// Hands a result to the output. While the output is full the worker also
  /// listens for stop, and a result nobody made room for is dropped.
  fn deliver(&self, result: JobResult<P, R, E>) -> Delivery {
    let id = result.id;
    let result = match self.output.try_send(result) {
      Ok(()) => return Delivery::Sent,
      Err(TrySendError::Closed(_)) => {
        tracing::error!(pool = %self.pool, worker = self.id, job = %id, "output channel closed, result dropped");
        return Delivery::OutputClosed;
      }
      Err(TrySendError::Full(result)) => result,
    };

    let delivery = Select::new()
      .send(&self.output, result, |sent| match sent {
        Ok(()) => Delivery::Sent,
        Err(_) => Delivery::OutputClosed,
      })
      .recv(self.stop.receiver(), |_| Delivery::Stopped)
      .wait();
    match delivery {
      Delivery::Sent => {}
      Delivery::OutputClosed => {
        tracing::error!(pool = %self.pool, worker = self.id, job = %id, "output channel closed, result dropped");
      }
      Delivery::Stopped => {
        tracing::error!(pool = %self.pool, worker = self.id, job = %id, "stop signaled while output full, result dropped");
      }
    }
    delivery
  }

  fn process(&self, job: Job<P>) -> JobResult<P, R, E> {
    let Job { id, payload } = job;
    // A job that lost the race against the stop signal is never started.
    if self.stop.is_stopped() {
      return self.cancel(id, 0, payload);
    }

    let max_attempts = self.retry.max_attempts();
    let mut attempt = 0;
    loop {
      attempt += 1;
      let ctx = WorkerContext::new(self.id, id, attempt, &self.stop);
      let error = match (self.work)(&ctx, &payload) {
        Ok(value) => {
          self.counters.completed.fetch_add(1, Ordering::Relaxed);
          tracing::trace!(pool = %self.pool, worker = self.id, job = %id, attempt, "job completed");
          return JobResult::completed(id, self.id, attempt, value);
        }
        Err(error) => error,
      };

      if ctx.abandoned() {
        return self.cancel(id, attempt, payload);
      }
      if attempt >= max_attempts {
        self.counters.failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(pool = %self.pool, worker = self.id, job = %id, attempt, error = %error, "job failed");
        return JobResult::failed(id, self.id, attempt, error);
      }

      tracing::debug!(pool = %self.pool, worker = self.id, job = %id, attempt, error = %error, "job failed, retrying");
      if self.stop.wait_timeout(self.retry.backoff()) {
        return self.cancel(id, attempt, payload);
      }
    }
  }

  fn cancel(&self, id: JobId, attempts: u32, payload: P) -> JobResult<P, R, E> {
    self.counters.cancelled.fetch_add(1, Ordering::Relaxed);
    tracing::trace!(pool = %self.pool, worker = self.id, job = %id, attempts, "job cancelled");
    JobResult::cancelled(id, self.id, attempts, payload)
  }
}
