// src/pool/job.rs
//! Units of work, their results, and the producer handle that numbers them.

use crate::channel::Sender;
use crate::error::{CloseError, SendError, TaskError};

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Identifies a job for its whole life, including resubmissions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "job-{}", self.0)
  }
}

impl From<u64> for JobId {
  fn from(id: u64) -> Self {
    JobId(id)
  }
}

/// A payload travelling through a pool's input channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job<P> {
  pub id: JobId,
  pub payload: P,
}

impl<P> Job<P> {
  pub fn new(id: impl Into<JobId>, payload: P) -> Self {
    Job { id: id.into(), payload }
  }
}

/// What a worker reports for one job.
#[derive(Debug, PartialEq, Eq)]
pub struct JobResult<P, R, E> {
  pub id: JobId,
  /// Index of the worker that handled the job.
  pub worker: usize,
  /// How many times the work function ran. `0` if the job was cancelled
  /// before its first run.
  pub attempts: u32,
  pub outcome: Result<R, TaskError<E>>,
  unprocessed: Option<P>,
}

impl<P, R, E> JobResult<P, R, E> {
  pub(crate) fn completed(id: JobId, worker: usize, attempts: u32, value: R) -> Self {
    JobResult {
      id,
      worker,
      attempts,
      outcome: Ok(value),
      unprocessed: None,
    }
  }

  pub(crate) fn failed(id: JobId, worker: usize, attempts: u32, error: E) -> Self {
    JobResult {
      id,
      worker,
      attempts,
      outcome: Err(TaskError::Processing(error)),
      unprocessed: None,
    }
  }

  pub(crate) fn cancelled(id: JobId, worker: usize, attempts: u32, payload: P) -> Self {
    JobResult {
      id,
      worker,
      attempts,
      outcome: Err(TaskError::Cancelled),
      unprocessed: Some(payload),
    }
  }

  pub fn is_ok(&self) -> bool {
    self.outcome.is_ok()
  }

  pub fn is_cancelled(&self) -> bool {
    matches!(self.outcome, Err(TaskError::Cancelled))
  }

  /// For a cancelled job, rebuilds the job (same id, original payload) so it
  /// can be submitted again. `None` for any other outcome.
  pub fn into_resubmission(self) -> Option<Job<P>> {
    let id = self.id;
    self.unprocessed.map(|payload| Job { id, payload })
  }
}

/// The producer side of a pool's input channel.
///
/// Assigns increasing [`JobId`]s starting at `0`. Clones share the counter, so
/// ids stay unique across producers.
pub struct Submitter<P> {
  sender: Sender<Job<P>>,
  next_id: Arc<AtomicU64>,
}

impl<P> Clone for Submitter<P> {
  fn clone(&self) -> Self {
    Submitter {
      sender: self.sender.clone(),
      next_id: Arc::clone(&self.next_id),
    }
  }
}

impl<P> fmt::Debug for Submitter<P> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Submitter")
      .field("submitted", &self.next_id.load(Ordering::Relaxed))
      .finish_non_exhaustive()
  }
}

impl<P: Send> Submitter<P> {
  pub fn new(sender: Sender<Job<P>>) -> Self {
    Submitter {
      sender,
      next_id: Arc::new(AtomicU64::new(0)),
    }
  }

  /// Wraps `payload` in a new job and sends it, blocking while the input is
  /// full.
  ///
  /// # Errors
  ///
  /// `SendError::Closed` once the input has been finished or every worker
  /// has gone. The id is consumed either way.
  pub fn submit(&self, payload: P) -> Result<JobId, SendError> {
    let id = JobId(self.next_id.fetch_add(1, Ordering::Relaxed));
    self.sender.send(Job { id, payload })?;
    Ok(id)
  }

  /// Sends a job again under its original id, typically one returned by
  /// [`JobResult::into_resubmission`].
  pub fn resubmit(&self, job: Job<P>) -> Result<(), SendError> {
    self.sender.send(job)
  }

  /// Closes the input. Workers finish what is buffered and then exit.
  pub fn finish(&self) -> Result<(), CloseError> {
    self.sender.close()
  }

  /// How many ids have been handed out.
  pub fn submitted(&self) -> u64 {
    self.next_id.load(Ordering::Relaxed)
  }

  pub fn sender(&self) -> &Sender<Job<P>> {
    &self.sender
  }
}
