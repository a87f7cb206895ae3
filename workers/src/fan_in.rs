//! Collecting results from many producers.
//!
//! A consumer needs a stop condition: either it knows how many items to
//! expect ([`collect_exact`]) or it reads until the channel closes
//! ([`collect_all`]). [`merge`] turns several channels into one that closes
//! once all of them have.

use crate::channel::{self, Receiver};
use crate::error::{Incomplete, PoolError, Result, TaskError};
use crate::pool::{Job, JobId, JobResult};

use std::thread;

/// Forwards every item from `inputs` into one new channel of the given
/// capacity. The returned receiver ends once every input is closed and
/// drained.
///
/// One forwarding thread runs per input. Dropping the returned receiver
/// makes the forwarders stop at their next item.
pub fn merge<T: Send + 'static>(inputs: Vec<Receiver<T>>, capacity: usize) -> Result<Receiver<T>> {
  let (tx, rx) = channel::bounded(capacity);
  for (index, input) in inputs.into_iter().enumerate() {
    let tx = tx.clone();
    let name = format!("fan-in-{}", index);
    thread::Builder::new()
      .name(name.clone())
      .spawn(move || {
        let mut forwarded = 0usize;
        for item in input {
          if tx.send(item).is_err() {
            tracing::debug!(input = index, forwarded, "merged output dropped, forwarder exiting");
            return;
          }
          forwarded += 1;
        }
        tracing::trace!(input = index, forwarded, "input drained");
      })
      .map_err(|source| PoolError::Spawn { name, source })?;
  }
  Ok(rx)
}

const MAX_PREALLOCATED: usize = 1024;

/// Receives exactly `expected` items.
///
/// # Errors
///
/// [`Incomplete`] with whatever did arrive if the channel closes first.
pub fn collect_exact<T: Send>(receiver: &Receiver<T>, expected: usize) -> std::result::Result<Vec<T>, Incomplete<T>> {
  // `expected` is only a target, so the upfront allocation is capped.
  let mut items = Vec::with_capacity(expected.min(MAX_PREALLOCATED));
  while items.len() < expected {
    match receiver.recv() {
      Some(item) => items.push(item),
      None => return Err(Incomplete { expected, items }),
    }
  }
  Ok(items)
}

/// Receives until the channel is closed and drained.
pub fn collect_all<T: Send>(receiver: &Receiver<T>) -> Vec<T> {
  receiver.iter().collect()
}

/// Job results sorted by outcome.
#[derive(Debug)]
pub struct BatchReport<P, R, E> {
  pub succeeded: Vec<(JobId, R)>,
  pub failed: Vec<(JobId, E)>,
  /// Cancelled jobs, rebuilt for resubmission.
  pub cancelled: Vec<Job<P>>,
}

impl<P, R, E> Default for BatchReport<P, R, E> {
  fn default() -> Self {
    BatchReport {
      succeeded: Vec::new(),
      failed: Vec::new(),
      cancelled: Vec::new(),
    }
  }
}

impl<P, R, E> BatchReport<P, R, E> {
  pub fn total(&self) -> usize {
    self.succeeded.len() + self.failed.len() + self.cancelled.len()
  }

  pub fn is_complete_success(&self) -> bool {
    self.failed.is_empty() && self.cancelled.is_empty()
  }

  fn record(&mut self, result: JobResult<P, R, E>) {
    if result.is_cancelled() {
      self.cancelled.extend(result.into_resubmission());
      return;
    }
    let id = result.id;
    match result.outcome {
      Ok(value) => self.succeeded.push((id, value)),
      Err(TaskError::Processing(error)) => self.failed.push((id, error)),
      Err(TaskError::Cancelled) => {}
    }
  }
}

impl<P, R, E> FromIterator<JobResult<P, R, E>> for BatchReport<P, R, E> {
  fn from_iter<I: IntoIterator<Item = JobResult<P, R, E>>>(iter: I) -> Self {
    let mut report = BatchReport::default();
    for result in iter {
      report.record(result);
    }
    report
  }
}

impl<P, R, E> Extend<JobResult<P, R, E>> for BatchReport<P, R, E> {
  fn extend<I: IntoIterator<Item = JobResult<P, R, E>>>(&mut self, iter: I) {
    for result in iter {
      self.record(result);
    }
  }
}
