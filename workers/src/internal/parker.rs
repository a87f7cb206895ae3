//! One-shot wake-up handles for parked threads.
//!
//! A `Parker` is created by the thread that is about to block, pushed into
//! whatever wait list applies (a channel's sender/receiver queue, or the
//! observer list of every channel in a select-set), and notified exactly by
//! whoever changes the state it waits on. The `notified` flag is what the
//! waiting thread checks; `unpark()` only shortens the wait.

use super::backoff;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, Thread};
use std::time::Instant;

#[derive(Debug)]
pub(crate) struct Parker {
  thread: Thread,
  notified: AtomicBool,
}

impl Parker {
  /// Creates a parker bound to the calling thread.
  pub(crate) fn new() -> Arc<Self> {
    Arc::new(Parker {
      thread: thread::current(),
      notified: AtomicBool::new(false),
    })
  }

  #[inline]
  pub(crate) fn notify(&self) {
    self.notified.store(true, Ordering::Release);
    self.thread.unpark();
  }

  #[inline]
  pub(crate) fn is_notified(&self) -> bool {
    self.notified.load(Ordering::Acquire)
  }

  /// Blocks until notified, or until `deadline` if one is given.
  ///
  /// Returns `true` if the parker was notified.
  pub(crate) fn wait_until(&self, deadline: Option<Instant>) -> bool {
    match deadline {
      Some(deadline) => backoff::adaptive_wait_until(|| self.is_notified(), deadline),
      None => {
        backoff::adaptive_wait(|| self.is_notified());
        true
      }
    }
  }
}

/// Pointer identity, used to find a waiter's own entry in a shared queue.
#[inline]
pub(crate) fn same(a: &Arc<Parker>, b: &Arc<Parker>) -> bool {
  Arc::ptr_eq(a, b)
}
