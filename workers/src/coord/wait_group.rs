//! A counting latch that lets one or more threads wait for a group of
//! participants to finish.
//!
//! Each participant is counted with [`WaitGroup::add`] before it starts and
//! calls [`WaitGroup::done`] when it ends. [`WaitGroup::wait`] parks the
//! caller until the count returns to zero. The count and the queue of parked
//! threads live behind one `parking_lot::Mutex`, so a `done` racing a `wait`
//! can never lose the wake-up.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::thread::{self, Thread};
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::internal::backoff;

#[derive(Debug)]
struct GroupInternal {
  /// Participants that have not called `done` yet.
  count: usize,
  /// Threads parked in `wait`, woken together when `count` reaches zero.
  waiters: VecDeque<Thread>,
}

/// A clonable handle to a shared completion counter.
pub struct WaitGroup {
  internal: Arc<Mutex<GroupInternal>>,
}

impl fmt::Debug for WaitGroup {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let internal = self.internal.lock();
    f.debug_struct("WaitGroup")
      .field("count", &internal.count)
      .field("waiters", &internal.waiters.len())
      .finish()
  }
}

impl WaitGroup {
  /// Creates a group with a count of zero.
  pub fn new() -> Self {
    Self {
      internal: Arc::new(Mutex::new(GroupInternal {
        count: 0,
        waiters: VecDeque::new(),
      })),
    }
  }

  /// Registers `n` more participants.
  pub fn add(&self, n: usize) {
    self.internal.lock().count += n;
  }

  /// Marks one participant as finished and returns how many remain.
  ///
  /// Calling `done` more times than `add` registered is a bug; the count
  /// saturates at zero.
  pub fn done(&self) -> usize {
    let waiters;
    let remaining;
    {
      let mut internal = self.internal.lock();
      debug_assert!(internal.count > 0, "WaitGroup::done called more often than add");
      internal.count = internal.count.saturating_sub(1);
      remaining = internal.count;
      if remaining > 0 {
        return remaining;
      }
      waiters = std::mem::take(&mut internal.waiters);
    }
    // Wake waiters outside the lock.
    for waiter in waiters {
      waiter.unpark();
    }
    remaining
  }

  /// The number of participants still running.
  pub fn count(&self) -> usize {
    self.internal.lock().count
  }

  /// Blocks until the count reaches zero. Returns immediately if it already is.
  pub fn wait(&self) {
    let me = thread::current();
    let mut internal = self.internal.lock();
    while internal.count > 0 {
      enqueue_once(&mut internal.waiters, &me);
      drop(internal);
      thread::park();
      internal = self.internal.lock();
    }
  }

  /// Blocks until the count reaches zero or `timeout` elapses.
  ///
  /// Returns `true` if the count reached zero. A timeout too large to
  /// represent waits like [`wait`](WaitGroup::wait).
  pub fn wait_timeout(&self, timeout: Duration) -> bool {
    let Some(deadline) = backoff::deadline_after(timeout) else {
      self.wait();
      return true;
    };
    let me = thread::current();
    let mut internal = self.internal.lock();
    while internal.count > 0 {
      let now = Instant::now();
      if now >= deadline {
        internal.waiters.retain(|t| t.id() != me.id());
        return false;
      }
      enqueue_once(&mut internal.waiters, &me);
      drop(internal);
      thread::park_timeout(deadline - now);
      internal = self.internal.lock();
    }
    true
  }
}

/// `done` drains the queue, so after a spurious or timed-out wake the thread
/// may or may not still be queued.
fn enqueue_once(waiters: &mut VecDeque<Thread>, me: &Thread) {
  if !waiters.iter().any(|t| t.id() == me.id()) {
    waiters.push_back(me.clone());
  }
}

impl Default for WaitGroup {
  fn default() -> Self {
    Self::new()
  }
}

impl Clone for WaitGroup {
  fn clone(&self) -> Self {
    Self {
      internal: self.internal.clone(),
    }
  }
}
