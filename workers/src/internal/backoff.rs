use std::thread;
use std::time::{Duration, Instant};

const SPIN_ROUNDS: usize = 10;
const YIELD_ROUNDS: usize = 20;

/// The instant `timeout` from now. `None` when that is past what `Instant`
/// can represent, which callers treat as no deadline at all.
#[inline]
pub(crate) fn deadline_after(timeout: Duration) -> Option<Instant> {
  Instant::now().checked_add(timeout)
}

#[inline(always)]
fn spin_hint() {
  std::hint::spin_loop();
}

/// Waits for `cond` by spinning briefly, then yielding, then parking until
/// unparked with `cond` true.
pub(crate) fn adaptive_wait<F>(cond: F)
where
  F: Fn() -> bool,
{
  // 1. Spinning Phase
  for _ in 0..SPIN_ROUNDS {
    if cond() {
      return;
    }
    spin_hint();
  }

  // 2. Yielding Phase
  for _ in 0..YIELD_ROUNDS {
    if cond() {
      return;
    }
    thread::yield_now();
  }

  // 3. Blocking Phase. Only an `unpark()` from the notifier ends this.
  while !cond() {
    thread::park();
  }
}

/// Same strategy as [`adaptive_wait`] but gives up once `deadline` passes.
///
/// Returns the last observed value of `cond`.
pub(crate) fn adaptive_wait_until<F>(cond: F, deadline: Instant) -> bool
where
  F: Fn() -> bool,
{
  for _ in 0..SPIN_ROUNDS {
    if cond() {
      return true;
    }
    spin_hint();
  }

  for _ in 0..YIELD_ROUNDS {
    if cond() {
      return true;
    }
    if Instant::now() >= deadline {
      return false;
    }
    thread::yield_now();
  }

  loop {
    if cond() {
      return true;
    }
    let now = Instant::now();
    if now >= deadline {
      return false;
    }
    thread::park_timeout(deadline - now);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicBool, Ordering};
  use std::sync::Arc;

  #[test]
  fn unrepresentable_deadline_means_none() {
    assert!(deadline_after(Duration::MAX).is_none());
    assert!(deadline_after(Duration::from_millis(5)).is_some());
  }

  #[test]
  fn wait_until_gives_up_at_deadline() {
    let start = Instant::now();
    let satisfied = adaptive_wait_until(|| false, start + Duration::from_millis(30));
    assert!(!satisfied);
    assert!(start.elapsed() >= Duration::from_millis(30));
  }

  #[test]
  fn wait_returns_once_flag_is_set_and_thread_unparked() {
    let flag = Arc::new(AtomicBool::new(false));
    let waiter = {
      let flag = flag.clone();
      thread::spawn(move || adaptive_wait(|| flag.load(Ordering::Acquire)))
    };
    thread::sleep(Duration::from_millis(20));
    flag.store(true, Ordering::Release);
    waiter.thread().unpark();
    waiter.join().unwrap();
  }
}
