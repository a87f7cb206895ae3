//! Waiting on several channel operations at once.
//!
//! A [`Select`] is built from branches, each pairing one channel operation
//! with a continuation. [`Select::wait`] blocks until at least one operation
//! can complete, performs exactly one of them, runs its continuation and
//! returns the continuation's value.
//!
//! When several branches are ready at the same time one is picked uniformly
//! at random, so a busy channel cannot starve the others.
//!
//! A closed channel counts as ready: a receive branch gets `None`, a send
//! branch gets `Err(SendError::Closed)`. This is how a stop signal built on
//! a closed channel wakes every select watching it.
//!
//! ```
//! use fibre_workers::channel;
//! use fibre_workers::Select;
//! use std::time::Duration;
//!
//! let (_tx, work) = channel::bounded::<u32>(4);
//! let (stop_tx, stop) = channel::rendezvous::<()>();
//! stop_tx.close().unwrap();
//!
//! let stopped = Select::new()
//!   .recv(&work, |_job| false)
//!   .recv(&stop, |_| true)
//!   .timeout(Duration::from_secs(1), || false)
//!   .wait();
//! assert!(stopped);
//! ```
//!
//! Two selects on the same rendezvous channel, one sending and one
//! receiving, never meet: a rendezvous send branch only completes against a
//! receiver blocked in `recv`.

use crate::channel::{Receiver, Sender};
use crate::error::{SendError, TryRecvError, TrySendError};
use crate::internal::{backoff, Parker};

use rand::seq::SliceRandom;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

trait Branch<R> {
  /// Performs the operation and runs the continuation if the operation can
  /// complete right now.
  fn try_fire(&mut self) -> Option<R>;
  fn register(&self, parker: &Arc<Parker>);
  fn unregister(&self, parker: &Arc<Parker>);
}

struct RecvBranch<'a, T, F> {
  receiver: &'a Receiver<T>,
  handler: Option<F>,
}

impl<T, R, F> Branch<R> for RecvBranch<'_, T, F>
where
  T: Send,
  F: FnOnce(Option<T>) -> R,
{
  fn try_fire(&mut self) -> Option<R> {
    let received = match self.receiver.try_recv() {
      Ok(item) => Some(item),
      Err(TryRecvError::Closed) => None,
      Err(TryRecvError::Empty) => return None,
    };
    self.handler.take().map(|handler| handler(received))
  }

  fn register(&self, parker: &Arc<Parker>) {
    self.receiver.shared.register_observer(parker);
  }

  fn unregister(&self, parker: &Arc<Parker>) {
    self.receiver.shared.unregister_observer(parker);
  }
}

struct SendBranch<'a, T, F> {
  sender: &'a Sender<T>,
  item: Option<T>,
  handler: Option<F>,
}

impl<T, R, F> Branch<R> for SendBranch<'_, T, F>
where
  T: Send,
  F: FnOnce(Result<(), SendError>) -> R,
{
  fn try_fire(&mut self) -> Option<R> {
    let item = self.item.take()?;
    let outcome = match self.sender.try_send(item) {
      Ok(()) => Ok(()),
      Err(TrySendError::Closed(_)) => Err(SendError::Closed),
      Err(TrySendError::Full(item)) => {
        self.item = Some(item);
        return None;
      }
    };
    self.handler.take().map(|handler| handler(outcome))
  }

  fn register(&self, parker: &Arc<Parker>) {
    self.sender.shared.register_observer(parker);
  }

  fn unregister(&self, parker: &Arc<Parker>) {
    self.sender.shared.unregister_observer(parker);
  }
}

/// A set of channel operations to wait on. See the [module docs](self).
pub struct Select<'a, R> {
  branches: Vec<Box<dyn Branch<R> + 'a>>,
  timeout: Option<(Duration, Box<dyn FnOnce() -> R + 'a>)>,
}

impl<R> fmt::Debug for Select<'_, R> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Select")
      .field("branches", &self.branches.len())
      .field("timeout", &self.timeout.as_ref().map(|(after, _)| after))
      .finish()
  }
}

impl<R> Default for Select<'_, R> {
  fn default() -> Self {
    Self::new()
  }
}

impl<'a, R> Select<'a, R> {
  pub fn new() -> Self {
    Select {
      branches: Vec::new(),
      timeout: None,
    }
  }

  /// Adds a receive branch. The continuation gets `Some(item)`, or `None` if
  /// the channel is closed and drained.
  pub fn recv<T, F>(mut self, receiver: &'a Receiver<T>, handler: F) -> Self
  where
    T: Send + 'a,
    F: FnOnce(Option<T>) -> R + 'a,
  {
    self.branches.push(Box::new(RecvBranch {
      receiver,
      handler: Some(handler),
    }));
    self
  }

  /// Adds a send branch. If another branch fires instead, `item` is dropped
  /// together with the `Select`.
  pub fn send<T, F>(mut self, sender: &'a Sender<T>, item: T, handler: F) -> Self
  where
    T: Send + 'a,
    F: FnOnce(Result<(), SendError>) -> R + 'a,
  {
    self.branches.push(Box::new(SendBranch {
      sender,
      item: Some(item),
      handler: Some(handler),
    }));
    self
  }

  /// Adds the timeout branch, replacing any earlier one. It runs if no other
  /// branch becomes ready within `after`.
  pub fn timeout<F>(mut self, after: Duration, handler: F) -> Self
  where
    F: FnOnce() -> R + 'a,
  {
    self.timeout = Some((after, Box::new(handler)));
    self
  }

  /// Fires one ready branch without blocking, or returns `None` if none is
  /// ready. The timeout branch is ignored.
  pub fn try_wait(mut self) -> Option<R> {
    self.fire_ready()
  }

  /// Blocks until one branch fires (or the timeout elapses) and returns the
  /// continuation's value.
  ///
  /// A `Select` without branches and without a timeout blocks forever, and so
  /// does one whose timeout is too far out to fall on a representable instant.
  pub fn wait(mut self) -> R {
    let mut timeout = self.timeout.take();
    let deadline = timeout
      .as_ref()
      .and_then(|(after, _)| backoff::deadline_after(*after));

    loop {
      // --- Phase 1: Fast path ---
      if let Some(value) = self.fire_ready() {
        return value;
      }

      // --- Phase 2: Register with every channel, then re-check ---
      let parker = Parker::new();
      for branch in &self.branches {
        branch.register(&parker);
      }
      let fired = self.fire_ready();

      // --- Phase 3: Wait for any channel to change ---
      if fired.is_none() {
        parker.wait_until(deadline);
      }
      for branch in &self.branches {
        branch.unregister(&parker);
      }
      if let Some(value) = fired {
        return value;
      }

      // --- Phase 4: Timeout ---
      if deadline.is_some_and(|d| Instant::now() >= d) {
        // A branch that became ready right at the deadline still wins.
        if let Some(value) = self.fire_ready() {
          return value;
        }
        if let Some((_, on_timeout)) = timeout.take() {
          return on_timeout();
        }
      }
    }
  }

  /// Tries the branches in a fresh random order and fires the first ready one.
  fn fire_ready(&mut self) -> Option<R> {
    let mut order: Vec<usize> = (0..self.branches.len()).collect();
    order.shuffle(&mut rand::rng());
    order
      .into_iter()
      .find_map(|index| self.branches[index].try_fire())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::channel;
  use std::thread;

  #[test]
  fn picks_the_only_ready_branch() {
    let (_tx_a, rx_a) = channel::bounded::<&str>(1);
    let (tx_b, rx_b) = channel::bounded::<&str>(1);
    tx_b.send("b").unwrap();

    let got = Select::new()
      .recv(&rx_a, |v| ("a", v))
      .recv(&rx_b, |v| ("b", v))
      .wait();
    assert_eq!(got, ("b", Some("b")));
  }

  #[test]
  fn huge_timeout_does_not_block_a_ready_branch() {
    let (tx, rx) = channel::bounded::<u8>(1);
    tx.send(3).unwrap();
    let got = Select::new()
      .recv(&rx, |v| v)
      .timeout(Duration::MAX, || None)
      .wait();
    assert_eq!(got, Some(3));

    let sender = thread::spawn(move || {
      thread::sleep(Duration::from_millis(20));
      tx.send(4).unwrap();
    });
    let got = Select::new()
      .recv(&rx, |v| v)
      .timeout(Duration::MAX, || None)
      .wait();
    assert_eq!(got, Some(4));
    sender.join().unwrap();
  }

  #[test]
  fn try_wait_returns_none_when_idle() {
    let (_tx, rx) = channel::bounded::<u8>(1);
    let fired = Select::new().recv(&rx, |_| ()).try_wait();
    assert!(fired.is_none());
  }

  #[test]
  fn wakes_when_a_channel_receives_later() {
    let (tx, rx) = channel::bounded::<u32>(1);
    let (_other_tx, other) = channel::bounded::<u32>(1);
    let sender = thread::spawn(move || {
      thread::sleep(Duration::from_millis(30));
      tx.send(42).unwrap();
    });

    let got = Select::new()
      .recv(&other, |_| None)
      .recv(&rx, |v| v)
      .timeout(Duration::from_secs(5), || None)
      .wait();
    assert_eq!(got, Some(42));
    sender.join().unwrap();
  }

  #[test]
  fn send_branch_fires_when_space_frees() {
    let (tx, rx) = channel::bounded::<u32>(1);
    tx.send(1).unwrap();
    let receiver = thread::spawn(move || {
      thread::sleep(Duration::from_millis(30));
      let first = rx.recv();
      let second = rx.recv();
      (first, second)
    });

    let sent = Select::new().send(&tx, 2, |res| res.is_ok()).wait();
    assert!(sent);
    drop(tx);
    assert_eq!(receiver.join().unwrap(), (Some(1), Some(2)));
  }

  #[test]
  fn observers_are_removed_after_wait() {
    let (tx, rx) = channel::bounded::<u8>(1);
    tx.send(1).unwrap();
    let _ = Select::new().recv(&rx, |v| v).wait();
    let _ = Select::new()
      .recv(&rx, |v| v)
      .timeout(Duration::from_millis(10), || None)
      .wait();
    assert!(rx.shared.state.lock().observers.is_empty());
  }
}
