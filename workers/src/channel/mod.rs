// src/channel/mod.rs

//! A bounded, lock-based MPMC channel with an explicit, one-way close.
//!
//! Every channel has a fixed capacity `C`. `send` blocks while `C` items are
//! buffered; with `C == 0` (a "rendezvous" channel) `send` blocks until a
//! receiver takes the item. Items are received in the order their sends
//! completed.
//!
//! ### Lifecycle
//!
//! A channel is **open** until [`Sender::close`] is called (or the last
//! `Sender` is dropped). Closing is irreversible: a second `close` fails with
//! [`CloseError`], and every later `send` fails with [`SendError::Closed`].
//! Items buffered before the close stay receivable; once they are drained,
//! [`Receiver::recv`] returns `None` forever.
//!
//! Both handles are `Clone`. Any number of threads may send and receive on
//! the same channel; each item is delivered to exactly one receiver.

use crate::error::{CloseError, RecvTimeoutError, SendError, SendTimeoutError, TryRecvError, TrySendError};
use crate::internal::backoff;

mod core;
mod iter;
mod sync_impl;

pub use iter::{IntoIter, Iter, TryIter};

pub(crate) use self::core::Shared;
use std::sync::Arc;
use std::time::Duration;

/// The sending half of a channel. Cloning creates another producer.
#[derive(Debug)]
pub struct Sender<T> {
  pub(crate) shared: Arc<Shared<T>>,
}

/// The receiving half of a channel. Cloning creates another consumer that
/// competes for the same items.
#[derive(Debug)]
pub struct Receiver<T> {
  pub(crate) shared: Arc<Shared<T>>,
}

// --- Constructors ---

/// Creates a channel that buffers at most `capacity` items.
///
/// With `capacity == 0` every send is a direct handoff: it completes only
/// once a receiver takes the item.
pub fn bounded<T: Send>(capacity: usize) -> (Sender<T>, Receiver<T>) {
  let shared = Arc::new(Shared::new(capacity));
  (
    Sender {
      shared: Arc::clone(&shared),
    },
    Receiver { shared },
  )
}

/// Creates a zero-capacity channel. Shorthand for `bounded(0)`.
pub fn rendezvous<T: Send>() -> (Sender<T>, Receiver<T>) {
  bounded(0)
}

/// Creates an "unbounded" channel.
///
/// In reality, the channel is bounded by available memory, so producers never
/// feel backpressure.
pub fn unbounded<T: Send>() -> (Sender<T>, Receiver<T>) {
  bounded(usize::MAX)
}

impl<T> Clone for Sender<T> {
  fn clone(&self) -> Self {
    self.shared.add_sender();
    Sender {
      shared: Arc::clone(&self.shared),
    }
  }
}

impl<T> Clone for Receiver<T> {
  fn clone(&self) -> Self {
    self.shared.add_receiver();
    Receiver {
      shared: Arc::clone(&self.shared),
    }
  }
}

fn capacity_of<T>(shared: &Shared<T>) -> Option<usize> {
  if shared.capacity == usize::MAX {
    None
  } else {
    Some(shared.capacity)
  }
}

fn is_full<T>(shared: &Shared<T>) -> bool {
  match capacity_of(shared) {
    None => false,
    Some(capacity) => shared.len() >= capacity,
  }
}

impl<T: Send> Sender<T> {
  /// Sends a value into the channel, blocking the current thread until the
  /// value is buffered (or taken, for rendezvous channels).
  ///
  /// # Errors
  ///
  /// Returns `Err(SendError::Closed)` if the channel is closed before or while
  /// waiting, or if every receiver has been dropped. The value is dropped.
  pub fn send(&self, item: T) -> Result<(), SendError> {
    match sync_impl::send_sync(&self.shared, item, None) {
      Ok(()) => Ok(()),
      Err(SendTimeoutError::Closed(_)) => Err(SendError::Closed),
      Err(SendTimeoutError::Timeout(_)) => unreachable!("a send without a deadline cannot time out"),
    }
  }

  /// Sends only if that can happen right now; the item comes back otherwise.
  pub fn try_send(&self, item: T) -> Result<(), TrySendError<T>> {
    self.shared.try_send_core(item)
  }

  /// Sends a value, blocking for at most `timeout`.
  ///
  /// # Errors
  ///
  /// - `Err(SendTimeoutError::Timeout(item))` if no space appeared in time.
  /// - `Err(SendTimeoutError::Closed(item))` if the channel is closed.
  pub fn send_timeout(&self, item: T, timeout: Duration) -> Result<(), SendTimeoutError<T>> {
    sync_impl::send_sync(&self.shared, item, backoff::deadline_after(timeout))
  }

  /// Closes the channel for every handle.
  ///
  /// Blocked senders wake up and fail. Blocked receivers wake up, drain what
  /// is buffered, then observe the closed state.
  ///
  /// # Errors
  ///
  /// Returns `Err(CloseError)` if the channel was already closed.
  pub fn close(&self) -> Result<(), CloseError> {
    let result = self.shared.close();
    if result.is_err() {
      tracing::warn!(capacity = ?self.capacity(), "close called on an already closed channel");
    }
    result
  }

  /// Returns `true` once the channel has been closed.
  pub fn is_closed(&self) -> bool {
    self.shared.is_closed()
  }

  /// `None` for channels made with [`unbounded`].
  pub fn capacity(&self) -> Option<usize> {
    capacity_of(&self.shared)
  }

  /// Items buffered right now. Always `0` between handoffs on a rendezvous
  /// channel.
  #[inline]
  pub fn len(&self) -> usize {
    self.shared.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Never `true` for an unbounded channel.
  #[inline]
  pub fn is_full(&self) -> bool {
    is_full(&self.shared)
  }
}

impl<T> Drop for Sender<T> {
  fn drop(&mut self) {
    self.shared.release_sender();
  }
}

impl<T: Send> Receiver<T> {
  /// Blocks until an item arrives.
  ///
  /// Returns `None` once the channel is closed and drained. This is the
  /// terminal signal, not an error: every later call returns `None` as well.
  pub fn recv(&self) -> Option<T> {
    sync_impl::recv_sync(&self.shared, None).ok()
  }

  /// Takes an item only if one is ready.
  ///
  /// `TryRecvError::Empty` means nothing is available yet;
  /// `TryRecvError::Closed` means nothing ever will be.
  pub fn try_recv(&self) -> Result<T, TryRecvError> {
    self.shared.try_recv_core()
  }

  /// Receives a value from the channel, blocking for at most `timeout`.
  ///
  /// # Errors
  ///
  /// - `Err(RecvTimeoutError::Timeout)` if the timeout is reached.
  /// - `Err(RecvTimeoutError::Closed)` if the channel is closed and drained.
  pub fn recv_timeout(&self, timeout: Duration) -> Result<T, RecvTimeoutError> {
    sync_impl::recv_sync(&self.shared, backoff::deadline_after(timeout))
  }

  /// A blocking iterator that ends once the channel is closed and drained.
  pub fn iter(&self) -> Iter<'_, T> {
    Iter { receiver: self }
  }

  /// A non-blocking iterator over whatever is available right now.
  pub fn try_iter(&self) -> TryIter<'_, T> {
    TryIter { receiver: self }
  }

  /// Returns `true` once the channel has been closed. Buffered items may
  /// still be waiting to be received.
  pub fn is_closed(&self) -> bool {
    self.shared.is_closed()
  }

  /// `None` for channels made with [`unbounded`].
  pub fn capacity(&self) -> Option<usize> {
    capacity_of(&self.shared)
  }

  #[inline]
  pub fn len(&self) -> usize {
    self.shared.len()
  }

  #[inline]
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  #[inline]
  pub fn is_full(&self) -> bool {
    is_full(&self.shared)
  }
}

impl<T> Drop for Receiver<T> {
  fn drop(&mut self) {
    self.shared.release_receiver();
  }
}
