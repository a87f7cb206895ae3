// src/channel/core.rs

//! The shared state behind every `Sender`/`Receiver` pair.
//!
//! ### Design Principles:
//!
//! 1.  **Central Mutex**: A `parking_lot::Mutex` guards the buffer, the waiter
//!     queues and the closed flag. Nothing outside this module touches them.
//! 2.  **Rendezvous via the sender's waiter**: On a zero-capacity channel a
//!     blocked sender parks with its item inside its queue entry. A receiver
//!     takes the item straight out of that entry. A sender that finds a
//!     receiver already parked hands the item over through the queue and
//!     wakes exactly that receiver.
//! 3.  **Self-removal**: Every thread that parks removes its own queue entry
//!     (matched by pointer) once it wakes, whatever woke it. A missing entry
//!     means another thread popped it, which for a rendezvous sender means
//!     its item was taken.
//! 4.  **Observers**: Select-sets register one parker with every channel they
//!     watch. Any state change notifies all observers; the selector then
//!     re-polls its branches.

use crate::error::{CloseError, TryRecvError, TrySendError};
use crate::internal::parker::{self, Parker};

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::mem;
use std::sync::Arc;

/// A parked sender. `item` is only populated on rendezvous channels.
#[derive(Debug)]
pub(crate) struct SendWaiter<T> {
  pub(crate) parker: Arc<Parker>,
  pub(crate) item: Option<T>,
}

#[derive(Debug)]
pub(crate) struct ChannelState<T> {
  /// Buffered items. On rendezvous channels this only ever holds items that
  /// were handed to an already parked receiver.
  pub(crate) queue: VecDeque<T>,
  pub(crate) waiting_senders: VecDeque<SendWaiter<T>>,
  pub(crate) waiting_receivers: VecDeque<Arc<Parker>>,
  /// Parkers of select-sets currently watching this channel.
  pub(crate) observers: Vec<Arc<Parker>>,
  pub(crate) sender_count: usize,
  pub(crate) receiver_count: usize,
  pub(crate) closed: bool,
}

impl<T> ChannelState<T> {
  fn notify_observers(&self) {
    for observer in &self.observers {
      observer.notify();
    }
  }

  /// Removes and returns this sender's entry if nobody popped it yet.
  pub(crate) fn take_sender(&mut self, parker: &Arc<Parker>) -> Option<SendWaiter<T>> {
    let position = self
      .waiting_senders
      .iter()
      .position(|w| parker::same(&w.parker, parker))?;
    self.waiting_senders.remove(position)
  }

  /// Removes this receiver's entry if nobody popped it yet.
  pub(crate) fn forget_receiver(&mut self, parker: &Arc<Parker>) {
    self.waiting_receivers.retain(|p| !parker::same(p, parker));
  }

  /// Whether a send could complete right now.
  pub(crate) fn can_send(&self, capacity: usize) -> bool {
    if capacity == 0 {
      !self.waiting_receivers.is_empty()
    } else {
      self.queue.len() < capacity
    }
  }

  /// Whether a receive could complete right now.
  pub(crate) fn can_recv(&self, capacity: usize) -> bool {
    !self.queue.is_empty() || (capacity == 0 && !self.closed && !self.waiting_senders.is_empty())
  }

  /// Enqueues a sender about to park. Observers are told, since a
  /// rendezvous item is now available to them.
  pub(crate) fn park_sender(&mut self, waiter: SendWaiter<T>) {
    self.waiting_senders.push_back(waiter);
    self.notify_observers();
  }

  /// Enqueues a receiver about to park. Observers are told, since a
  /// rendezvous send can now complete.
  pub(crate) fn park_receiver(&mut self, parker: Arc<Parker>) {
    self.waiting_receivers.push_back(parker);
    self.notify_observers();
  }
}

/// The shared owner of the channel's state, designed to be wrapped in an `Arc`.
#[derive(Debug)]
pub(crate) struct Shared<T> {
  pub(crate) state: Mutex<ChannelState<T>>,
  pub(crate) capacity: usize,
}

impl<T> Shared<T> {
  /// Creates a new shared core with a given capacity.
  /// `usize::MAX` is used to signify an "unbounded" channel.
  pub(crate) fn new(capacity: usize) -> Self {
    Shared {
      state: Mutex::new(ChannelState {
        queue: VecDeque::with_capacity(if capacity == usize::MAX { 32 } else { capacity }),
        waiting_senders: VecDeque::new(),
        waiting_receivers: VecDeque::new(),
        observers: Vec::new(),
        sender_count: 1,
        receiver_count: 1,
        closed: false,
      }),
      capacity,
    }
  }

  #[inline]
  pub(crate) fn is_rendezvous(&self) -> bool {
    self.capacity == 0
  }

  /// The core logic for attempting to send an item.
  ///
  /// Buffered channels push when there is room and wake one parked receiver.
  /// Rendezvous channels only succeed when a receiver is already parked.
  pub(crate) fn try_send_core(&self, item: T) -> Result<(), TrySendError<T>> {
    let mut state = self.state.lock();

    if state.closed || state.receiver_count == 0 {
      return Err(TrySendError::Closed(item));
    }

    if !state.can_send(self.capacity) {
      return Err(TrySendError::Full(item));
    }

    state.queue.push_back(item);
    if let Some(receiver) = state.waiting_receivers.pop_front() {
      receiver.notify();
    }
    state.notify_observers();
    Ok(())
  }

  /// The core logic for attempting to receive an item. This will try, in order:
  /// 1. Take an item from the buffer, waking one parked sender if space freed up.
  /// 2. Take the item of a parked rendezvous sender, unless the channel is closed.
  /// 3. Report `Closed` if the channel is closed, `Empty` otherwise.
  pub(crate) fn try_recv_core(&self) -> Result<T, TryRecvError> {
    let mut state = self.state.lock();

    if let Some(item) = state.queue.pop_front() {
      if !self.is_rendezvous() {
        if let Some(sender) = state.waiting_senders.pop_front() {
          sender.parker.notify();
        }
      }
      state.notify_observers();
      return Ok(item);
    }

    // Senders blocked on a closed channel are about to fail, so their items
    // must not be delivered.
    if self.is_rendezvous() && !state.closed {
      if let Some(mut sender) = state.waiting_senders.pop_front() {
        if let Some(item) = sender.item.take() {
          sender.parker.notify();
          state.notify_observers();
          return Ok(item);
        }
      }
    }

    if state.closed {
      return Err(TryRecvError::Closed);
    }
    Err(TryRecvError::Empty)
  }

  /// Marks the channel closed and wakes every parked thread and observer.
  pub(crate) fn close(&self) -> Result<(), CloseError> {
    let mut state = self.state.lock();
    if state.closed {
      return Err(CloseError);
    }
    self.close_locked(&mut state);
    Ok(())
  }

  fn close_locked(&self, state: &mut ChannelState<T>) {
    state.closed = true;
    // Receivers are popped: they will only drain the buffer from here on.
    for receiver in mem::take(&mut state.waiting_receivers) {
      receiver.notify();
    }
    // Senders stay queued and remove themselves, taking their item back.
    for sender in &state.waiting_senders {
      sender.parker.notify();
    }
    state.notify_observers();
  }

  pub(crate) fn add_sender(&self) {
    self.state.lock().sender_count += 1;
  }

  pub(crate) fn add_receiver(&self) {
    self.state.lock().receiver_count += 1;
  }

  /// Drops one sender handle. The last one closes the channel unless it was
  /// closed explicitly already.
  pub(crate) fn release_sender(&self) {
    let mut state = self.state.lock();
    state.sender_count -= 1;
    if state.sender_count == 0 && !state.closed {
      self.close_locked(&mut state);
    }
  }

  /// Drops one receiver handle. Once none are left every parked sender is
  /// woken so it can fail.
  pub(crate) fn release_receiver(&self) {
    let mut state = self.state.lock();
    state.receiver_count -= 1;
    if state.receiver_count == 0 {
      for sender in &state.waiting_senders {
        sender.parker.notify();
      }
      state.notify_observers();
    }
  }

  pub(crate) fn register_observer(&self, parker: &Arc<Parker>) {
    self.state.lock().observers.push(Arc::clone(parker));
  }

  pub(crate) fn unregister_observer(&self, parker: &Arc<Parker>) {
    self
      .state
      .lock()
      .observers
      .retain(|p| !parker::same(p, parker));
  }

  pub(crate) fn len(&self) -> usize {
    self.state.lock().queue.len()
  }

  pub(crate) fn is_closed(&self) -> bool {
    self.state.lock().closed
  }
}
