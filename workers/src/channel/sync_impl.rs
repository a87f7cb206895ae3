//! Blocking send and receive, with optional deadlines.

use super::core::{SendWaiter, Shared};
use crate::error::{RecvTimeoutError, SendTimeoutError, TryRecvError, TrySendError};
use crate::internal::Parker;

use std::time::Instant;

#[inline]
fn expired(deadline: Option<Instant>) -> bool {
  deadline.is_some_and(|d| Instant::now() >= d)
}

/// The blocking send operation.
///
/// Tries a non-blocking send first. If the channel is full (or, for a
/// rendezvous channel, no receiver is parked), parks the current thread until
/// space appears, the item is taken, the channel closes, or `deadline` passes.
pub(crate) fn send_sync<T>(
  shared: &Shared<T>,
  item: T,
  deadline: Option<Instant>,
) -> Result<(), SendTimeoutError<T>> {
  let rendezvous = shared.is_rendezvous();
  let mut item = item;

  loop {
    // --- Phase 1: Attempt a non-blocking send ---
    match shared.try_send_core(item) {
      Ok(()) => return Ok(()),
      Err(TrySendError::Closed(returned)) => return Err(SendTimeoutError::Closed(returned)),
      Err(TrySendError::Full(returned)) => item = returned,
    }
    if expired(deadline) {
      return Err(SendTimeoutError::Timeout(item));
    }

    // --- Phase 2: Lock, re-check, and commit to parking ---
    let parker = Parker::new();
    let kept = {
      let mut state = shared.state.lock();
      if state.closed || state.receiver_count == 0 {
        return Err(SendTimeoutError::Closed(item));
      }
      if state.can_send(shared.capacity) {
        // State changed between the attempt and the lock.
        continue;
      }
      // A rendezvous sender parks with its item so a receiver can take it.
      let (slot, kept) = if rendezvous {
        (Some(item), None)
      } else {
        (None, Some(item))
      };
      state.park_sender(SendWaiter {
        parker: parker.clone(),
        item: slot,
      });
      kept
    };

    // --- Phase 3: Wait ---
    parker.wait_until(deadline);

    // --- Phase 4: Handle wake-up ---
    let (entry, closed) = {
      let mut state = shared.state.lock();
      let entry = state.take_sender(&parker);
      (entry, state.closed || state.receiver_count == 0)
    };
    let still_queued = entry.is_some();
    let recovered = match entry {
      // Popped by a receiver: for rendezvous that receiver now owns the item,
      // for buffered channels space was freed and we retry.
      None => kept,
      // Woken by close, by the last receiver leaving, or the deadline passed.
      Some(waiter) => waiter.item.or(kept),
    };
    item = match recovered {
      Some(returned) => returned,
      None => return Ok(()),
    };
    if still_queued {
      if closed {
        return Err(SendTimeoutError::Closed(item));
      }
      if expired(deadline) {
        return Err(SendTimeoutError::Timeout(item));
      }
    }
  }
}

/// The blocking receive operation.
///
/// Parks the current thread until an item is available, the channel is closed
/// and drained, or `deadline` passes. A woken receiver always retries the
/// buffer before giving up on a deadline, so an item handed to it is never
/// stranded.
pub(crate) fn recv_sync<T>(shared: &Shared<T>, deadline: Option<Instant>) -> Result<T, RecvTimeoutError> {
  loop {
    // --- Phase 1: Attempt a non-blocking receive ---
    match shared.try_recv_core() {
      Ok(item) => return Ok(item),
      Err(TryRecvError::Closed) => return Err(RecvTimeoutError::Closed),
      Err(TryRecvError::Empty) => {}
    }
    if expired(deadline) {
      return Err(RecvTimeoutError::Timeout);
    }

    // --- Phase 2: Lock, re-check, and commit to parking ---
    let parker = Parker::new();
    {
      let mut state = shared.state.lock();
      if state.can_recv(shared.capacity) {
        continue;
      }
      if state.closed {
        return Err(RecvTimeoutError::Closed);
      }
      state.park_receiver(parker.clone());
    }

    // --- Phase 3: Wait ---
    parker.wait_until(deadline);

    // --- Phase 4: Handle wake-up ---
    // Being woken means an item is likely available. Loop to the top.
    shared.state.lock().forget_receiver(&parker);
  }
}
