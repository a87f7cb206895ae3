//! Cooperative stop signaling built on a closed channel.
//!
//! A [`Shutdown`] owns the sending side of a zero-capacity unit channel that
//! never carries a value. [`Shutdown::signal_stop`] closes it, and a close is
//! observed by every receiver, each exactly once per wait, which a single sent
//! value could never do.
//!
//! Workers hold a [`StopListener`] (the receiving side) and include it in
//! their [`Select`](crate::Select) so that an idle worker wakes as soon as the
//! stop is signaled. A busy worker polls [`StopListener::is_stopped`] between
//! units of work.
//!
//! Dropping the last `Shutdown` clone also signals stop.

use crate::channel::{self, Receiver, Sender};
use crate::error::{CloseError, RecvTimeoutError};

use std::time::Duration;

/// The signaling side. Clone it to share the right to stop.
#[derive(Debug, Clone)]
pub struct Shutdown {
  sender: Sender<()>,
  listener: StopListener,
}

/// The observing side. Cheap to clone, one per worker.
#[derive(Debug, Clone)]
pub struct StopListener {
  receiver: Receiver<()>,
}

impl Shutdown {
  pub fn new() -> Self {
    let (sender, receiver) = channel::rendezvous();
    Shutdown {
      sender,
      listener: StopListener { receiver },
    }
  }

  /// Tells every listener to stop.
  ///
  /// # Errors
  ///
  /// Returns `Err(CloseError)` if stop was already signaled.
  pub fn signal_stop(&self) -> Result<(), CloseError> {
    self.sender.close()?;
    tracing::debug!("stop signaled");
    Ok(())
  }

  pub fn is_stopped(&self) -> bool {
    self.listener.is_stopped()
  }

  /// Creates a new listener for a worker.
  pub fn listener(&self) -> StopListener {
    self.listener.clone()
  }

  /// The underlying channel, for use as a [`Select`](crate::Select) branch.
  pub fn receiver(&self) -> &Receiver<()> {
    self.listener.receiver()
  }
}

impl Default for Shutdown {
  fn default() -> Self {
    Self::new()
  }
}

impl StopListener {
  /// Non-blocking check.
  pub fn is_stopped(&self) -> bool {
    self.receiver.is_closed()
  }

  /// Blocks until stop is signaled.
  pub fn wait(&self) {
    // Nothing is ever sent, so this only returns on close.
    let _ = self.receiver.recv();
  }

  /// Blocks for at most `timeout`. Returns `true` if stop was signaled.
  pub fn wait_timeout(&self, timeout: Duration) -> bool {
    matches!(self.receiver.recv_timeout(timeout), Err(RecvTimeoutError::Closed))
  }

  /// The underlying channel, for use as a [`Select`](crate::Select) branch.
  /// It becomes ready (with `None`) once stop is signaled.
  pub fn receiver(&self) -> &Receiver<()> {
    &self.receiver
  }
}
