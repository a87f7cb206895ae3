//! Iterating over a channel until it is closed and drained.

use super::Receiver;

/// Blocking iterator returned by [`Receiver::iter`].
#[derive(Debug)]
pub struct Iter<'a, T> {
  pub(super) receiver: &'a Receiver<T>,
}

impl<T: Send> Iterator for Iter<'_, T> {
  type Item = T;

  fn next(&mut self) -> Option<T> {
    self.receiver.recv()
  }
}

/// Non-blocking iterator returned by [`Receiver::try_iter`]. Stops at the
/// first moment nothing is buffered, even if the channel is still open.
#[derive(Debug)]
pub struct TryIter<'a, T> {
  pub(super) receiver: &'a Receiver<T>,
}

impl<T: Send> Iterator for TryIter<'_, T> {
  type Item = T;

  fn next(&mut self) -> Option<T> {
    self.receiver.try_recv().ok()
  }
}

/// Owning blocking iterator, from `Receiver`'s `IntoIterator` impl.
#[derive(Debug)]
pub struct IntoIter<T> {
  receiver: Receiver<T>,
}

impl<T: Send> Iterator for IntoIter<T> {
  type Item = T;

  fn next(&mut self) -> Option<T> {
    self.receiver.recv()
  }
}

impl<T: Send> IntoIterator for Receiver<T> {
  type Item = T;
  type IntoIter = IntoIter<T>;

  fn into_iter(self) -> IntoIter<T> {
    IntoIter { receiver: self }
  }
}

impl<'a, T: Send> IntoIterator for &'a Receiver<T> {
  type Item = T;
  type IntoIter = Iter<'a, T>;

  fn into_iter(self) -> Iter<'a, T> {
    self.iter()
  }
}
