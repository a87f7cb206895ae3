// src/error.rs

use core::fmt;

use thiserror::Error;

// Generates `into_inner`, `Display` and `Error` for error enums whose every
// variant hands the rejected item back to the caller.
macro_rules! impl_error_for_enum_with_inner {
    (
        $enum_name:ident < $generic_param:ident >,
        $($variant:ident ( $message:expr ) ),+
        $(,)?
    ) => {
        impl<$generic_param> $enum_name<$generic_param> {
            /// Consumes the error, returning the item that could not be sent.
            #[inline]
            pub fn into_inner(self) -> $generic_param {
                match self {
                    $( $enum_name::$variant(v) => v, )+
                }
            }
        }

        impl<$generic_param> fmt::Display for $enum_name<$generic_param> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $( $enum_name::$variant(_) => f.write_str($message), )+
                }
            }
        }

        impl<$generic_param> fmt::Debug for $enum_name<$generic_param> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $( $enum_name::$variant(_) => write!(f, concat!(stringify!($enum_name), "::", stringify!($variant), "(..)")), )+
                }
            }
        }

        impl<$generic_param> std::error::Error for $enum_name<$generic_param> {}
    };
}

// --- Channel protocol errors ---

/// Error returned by `try_send` when the item could not be placed right away.
/// The item is handed back.
#[derive(PartialEq, Eq, Clone)]
pub enum TrySendError<T> {
  /// The buffer is full, or for a rendezvous channel no receiver is waiting.
  Full(T),
  /// The channel was closed, or every receiver has been dropped.
  Closed(T),
}

impl_error_for_enum_with_inner!(
  TrySendError<T>,
  Full("channel full"),
  Closed("channel closed"),
);

/// Error returned by `send_timeout`. The item is handed back.
#[derive(PartialEq, Eq, Clone)]
pub enum SendTimeoutError<T> {
  /// No buffer space (or waiting receiver) appeared before the deadline.
  Timeout(T),
  /// The channel was closed before the item could be sent.
  Closed(T),
}

impl_error_for_enum_with_inner!(
  SendTimeoutError<T>,
  Timeout("send operation timed out"),
  Closed("channel closed"),
);

/// Error returned by blocking `send` operations.
///
/// Sending after `close()` is always a caller bug and is never retried.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SendError {
  Closed,
}
impl std::error::Error for SendError {}
impl fmt::Display for SendError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      SendError::Closed => write!(f, "send on closed channel"),
    }
  }
}

/// Error returned by `try_recv` when no item could be taken immediately.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TryRecvError {
  /// Nothing is buffered right now, but the channel is still open.
  Empty,
  /// The channel is closed and every buffered item has been received.
  Closed,
}
impl std::error::Error for TryRecvError {}
impl fmt::Display for TryRecvError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TryRecvError::Empty => write!(f, "channel empty"),
      TryRecvError::Closed => write!(f, "channel closed and drained"),
    }
  }
}

/// Error returned by `recv_timeout`.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RecvTimeoutError {
  /// Nothing arrived before the deadline.
  Timeout,
  /// The channel is closed and every buffered item has been received.
  Closed,
}
impl std::error::Error for RecvTimeoutError {}
impl fmt::Display for RecvTimeoutError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      RecvTimeoutError::Timeout => write!(f, "receive operation timed out"),
      RecvTimeoutError::Closed => write!(f, "channel closed and drained"),
    }
  }
}

/// A channel can only be closed once.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct CloseError;
impl std::error::Error for CloseError {}
impl fmt::Display for CloseError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "channel is already closed")
  }
}

// --- Job and pool errors ---

/// Returned by [`WorkerContext::checkpoint`](crate::pool::WorkerContext::checkpoint)
/// once the shutdown signal has fired.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
#[error("job cancelled by shutdown signal")]
pub struct Cancelled;

/// Why a job did not produce a value. Travels inside a
/// [`JobResult`](crate::pool::JobResult), never across the channel boundary.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum TaskError<E> {
  /// The worker was stopped before the job completed. The consumer may
  /// resubmit it.
  #[error("job cancelled by shutdown signal")]
  Cancelled,
  /// The work function returned an error.
  #[error("job processing failed: {0}")]
  Processing(E),
}

impl<E> TaskError<E> {
  pub fn is_cancelled(&self) -> bool {
    matches!(self, TaskError::Cancelled)
  }

  /// The work function's error, if this is a processing failure.
  pub fn processing(&self) -> Option<&E> {
    match self {
      TaskError::Processing(e) => Some(e),
      TaskError::Cancelled => None,
    }
  }
}

impl<E> From<Cancelled> for TaskError<E> {
  fn from(_: Cancelled) -> Self {
    TaskError::Cancelled
  }
}

/// The main error type for pool construction, joining and configuration.
#[derive(Debug, Error)]
pub enum PoolError {
  #[error("worker pool requires at least one worker")]
  NoWorkers,

  #[error("failed to spawn thread '{name}': {source}")]
  Spawn {
    name: String,
    #[source]
    source: std::io::Error,
  },

  #[error("worker {worker} panicked: {message}")]
  WorkerPanicked { worker: usize, message: String },

  #[error("Configuration file not found: {0}")]
  ConfigNotFound(String),

  #[error("Failed to read configuration file: {0}")]
  ConfigRead(#[from] std::io::Error),

  #[error("Failed to parse configuration: {0}")]
  ConfigParse(String),

  #[error("Invalid configuration value for '{field}': {message}")]
  InvalidConfigValue { field: String, message: String },
}

/// A specialized `Result` type for pool operations.
pub type Result<T, E = PoolError> = std::result::Result<T, E>;

/// Returned by [`collect_exact`](crate::fan_in::collect_exact) when the
/// channel closed before the expected number of items arrived. The items that
/// did arrive are handed back.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("channel closed after {} of {expected} expected items", .items.len())]
pub struct Incomplete<T> {
  pub expected: usize,
  pub items: Vec<T>,
}
