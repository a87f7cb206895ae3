//! Bounded sync channels with select, cooperative shutdown and worker pools.
//!
//! The building block is a lock-based MPMC [`channel`] with a fixed capacity
//! and an explicit, one-way close. On top of it sit:
//! - [`Select`], waiting on several channel operations at once with an
//!   optional timeout,
//! - [`Shutdown`], a stop signal that is observed by closing a channel,
//! - [`WorkerPool`], N threads sharing one job channel (fan-out) and one
//!   result channel (fan-in), with per-job error reporting and retries,
//! - [`fan_in`] helpers to merge channels and collect results.
//!
//! Everything runs on OS threads; nothing here needs an async runtime.

pub mod channel;
pub mod config;
pub mod coord;
pub mod error;
pub mod fan_in;
pub mod pool;
pub mod select;
pub mod shutdown;

// Internal utilities - not part of public API
mod internal;

pub use config::{PoolConfig, RetryPolicy};
pub use coord::WaitGroup;
pub use error::{
  Cancelled, CloseError, Incomplete, PoolError, RecvTimeoutError, SendError, SendTimeoutError, TaskError, TryRecvError,
  TrySendError,
};
pub use fan_in::{collect_all, collect_exact, merge, BatchReport};
pub use pool::{
  Job, JobCounts, JobId, JobResult, PoolBuilder, PoolReport, Submitter, WorkerContext, WorkerExit, WorkerPool,
};
pub use select::Select;
pub use shutdown::{Shutdown, StopListener};
