// src/config/processed.rs
use crate::config::raw::{PoolConfigRaw, RetryPolicyRaw};
use crate::error::{PoolError, Result};

use std::time::Duration;

/// What a worker does when the work function fails.
///
/// There is deliberately no `Default`: whether a failed job is worth running
/// again depends entirely on the work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
  /// Report the failure in the job's result right away.
  Never,
  /// Run the job again on the same worker, up to `max_attempts` runs in
  /// total, pausing `backoff` in between. The pause ends early if stop is
  /// signaled, and the job is then reported as cancelled.
  Attempts { max_attempts: u32, backoff: Duration },
}

impl RetryPolicy {
  /// Total number of runs a job gets, including the first.
  pub fn max_attempts(&self) -> u32 {
    match self {
      RetryPolicy::Never => 1,
      RetryPolicy::Attempts { max_attempts, .. } => *max_attempts,
    }
  }

  pub fn backoff(&self) -> Duration {
    match self {
      RetryPolicy::Never => Duration::ZERO,
      RetryPolicy::Attempts { backoff, .. } => *backoff,
    }
  }
}

/// Validated pool configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
  /// Prefix for worker thread names and the `pool` field of log events.
  pub name: String,
  pub workers: usize,
  /// Capacity for the job channel built by [`PoolConfig::channels`].
  pub input_capacity: usize,
  /// Capacity for the result channel built by [`PoolConfig::channels`].
  pub output_capacity: usize,
  /// Close the output channel once the last worker exits, so consumers can
  /// read until closed instead of counting.
  pub close_output_on_exit: bool,
  pub retry: RetryPolicy,
}

impl PoolConfig {
  /// A configuration with default name and capacities.
  pub fn new(workers: usize, retry: RetryPolicy) -> Self {
    PoolConfig {
      name: "worker-pool".to_string(),
      workers,
      input_capacity: 64,
      output_capacity: 64,
      close_output_on_exit: true,
      retry,
    }
  }
}

pub fn process_raw_config(raw: PoolConfigRaw) -> Result<PoolConfig> {
  if raw.workers == 0 {
    return Err(PoolError::InvalidConfigValue {
      field: "workers".to_string(),
      message: "A pool needs at least one worker.".to_string(),
    });
  }
  if raw.name.trim().is_empty() {
    return Err(PoolError::InvalidConfigValue {
      field: "name".to_string(),
      message: "Pool name cannot be empty.".to_string(),
    });
  }

  let retry = match raw.retry {
    RetryPolicyRaw::Never => RetryPolicy::Never,
    RetryPolicyRaw::Attempts { max_attempts, backoff } => {
      if max_attempts == 0 {
        return Err(PoolError::InvalidConfigValue {
          field: "retry.max_attempts".to_string(),
          message: "Must be at least 1 (the first run counts).".to_string(),
        });
      }
      let backoff = match backoff {
        Some(text) => humantime::parse_duration(&text).map_err(|e| PoolError::InvalidConfigValue {
          field: "retry.backoff".to_string(),
          message: format!("'{}' is not a duration: {}", text, e),
        })?,
        None => Duration::ZERO,
      };
      RetryPolicy::Attempts { max_attempts, backoff }
    }
  };

  Ok(PoolConfig {
    name: raw.name,
    workers: raw.workers,
    input_capacity: raw.input_capacity,
    output_capacity: raw.output_capacity,
    close_output_on_exit: raw.close_output_on_exit,
    retry,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn raw(workers: usize, retry: RetryPolicyRaw) -> PoolConfigRaw {
    PoolConfigRaw {
      name: "test".to_string(),
      workers,
      input_capacity: 8,
      output_capacity: 8,
      close_output_on_exit: true,
      retry,
    }
  }

  #[test]
  fn zero_workers_is_rejected() {
    let result = process_raw_config(raw(0, RetryPolicyRaw::Never));
    if let Err(PoolError::InvalidConfigValue { field, .. }) = result {
      assert_eq!(field, "workers");
    } else {
      panic!("Expected InvalidConfigValue error for zero workers");
    }
  }

  #[test]
  fn zero_attempts_is_rejected() {
    let result = process_raw_config(raw(
      2,
      RetryPolicyRaw::Attempts {
        max_attempts: 0,
        backoff: None,
      },
    ));
    assert!(matches!(
      result,
      Err(PoolError::InvalidConfigValue { ref field, .. }) if field == "retry.max_attempts"
    ));
  }

  #[test]
  fn backoff_is_parsed_from_human_text() {
    let config = process_raw_config(raw(
      2,
      RetryPolicyRaw::Attempts {
        max_attempts: 3,
        backoff: Some("250ms".to_string()),
      },
    ))
    .unwrap();
    assert_eq!(
      config.retry,
      RetryPolicy::Attempts {
        max_attempts: 3,
        backoff: Duration::from_millis(250)
      }
    );
    assert_eq!(config.retry.max_attempts(), 3);
  }

  #[test]
  fn bad_backoff_is_rejected() {
    let result = process_raw_config(raw(
      1,
      RetryPolicyRaw::Attempts {
        max_attempts: 2,
        backoff: Some("soon".to_string()),
      },
    ));
    assert!(matches!(
      result,
      Err(PoolError::InvalidConfigValue { ref field, .. }) if field == "retry.backoff"
    ));
  }

  #[test]
  fn never_means_a_single_attempt() {
    assert_eq!(RetryPolicy::Never.max_attempts(), 1);
    assert_eq!(RetryPolicy::Never.backoff(), Duration::ZERO);
  }
}
