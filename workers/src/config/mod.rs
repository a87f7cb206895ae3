// src/config/mod.rs
// Pool configuration: YAML parsing and validation.

pub mod processed; // Validated configuration handed to the pool
pub mod raw; // Structs directly mapping to the YAML structure

pub use processed::{PoolConfig, RetryPolicy};

use crate::channel::{self, Receiver, Sender};
use crate::error::{PoolError, Result};
use crate::pool::{Job, JobResult};
use raw::PoolConfigRaw;

use std::fs::File;
use std::io;
use std::path::Path;

impl PoolConfig {
  /// Parses and validates a YAML document.
  ///
  /// ```
  /// use fibre_workers::{PoolConfig, RetryPolicy};
  ///
  /// let config = PoolConfig::from_yaml_str("
  /// workers: 3
  /// retry:
  ///   kind: never
  /// ").unwrap();
  /// assert_eq!(config.workers, 3);
  /// assert_eq!(config.retry, RetryPolicy::Never);
  /// ```
  pub fn from_yaml_str(yaml: &str) -> Result<Self> {
    let raw: PoolConfigRaw = serde_yaml::from_str(yaml).map_err(|e| PoolError::ConfigParse(e.to_string()))?;
    processed::process_raw_config(raw)
  }

  /// Reads, parses and validates a YAML file.
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    if !path.is_file() {
      return Err(PoolError::ConfigNotFound(path.display().to_string()));
    }
    let reader = io::BufReader::new(File::open(path)?);
    let raw: PoolConfigRaw = serde_yaml::from_reader(reader).map_err(|e| PoolError::ConfigParse(e.to_string()))?;
    let config = processed::process_raw_config(raw)?;
    tracing::debug!(path = %path.display(), pool = %config.name, workers = config.workers, "loaded pool config");
    Ok(config)
  }

  /// Builds a job channel and a result channel with the configured capacities.
  #[allow(clippy::type_complexity)]
  pub fn channels<P, R, E>(
    &self,
  ) -> (
    (Sender<Job<P>>, Receiver<Job<P>>),
    (Sender<JobResult<P, R, E>>, Receiver<JobResult<P, R, E>>),
  )
  where
    P: Send,
    R: Send,
    E: Send,
  {
    (
      channel::bounded(self.input_capacity),
      channel::bounded(self.output_capacity),
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;
  use std::io::Write;
  use std::time::Duration;

  #[test]
  fn full_document_parses() {
    let config = PoolConfig::from_yaml_str(
      r#"
name: thumbnails
workers: 4
input_capacity: 16
output_capacity: 32
close_output_on_exit: false
retry:
  kind: attempts
  max_attempts: 3
  backoff: 10ms
"#,
    )
    .unwrap();

    assert_eq!(
      config,
      PoolConfig {
        name: "thumbnails".to_string(),
        workers: 4,
        input_capacity: 16,
        output_capacity: 32,
        close_output_on_exit: false,
        retry: RetryPolicy::Attempts {
          max_attempts: 3,
          backoff: Duration::from_millis(10),
        },
      }
    );
  }

  #[test]
  fn defaults_fill_optional_fields() {
    let config = PoolConfig::from_yaml_str("workers: 2\nretry:\n  kind: never\n").unwrap();
    assert_eq!(config, PoolConfig::new(2, RetryPolicy::Never));
  }

  #[test]
  fn retry_is_required() {
    let result = PoolConfig::from_yaml_str("workers: 2\n");
    assert!(matches!(result, Err(PoolError::ConfigParse(_))));
  }

  #[test]
  fn unknown_fields_are_rejected() {
    let result = PoolConfig::from_yaml_str("workers: 2\npriority: high\nretry:\n  kind: never\n");
    assert!(matches!(result, Err(PoolError::ConfigParse(_))));
  }

  #[test]
  fn missing_file_is_reported() {
    let result = PoolConfig::from_file("/definitely/not/here/pool.yaml");
    assert!(matches!(result, Err(PoolError::ConfigNotFound(_))));
  }

  #[test]
  fn file_is_loaded() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "workers: 5\nretry:\n  kind: attempts\n  max_attempts: 2").unwrap();
    let config = PoolConfig::from_file(file.path()).unwrap();
    assert_eq!(config.workers, 5);
    assert_eq!(config.retry.max_attempts(), 2);
    assert_eq!(config.retry.backoff(), Duration::ZERO);
  }

  #[test]
  fn channels_use_configured_capacities() {
    let mut config = PoolConfig::new(1, RetryPolicy::Never);
    config.input_capacity = 3;
    config.output_capacity = 0;
    let ((job_tx, _job_rx), (result_tx, _result_rx)) = config.channels::<u8, u8, String>();
    assert_eq!(job_tx.capacity(), Some(3));
    assert_eq!(result_tx.capacity(), Some(0));
  }
}
