// src/config/raw.rs
// Structs directly mapping to the YAML structure.

use serde::Deserialize;

#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PoolConfigRaw {
  #[serde(default = "default_name")]
  pub name: String,
  pub workers: usize,
  #[serde(default = "default_capacity")]
  pub input_capacity: usize,
  #[serde(default = "default_capacity")]
  pub output_capacity: usize,
  #[serde(default = "default_close_output_on_exit")]
  pub close_output_on_exit: bool,
  // Required on purpose: there is no sensible default retry behavior.
  pub retry: RetryPolicyRaw,
}

fn default_name() -> String {
  "worker-pool".to_string()
}

fn default_capacity() -> usize {
  64
}

fn default_close_output_on_exit() -> bool {
  true
}

#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case", deny_unknown_fields)]
pub enum RetryPolicyRaw {
  /// Report every failure as is.
  Never,
  /// Run a failing job up to `max_attempts` times in total.
  Attempts {
    max_attempts: u32,
    /// Human readable pause between attempts, e.g. `"50ms"`.
    #[serde(default)]
    backoff: Option<String>,
  },
}
