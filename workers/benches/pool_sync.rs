use bench_matrix::{criterion_runner::sync_suite::SyncBenchmarkSuite, AbstractCombination, MatrixCellValue};
use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::time::{Duration, Instant};

use fibre_workers::{channel, JobResult, Submitter, WorkerPool};

// --- Config, State, Context for the worker pool ---
#[derive(Debug, Clone)]
struct PoolBenchConfig {
  workers: usize,
  capacity: usize,
  jobs: usize,
  /// Rounds of arithmetic per job, a stand-in for real work.
  work: u64,
}

#[derive(Default, Debug)]
struct BenchContext {
  jobs_processed_total: usize,
}

struct PoolSyncState {
  _marker: (),
}

fn extract_pool_config(combo: &AbstractCombination) -> Result<PoolBenchConfig, String> {
  Ok(PoolBenchConfig {
    workers: (combo.get_u64(0)? as usize).max(1),
    capacity: combo.get_u64(1)? as usize,
    jobs: (combo.get_u64(2)? as usize).max(1),
    work: combo.get_u64(3)?,
  })
}

fn setup_fn_pool_sync(_cfg: &PoolBenchConfig) -> Result<(BenchContext, PoolSyncState), String> {
  Ok((BenchContext::default(), PoolSyncState { _marker: () }))
}

fn spin(rounds: u64, seed: u64) -> u64 {
  let mut acc = seed;
  for i in 0..rounds {
    acc = acc.wrapping_mul(6364136223846793005).wrapping_add(i);
  }
  acc
}

fn benchmark_logic_pool_sync(
  mut ctx: BenchContext,
  state: PoolSyncState,
  cfg: &PoolBenchConfig,
) -> (BenchContext, PoolSyncState, Duration) {
  let (job_tx, job_rx) = channel::bounded(cfg.capacity);
  let (result_tx, result_rx) = channel::bounded::<JobResult<u64, u64, String>>(cfg.capacity);
  let rounds = cfg.work;

  let start_time = Instant::now();
  let pool = WorkerPool::spawn(cfg.workers, job_rx, result_tx, move |_, seed: &u64| Ok(spin(rounds, *seed))).unwrap();
  let jobs = cfg.jobs;
  let producer = std::thread::spawn(move || {
    let submitter = Submitter::new(job_tx);
    for seed in 0..jobs as u64 {
      submitter.submit(seed).unwrap();
    }
  });
  let completed = result_rx.iter().filter(|r| r.is_ok()).count();
  producer.join().unwrap();
  pool.join().unwrap();
  let duration = start_time.elapsed();

  assert_eq!(completed, cfg.jobs);
  ctx.jobs_processed_total += completed;
  (ctx, state, duration)
}

fn teardown_pool_sync(_ctx: BenchContext, _state: PoolSyncState, _cfg: &PoolBenchConfig) {}

fn pool_sync_benches(c: &mut Criterion) {
  let parameter_axes = vec![
    vec![
      MatrixCellValue::Unsigned(1),
      MatrixCellValue::Unsigned(4),
      MatrixCellValue::Unsigned(8),
    ], // Workers
    vec![MatrixCellValue::Unsigned(0), MatrixCellValue::Unsigned(64)], // Capacity
    vec![MatrixCellValue::Unsigned(10_000)], // Jobs
    vec![MatrixCellValue::Unsigned(0), MatrixCellValue::Unsigned(1_000)], // Work
  ];
  let parameter_names = vec![
    "Workers".to_string(),
    "Cap".to_string(),
    "Jobs".to_string(),
    "Work".to_string(),
  ];

  SyncBenchmarkSuite::new(
    c,
    "PoolSync".to_string(),
    Some(parameter_names),
    parameter_axes,
    Box::new(extract_pool_config),
    setup_fn_pool_sync,
    benchmark_logic_pool_sync,
    teardown_pool_sync,
  )
  .throughput(|cfg: &PoolBenchConfig| Throughput::Elements(cfg.jobs as u64))
  .run();
}

criterion_group!(benches, pool_sync_benches);
criterion_main!(benches);
