use bench_matrix::{criterion_runner::sync_suite::SyncBenchmarkSuite, AbstractCombination, MatrixCellValue};
use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::thread;
use std::time::{Duration, Instant};

use fibre_workers::channel::{self, Receiver, Sender};

const ITEM_VALUE: u64 = 42;

// --- Config, State, Context for the MPMC channel ---
#[derive(Debug, Clone)]
struct ChannelBenchConfig {
  capacity: usize,
  producers: usize,
  consumers: usize,
  items_per_producer: usize,
}

impl ChannelBenchConfig {
  fn total_items(&self) -> usize {
    self.producers * self.items_per_producer
  }
}

#[derive(Default, Debug)]
struct BenchContext {
  items_processed_total: usize,
}

// A run closes its channel by dropping the last sender, so each run builds
// its own and the state stays empty.
struct ChannelSyncState {
  _marker: (),
}

fn extract_channel_config(combo: &AbstractCombination) -> Result<ChannelBenchConfig, String> {
  let capacity = combo.get_u64(0)? as usize;
  let producers = (combo.get_u64(1)? as usize).max(1);
  let consumers = (combo.get_u64(2)? as usize).max(1);
  let items_per_producer = (combo.get_u64(3)? as usize).max(1);
  Ok(ChannelBenchConfig {
    capacity,
    producers,
    consumers,
    items_per_producer,
  })
}

fn setup_fn_channel_sync(_cfg: &ChannelBenchConfig) -> Result<(BenchContext, ChannelSyncState), String> {
  Ok((BenchContext::default(), ChannelSyncState { _marker: () }))
}

fn spawn_producers(tx: Sender<u64>, cfg: &ChannelBenchConfig) -> Vec<thread::JoinHandle<()>> {
  (0..cfg.producers)
    .map(|_| {
      let tx = tx.clone();
      let items = cfg.items_per_producer;
      thread::spawn(move || {
        for _ in 0..items {
          tx.send(ITEM_VALUE).unwrap();
        }
      })
    })
    .collect()
}

fn spawn_consumers(rx: Receiver<u64>, cfg: &ChannelBenchConfig) -> Vec<thread::JoinHandle<usize>> {
  (0..cfg.consumers)
    .map(|_| {
      let rx = rx.clone();
      thread::spawn(move || rx.iter().count())
    })
    .collect()
}

fn benchmark_logic_channel_sync(
  mut ctx: BenchContext,
  state: ChannelSyncState,
  cfg: &ChannelBenchConfig,
) -> (BenchContext, ChannelSyncState, Duration) {
  let (tx, rx) = channel::bounded(cfg.capacity);
  let start_time = Instant::now();
  let consumers = spawn_consumers(rx, cfg);
  let producers = spawn_producers(tx, cfg);
  for producer in producers {
    producer.join().unwrap();
  }
  let received: usize = consumers.into_iter().map(|c| c.join().unwrap()).sum();
  let duration = start_time.elapsed();

  assert_eq!(received, cfg.total_items());
  ctx.items_processed_total += received;
  (ctx, state, duration)
}

fn teardown_channel_sync(_ctx: BenchContext, _state: ChannelSyncState, _cfg: &ChannelBenchConfig) {}

fn channel_sync_benches(c: &mut Criterion) {
  let parameter_axes = vec![
    vec![
      MatrixCellValue::Unsigned(0),
      MatrixCellValue::Unsigned(16),
      MatrixCellValue::Unsigned(1024),
    ], // Capacity
    vec![MatrixCellValue::Unsigned(1), MatrixCellValue::Unsigned(4)], // Producers
    vec![MatrixCellValue::Unsigned(1), MatrixCellValue::Unsigned(4)], // Consumers
    vec![MatrixCellValue::Unsigned(10_000)], // ItemsPerProducer
  ];
  let parameter_names = vec![
    "Cap".to_string(),
    "Prod".to_string(),
    "Cons".to_string(),
    "ItemsPerProd".to_string(),
  ];

  SyncBenchmarkSuite::new(
    c,
    "ChannelSync".to_string(),
    Some(parameter_names),
    parameter_axes,
    Box::new(extract_channel_config),
    setup_fn_channel_sync,
    benchmark_logic_channel_sync,
    teardown_channel_sync,
  )
  .throughput(|cfg: &ChannelBenchConfig| Throughput::Elements(cfg.total_items() as u64))
  .run();
}

criterion_group!(benches, channel_sync_benches);
criterion_main!(benches);
