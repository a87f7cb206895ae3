//! Walks through the crate's building blocks, one section at a time.
//!
//! Run with `RUST_LOG=fibre_workers=debug` to see the pool's own events.

use fibre_workers::{
  channel, collect_exact, BatchReport, PoolConfig, Select, Shutdown, Submitter, WorkerPool,
};
use std::error::Error;
use std::thread;
use std::time::Duration;

fn rendezvous_handoff() {
  println!("=== rendezvous handoff ===");
  let (tx, rx) = channel::rendezvous();
  let sender = thread::spawn(move || {
    println!("sender: waiting for a receiver");
    tx.send(42).unwrap();
    println!("sender: handed off");
  });
  thread::sleep(Duration::from_millis(100));
  println!("main: received {:?}", rx.recv());
  sender.join().unwrap();
}

fn buffered_channel() {
  println!("\n=== buffered channel ===");
  let (tx, rx) = channel::bounded(3);
  for word in ["Hello", "World", "!"] {
    tx.send(word).unwrap();
  }
  println!("sent 3 messages without blocking, full = {}", tx.is_full());
  for word in rx.try_iter() {
    println!("received {}", word);
  }
}

fn close_and_range() {
  println!("\n=== close and range ===");
  let (tx, rx) = channel::bounded(2);
  let producer = thread::spawn(move || {
    for i in 1..=3 {
      tx.send(i).unwrap();
      println!("sent {}", i);
    }
    tx.close().unwrap();
  });
  for value in &rx {
    println!("received {}", value);
  }
  producer.join().unwrap();
}

fn worker_pool() -> Result<(), Box<dyn Error>> {
  println!("\n=== worker pool ===");
  let config = PoolConfig::from_yaml_str(
    "
name: doubler
workers: 3
input_capacity: 5
output_capacity: 5
retry:
  kind: never
",
  )?;
  let ((job_tx, job_rx), (result_tx, result_rx)) = config.channels::<u32, u32, String>();
  let pool = WorkerPool::spawn_with(&config, job_rx, result_tx, |ctx, job: &u32| {
    println!("worker {} started {}", ctx.worker_id(), ctx.job_id());
    thread::sleep(Duration::from_millis(50));
    Ok(job * 2)
  })?;

  let submitter = Submitter::new(job_tx);
  for n in 1..=5 {
    submitter.submit(n)?;
  }
  submitter.finish()?;

  for result in collect_exact(&result_rx, 5)? {
    println!("{} -> {:?} (worker {})", result.id, result.outcome, result.worker);
  }
  let report = pool.join()?;
  println!("pool '{}' done: {:?}", report.name, report.jobs);
  Ok(())
}

fn select_with_timeout() {
  println!("\n=== select with timeout ===");
  let (fast_tx, fast) = channel::bounded(1);
  let (slow_tx, slow) = channel::bounded(1);
  let fast_sender = thread::spawn(move || {
    thread::sleep(Duration::from_millis(50));
    fast_tx.send("fast").unwrap();
    // Returned so the channel stays open; a closed channel would win every select.
    fast_tx
  });
  let slow_sender = thread::spawn(move || {
    thread::sleep(Duration::from_millis(300));
    let _ = slow_tx.send("slow");
  });

  for _ in 0..2 {
    let message = Select::new()
      .recv(&fast, |m| format!("from fast: {:?}", m))
      .recv(&slow, |m| format!("from slow: {:?}", m))
      .timeout(Duration::from_millis(150), || "timeout".to_string())
      .wait();
    println!("{}", message);
  }
  drop(fast_sender.join().unwrap());
  drop(slow);
  slow_sender.join().unwrap();
}

fn graceful_shutdown() -> Result<(), Box<dyn Error>> {
  println!("\n=== graceful shutdown ===");
  let shutdown = Shutdown::new();
  let (job_tx, job_rx) = channel::bounded(4);
  let (result_tx, result_rx) = channel::bounded(4);
  let pool = WorkerPool::builder(2)
    .name("ticker")
    .shutdown(&shutdown)
    .spawn(job_rx, result_tx, |ctx, ticks: &u32| -> Result<u32, String> {
      for tick in 0..*ticks {
        ctx.checkpoint().map_err(|e| e.to_string())?;
        thread::sleep(Duration::from_millis(20));
        if tick % 5 == 0 {
          println!("worker {} tick {}", ctx.worker_id(), tick);
        }
      }
      Ok(*ticks)
    })?;

  let submitter = Submitter::new(job_tx);
  submitter.submit(3)?;
  submitter.submit(1_000)?;
  thread::sleep(Duration::from_millis(200));
  shutdown.signal_stop()?;

  let report: BatchReport<u32, u32, String> = result_rx.iter().collect();
  println!("succeeded: {:?}", report.succeeded);
  println!("cancelled, ready to resubmit: {:?}", report.cancelled);
  println!("exits: {:?}", pool.join()?.exits);
  Ok(())
}

fn error_results() -> Result<(), Box<dyn Error>> {
  println!("\n=== errors as results ===");
  let (job_tx, job_rx) = channel::bounded(4);
  let (result_tx, result_rx) = channel::bounded(4);
  let pool = WorkerPool::spawn(2, job_rx, result_tx, |_, input: &&str| input.parse::<i64>())?;

  let submitter = Submitter::new(job_tx);
  for input in ["7", "seven", "-3"] {
    submitter.submit(input)?;
  }
  submitter.finish()?;

  let report: BatchReport<&str, i64, std::num::ParseIntError> = result_rx.iter().collect();
  println!("parsed: {:?}", report.succeeded);
  for (id, error) in &report.failed {
    println!("{} failed: {}", id, error);
  }
  pool.join()?;
  Ok(())
}

fn main() -> Result<(), Box<dyn Error>> {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .init();

  rendezvous_handoff();
  buffered_channel();
  close_and_range();
  worker_pool()?;
  select_with_timeout();
  graceful_shutdown()?;
  error_results()?;
  Ok(())
}
