//! Rate-paced concurrent line production.
//!
//! One run emits `num_logs` lines spread across a window. A single shared
//! ticker paces production; on each tick exactly one worker advances, guarded
//! by a produced-counter mutex so the run never overshoots. Workers batch
//! lines and hand full batches to the shipper.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{mpsc, Mutex};
use tokio::time::{interval_at, Instant, Interval};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::linegen::generate_line;
use crate::shipper::Shipper;

/// A batch flushes once it holds this many lines.
pub const MAX_BATCH_LINES: usize = 100;
/// A batch flushes before its payload would exceed this many bytes.
pub const MAX_BATCH_BYTES: usize = 10 * 1024 * 1024;

/// Worker pool size for a run: one worker per thousand lines, at least one,
/// never more than twice the host parallelism.
pub fn worker_count(num_logs: u64) -> usize {
    let by_volume = (num_logs / 1000).max(1) as usize;
    by_volume.clamp(1, num_cpus::get() * 2)
}

/// Interval between line emissions so `num_logs` lines fill `window`.
pub fn tick_period(window: Duration, num_logs: u64) -> Duration {
    let nanos = (window.as_nanos() / u128::from(num_logs.max(1))).max(1);
    Duration::from_nanos(nanos as u64)
}

#[derive(Clone)]
pub struct Producer {
    shipper: Arc<Shipper>,
    status_tx: mpsc::Sender<String>,
}

impl Producer {
    pub fn new(shipper: Arc<Shipper>, status_tx: mpsc::Sender<String>) -> Self {
        Self { shipper, status_tx }
    }

    /// Never blocks the hot path on the observer: full channel drops the message.
    fn report(&self, message: impl Into<String>) {
        let _ = self.status_tx.try_send(message.into());
    }

    /// Runs one production window. Returns once all lines are emitted or the
    /// token is cancelled; pending batches flush either way.
    pub async fn run(&self, num_logs: u64, window: Duration, cancel: CancellationToken) {
        if num_logs == 0 {
            return;
        }
        self.report("Task is in progress...");

        let workers = worker_count(num_logs);
        let per_worker = num_logs / workers as u64;
        let period = tick_period(window, num_logs);
        let ticker = Arc::new(Mutex::new(interval_at(Instant::now() + period, period)));
        let produced = Arc::new(Mutex::new(0u64));

        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let start = worker_id as u64 * per_worker;
            // the last range absorbs the division remainder
            let end = if worker_id == workers - 1 {
                num_logs
            } else {
                start + per_worker
            };
            let producer = self.clone();
            let ticker = ticker.clone();
            let produced = produced.clone();
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                producer
                    .worker_loop(start..end, num_logs, ticker, produced, cancel)
                    .await;
            }));
        }
        for handle in handles {
            let _ = handle.await;
        }
    }

    async fn worker_loop(
        &self,
        range: std::ops::Range<u64>,
        total: u64,
        ticker: Arc<Mutex<Interval>>,
        produced: Arc<Mutex<u64>>,
        cancel: CancellationToken,
    ) {
        let mut batch: Vec<String> = Vec::new();
        let mut batch_bytes = 0usize;
        let mut rng = StdRng::from_entropy();

        for _index in range {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = next_tick(&ticker) => {
                    {
                        let mut count = produced.lock().await;
                        if *count >= total {
                            break;
                        }
                        *count += 1;
                    }
                    let line = generate_line(&mut rng);
                    debug!("generated line: {}", line);

                    if !batch.is_empty() && batch_bytes + line.len() > MAX_BATCH_BYTES {
                        self.flush(&mut batch, &mut batch_bytes).await;
                    }
                    batch_bytes += line.len();
                    batch.push(line);

                    if batch.len() >= MAX_BATCH_LINES {
                        self.flush(&mut batch, &mut batch_bytes).await;
                    }
                }
            }
        }
        if !batch.is_empty() {
            self.flush(&mut batch, &mut batch_bytes).await;
        }
    }

    async fn flush(&self, batch: &mut Vec<String>, batch_bytes: &mut usize) {
        let lines = std::mem::take(batch);
        *batch_bytes = 0;
        let message = self.shipper.ship(&lines).await;
        self.report(message);
    }
}

async fn next_tick(ticker: &Arc<Mutex<Interval>>) {
    ticker.lock().await.tick().await;
}
