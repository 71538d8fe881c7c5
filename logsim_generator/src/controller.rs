//! Cancel-and-replace lifecycle for the generation task.
//!
//! At most one task is active per process. Starting while a task runs cancels
//! the old one and waits for it to wind down before the replacement spawns.
//! Within a task, an inner ticker restarts the producer every window so a rate
//! of "N per second" means a fresh N-line run every second.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, timeout, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::GeneratorError;
use crate::producer::Producer;
use crate::shipper::Shipper;

/// How long a start request waits for the producer's first status message.
pub const STATUS_WAIT: Duration = Duration::from_secs(3);

const STATUS_CHANNEL_CAPACITY: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateUnit {
    Seconds,
    Minutes,
    Hours,
}

impl RateUnit {
    pub fn parse(unit: &str) -> Option<Self> {
        match unit {
            "s" => Some(RateUnit::Seconds),
            "m" => Some(RateUnit::Minutes),
            "h" => Some(RateUnit::Hours),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RateUnit::Seconds => "s",
            RateUnit::Minutes => "m",
            RateUnit::Hours => "h",
        }
    }

    /// The production window one rate applies to.
    pub fn window(&self) -> Duration {
        match self {
            RateUnit::Seconds => Duration::from_secs(1),
            RateUnit::Minutes => Duration::from_secs(60),
            RateUnit::Hours => Duration::from_secs(3600),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskStatus {
    pub active: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub rate: Option<i64>,
    pub unit: Option<&'static str>,
}

struct ActiveTask {
    token: CancellationToken,
    handle: JoinHandle<()>,
    started_at: DateTime<Utc>,
    rate: i64,
    unit: RateUnit,
}

#[derive(Default)]
struct ControllerState {
    active: Option<ActiveTask>,
    last_rate: Option<(i64, RateUnit)>,
}

pub struct TaskController {
    shipper: Arc<Shipper>,
    state: Mutex<ControllerState>,
}

impl TaskController {
    pub fn new(shipper: Arc<Shipper>) -> Self {
        Self {
            shipper,
            state: Mutex::new(ControllerState::default()),
        }
    }

    /// Cancels any running task and starts a fresh one, then waits up to
    /// [`STATUS_WAIT`] for the producer's first status message.
    pub async fn start(&self, rate: i64, unit: RateUnit) -> Result<String, GeneratorError> {
        let mut status_rx = {
            let mut state = self.state.lock().await;
            if let Some(previous) = state.active.take() {
                warn!("previous task canceled");
                previous.token.cancel();
                let _ = previous.handle.await;
            }

            let (status_tx, status_rx) = mpsc::channel(STATUS_CHANNEL_CAPACITY);
            let token = CancellationToken::new();
            let producer = Producer::new(self.shipper.clone(), status_tx);
            let task_token = token.clone();
            let handle = tokio::spawn(async move {
                run_task(producer, rate as u64, unit, task_token).await;
            });

            state.active = Some(ActiveTask {
                token,
                handle,
                started_at: Utc::now(),
                rate,
                unit,
            });
            state.last_rate = Some((rate, unit));
            info!("generation task started: {} per {}", rate, unit.as_str());
            status_rx
        };

        match timeout(STATUS_WAIT, status_rx.recv()).await {
            Ok(Some(message)) => Ok(message),
            _ => Err(GeneratorError::StatusWaitTimeout),
        }
    }

    /// Cancels the active task if any. Returns whether one was running. The
    /// task handle is reaped in the background so callers see the controller
    /// idle immediately.
    pub async fn stop(&self) -> bool {
        let mut state = self.state.lock().await;
        match state.active.take() {
            Some(task) => {
                task.token.cancel();
                tokio::spawn(async move {
                    let _ = task.handle.await;
                });
                info!("generation task canceled");
                true
            }
            None => false,
        }
    }

    pub async fn status(&self) -> TaskStatus {
        let state = self.state.lock().await;
        match &state.active {
            Some(task) => TaskStatus {
                active: true,
                started_at: Some(task.started_at),
                rate: Some(task.rate),
                unit: Some(task.unit.as_str()),
            },
            None => TaskStatus {
                active: false,
                started_at: None,
                rate: state.last_rate.map(|(rate, _)| rate),
                unit: state.last_rate.map(|(_, unit)| unit.as_str()),
            },
        }
    }

    /// Rate and unit of the most recently started task, used as fallback when
    /// a start request omits them.
    pub async fn last_configured(&self) -> Option<(i64, RateUnit)> {
        self.state.lock().await.last_rate
    }
}

/// Inner loop of one task: every window, cancel the current producer run,
/// wait for it to observe cancellation, and kick a fresh run. Exits only on
/// external cancel.
async fn run_task(producer: Producer, num_logs: u64, unit: RateUnit, token: CancellationToken) {
    let window = unit.window();
    let mut ticker = interval_at(Instant::now() + window, window);

    let mut run_token = token.child_token();
    let mut run = spawn_run(&producer, num_logs, window, &run_token);

    loop {
        tokio::select! {
            _ = token.cancelled() => {
                run_token.cancel();
                let _ = run.await;
                info!("generation task stopped");
                return;
            }
            _ = ticker.tick() => {
                run_token.cancel();
                // the old run must observe cancellation before a new one spawns
                let _ = run.await;
                run_token = token.child_token();
                run = spawn_run(&producer, num_logs, window, &run_token);
            }
        }
    }
}

fn spawn_run(
    producer: &Producer,
    num_logs: u64,
    window: Duration,
    token: &CancellationToken,
) -> JoinHandle<()> {
    let producer = producer.clone();
    let token = token.clone();
    tokio::spawn(async move {
        producer.run(num_logs, window, token).await;
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_unit_parsing() {
        assert_eq!(RateUnit::parse("s"), Some(RateUnit::Seconds));
        assert_eq!(RateUnit::parse("m"), Some(RateUnit::Minutes));
        assert_eq!(RateUnit::parse("h"), Some(RateUnit::Hours));
        assert_eq!(RateUnit::parse("xyz"), None);
        assert_eq!(RateUnit::parse(""), None);
    }

    #[test]
    fn rate_unit_windows() {
        assert_eq!(RateUnit::Seconds.window(), Duration::from_secs(1));
        assert_eq!(RateUnit::Minutes.window(), Duration::from_secs(60));
        assert_eq!(RateUnit::Hours.window(), Duration::from_secs(3600));
    }

    fn test_controller() -> TaskController {
        TaskController::new(Arc::new(Shipper::new("http://127.0.0.1:1/logs").unwrap()))
    }

    #[tokio::test]
    async fn start_reports_progress_and_stop_goes_idle() {
        let controller = test_controller();
        let message = controller.start(2, RateUnit::Seconds).await.unwrap();
        assert_eq!(message, "Task is in progress...");

        let status = controller.status().await;
        assert!(status.active);
        assert_eq!(status.rate, Some(2));
        assert_eq!(status.unit, Some("s"));

        assert!(controller.stop().await);
        let status = controller.status().await;
        assert!(!status.active);
    }

    #[tokio::test]
    async fn stop_without_task_reports_idle() {
        let controller = test_controller();
        assert!(!controller.stop().await);
        assert!(!controller.status().await.active);
    }

    #[tokio::test]
    async fn restart_replaces_the_running_task() {
        let controller = test_controller();
        controller.start(2, RateUnit::Hours).await.unwrap();
        controller.start(5, RateUnit::Minutes).await.unwrap();

        let status = controller.status().await;
        assert!(status.active);
        assert_eq!(status.rate, Some(5));
        assert_eq!(status.unit, Some("m"));
        assert_eq!(controller.last_configured().await, Some((5, RateUnit::Minutes)));
        controller.stop().await;
    }
}
