use crate::{config::WorkerConfig, executor::TaskExecutor, handlers::HandlerRegistry};
use opstool_client::{QueueError, TaskQueue};
use opstool_core::{codec, DispatchError, TaskResult, UNKNOWN_TASK_ID};

use tokio::sync::Notify;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Pause after a queue error that is not a connection failure
const COMMAND_ERROR_PAUSE: Duration = Duration::from_secs(1);

/// Cooperative stop signal for [`Worker::run`].
///
/// The flag is checked between polls; a task that is already running always
/// finishes and has its result delivered.
#[derive(Clone, Default)]
pub struct ShutdownHandle {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl ShutdownHandle {
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Sleep for `delay`, returning early if shutdown is triggered
    async fn sleep(&self, delay: Duration) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if self.is_triggered() {
            return;
        }

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = notified => {}
        }
    }
}

/// Counters reported when the loop exits
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkerStats {
    pub received: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub decode_errors: u64,
    pub delivery_failures: u64,
}

/// Exponential reconnect delay: `base * 2^n`, capped at `max`
#[derive(Debug)]
struct Backoff {
    base: Duration,
    max: Duration,
    attempt: u32,
}

impl Backoff {
    fn new(base: Duration, max: Duration) -> Self {
        Backoff { base, max, attempt: 0 }
    }

    fn next_delay(&mut self) -> Duration {
        let factor = 2u32.saturating_pow(self.attempt.min(16));
        self.attempt = self.attempt.saturating_add(1);
        self.base.saturating_mul(factor).min(self.max)
    }

    fn reset(&mut self) {
        self.attempt = 0;
    }
}

/// Single-consumer dispatch loop over a task queue
pub struct Worker<Q: TaskQueue> {
    config: WorkerConfig,
    worker_id: String,
    queue: Q,
    executor: TaskExecutor,
    shutdown: ShutdownHandle,
    stats: WorkerStats,
}

impl<Q: TaskQueue> Worker<Q> {
    pub fn new(config: WorkerConfig, queue: Q, registry: HandlerRegistry) -> Self {
        let worker_id = config.generate_worker_id();

        Worker {
            config,
            worker_id,
            queue,
            executor: TaskExecutor::new(registry),
            shutdown: ShutdownHandle::default(),
            stats: WorkerStats::default(),
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    pub fn stats(&self) -> &WorkerStats {
        &self.stats
    }

    /// Run the worker until shutdown is triggered or the queue is closed
    pub async fn run(&mut self) -> WorkerStats {
        info!(
            worker_id = %self.worker_id,
            task_queue = %self.config.queue.task_queue,
            result_queue = %self.config.queue.result_queue,
            "Starting worker"
        );

        let mut backoff = Backoff::new(
            Duration::from_millis(self.config.queue.reconnect_base_delay_ms),
            Duration::from_millis(self.config.queue.reconnect_max_delay_ms),
        );
        let poll_timeout = self.config.poll_timeout();

        while !self.shutdown.is_triggered() {
            match self.queue.pop(poll_timeout).await {
                Ok(Some(raw)) => {
                    backoff.reset();
                    let result = self.process(&raw).await;
                    let _ = self.deliver(&result).await;
                }
                Ok(None) => {
                    backoff.reset();
                }
                Err(QueueError::Closed) => {
                    warn!("Task queue closed, stopping worker");
                    break;
                }
                Err(e) if e.is_connection() => {
                    let delay = backoff.next_delay();
                    warn!("Queue unavailable ({}), retrying in {:?}", e, delay);
                    self.shutdown.sleep(delay).await;
                }
                Err(e) => {
                    error!("Failed to poll task queue: {}", e);
                    self.shutdown.sleep(COMMAND_ERROR_PAUSE).await;
                }
            }
        }

        info!(
            worker_id = %self.worker_id,
            received = self.stats.received,
            succeeded = self.stats.succeeded,
            failed = self.stats.failed,
            decode_errors = self.stats.decode_errors,
            delivery_failures = self.stats.delivery_failures,
            "Worker stopped"
        );

        self.stats.clone()
    }

    /// Turn one raw queue element into exactly one result
    pub async fn process(&mut self, raw: &str) -> TaskResult {
        let started = Instant::now();
        self.stats.received += 1;
        debug!(bytes = raw.len(), "RECEIVED");

        debug!("DECODING");
        let mut result = match codec::decode_task(raw.as_bytes()) {
            Ok(task) => {
                debug!(task_id = %task.id, task_type = %task.task_type, "DISPATCHING");
                let result = self.executor.execute(&task).await;
                debug!(task_id = %task.id, status = %result.status, "HANDLER_FINISHED");
                result
            }
            Err(e) => {
                self.stats.decode_errors += 1;
                warn!(payload = %e.raw, "Failed to decode task: {}", e.reason);
                let task_id = e.task_id.clone().unwrap_or_else(|| UNKNOWN_TASK_ID.to_string());
                TaskResult::from_error(task_id, &DispatchError::Decode(e))
            }
        };

        result.worker_id = Some(self.worker_id.clone());
        result.duration_ms = Some(started.elapsed().as_millis() as u64);
        result.finished_at = Some(chrono::Utc::now());
        result.ensure_message();

        if result.is_success() {
            self.stats.succeeded += 1;
        } else {
            self.stats.failed += 1;
        }

        info!(
            task_id = %result.task_id,
            status = %result.status,
            duration_ms = result.duration_ms,
            "Task processed"
        );

        result
    }

    /// Push a result to the output queue, retrying as configured.
    ///
    /// A result that still cannot be pushed is logged in full at error level
    /// and counted as lost.
    pub async fn deliver(&mut self, result: &TaskResult) -> Result<(), DispatchError> {
        let payload = codec::encode_result(result).map_err(|e| {
            self.stats.delivery_failures += 1;
            error!(task_id = %result.task_id, "Failed to encode result: {}", e);
            DispatchError::Delivery(e.to_string())
        })?;

        let attempts = self.config.delivery.max_retries.saturating_add(1);
        let retry_delay = Duration::from_millis(self.config.delivery.retry_delay_ms);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match self.queue.push_result(payload.clone()).await {
                Ok(()) => {
                    debug!(task_id = %result.task_id, attempt, "RESULT_PUSHED");
                    return Ok(());
                }
                Err(e) => {
                    warn!(task_id = %result.task_id, attempt, attempts, "Failed to push result: {}", e);
                    last_error = Some(e);
                    if attempt < attempts {
                        self.shutdown.sleep(retry_delay).await;
                    }
                }
            }
        }

        self.stats.delivery_failures += 1;
        let reason = last_error.map(|e| e.to_string()).unwrap_or_default();
        error!(task_id = %result.task_id, payload = %payload, "Result lost: {}", reason);

        Err(DispatchError::Delivery(reason))
    }
}
