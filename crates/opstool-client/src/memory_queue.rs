use crate::{QueueError, Result, TaskQueue};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

/// In-process queue with the same semantics as the Redis one.
///
/// Clones share the same lists, so a test can keep one handle as the
/// producer/consumer while the worker owns another.
#[derive(Clone, Default)]
pub struct MemoryQueue {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    tasks: Mutex<VecDeque<String>>,
    results: Mutex<VecDeque<String>>,
    task_ready: Notify,
    failing_pushes: AtomicUsize,
    failing_pops: AtomicUsize,
    closed: AtomicBool,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Results in the order they were pushed
    pub fn results(&self) -> Vec<String> {
        self.inner.results.lock().iter().cloned().collect()
    }

    pub fn pending_tasks(&self) -> usize {
        self.inner.tasks.lock().len()
    }

    /// Make the next `n` result pushes fail with a connection error
    pub fn fail_next_result_pushes(&self, n: usize) {
        self.inner.failing_pushes.store(n, Ordering::SeqCst);
    }

    /// Make the next `n` pops fail with a connection error
    pub fn fail_next_pops(&self, n: usize) {
        self.inner.failing_pops.store(n, Ordering::SeqCst);
    }

    /// Every later operation fails with `QueueError::Closed`
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.task_ready.notify_waiters();
    }

    fn take_failure(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    fn check_open(&self) -> Result<()> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(QueueError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl TaskQueue for MemoryQueue {
    async fn pop(&mut self, timeout: Duration) -> Result<Option<String>> {
        self.check_open()?;
        if Self::take_failure(&self.inner.failing_pops) {
            return Err(QueueError::Connection("injected pop failure".to_string()));
        }

        let deadline = Instant::now() + timeout;

        loop {
            self.check_open()?;

            let notified = self.inner.task_ready.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let next = self.inner.tasks.lock().pop_front();
            if let Some(payload) = next {
                return Ok(Some(payload));
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn push_result(&mut self, payload: String) -> Result<()> {
        self.check_open()?;

        if Self::take_failure(&self.inner.failing_pushes) {
            return Err(QueueError::Connection("injected push failure".to_string()));
        }

        self.inner.results.lock().push_back(payload);
        Ok(())
    }

    async fn push_task(&mut self, payload: String) -> Result<()> {
        self.check_open()?;
        self.inner.tasks.lock().push_back(payload);
        self.inner.task_ready.notify_one();
        Ok(())
    }
}
