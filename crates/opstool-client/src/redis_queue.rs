use crate::{QueueError, Result, TaskQueue, RESULT_QUEUE, TASK_QUEUE};
use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{AsyncConnectionConfig, Client, RedisError};
use std::time::Duration;
use tracing::{debug, info, warn};

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Redis-backed queue.
///
/// Producers `LPUSH` onto the task list and the worker `BRPOP`s from it, so
/// tasks come out in FIFO order. Results go back with `LPUSH` for the
/// orchestrator to `BRPOP`.
///
/// The connection is owned by this value and established lazily. A
/// connection-level failure drops it so the next call reconnects.
pub struct RedisQueue {
    client: Client,
    connection: Option<MultiplexedConnection>,
    task_key: String,
    result_key: String,
    connect_timeout: Duration,
}

impl RedisQueue {
    /// Create a queue handle for `redis_url`. Does not connect yet.
    pub fn open(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url).map_err(|e| QueueError::Connection(e.to_string()))?;

        Ok(RedisQueue {
            client,
            connection: None,
            task_key: TASK_QUEUE.to_string(),
            result_key: RESULT_QUEUE.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        })
    }

    /// Override the list names
    pub fn with_keys(mut self, task_key: impl Into<String>, result_key: impl Into<String>) -> Self {
        self.task_key = task_key.into();
        self.result_key = result_key.into();
        self
    }

    /// Bound on establishing a connection. Blocking pops are not affected.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn task_key(&self) -> &str {
        &self.task_key
    }

    pub fn result_key(&self) -> &str {
        &self.result_key
    }

    /// Connect eagerly, e.g. to fail fast at startup
    pub async fn connect(&mut self) -> Result<()> {
        self.connection().await.map(|_| ())
    }

    async fn connection(&mut self) -> Result<MultiplexedConnection> {
        if let Some(conn) = &self.connection {
            return Ok(conn.clone());
        }

        let config = AsyncConnectionConfig::new().set_connection_timeout(self.connect_timeout);
        let conn = self
            .client
            .get_multiplexed_async_connection_with_config(&config)
            .await
            .map_err(|e| QueueError::Connection(e.to_string()))?;

        info!("Connected to queue store");
        self.connection = Some(conn.clone());
        Ok(conn)
    }

    fn classify(&mut self, err: RedisError) -> QueueError {
        if err.is_connection_dropped()
            || err.is_connection_refusal()
            || err.is_io_error()
            || err.is_timeout()
        {
            warn!("Queue store connection lost: {}", err);
            self.connection = None;
            QueueError::Connection(err.to_string())
        } else {
            QueueError::Command(err.to_string())
        }
    }

    async fn lpush(&mut self, key: String, payload: String) -> Result<()> {
        let mut conn = self.connection().await?;

        let pushed: std::result::Result<i64, RedisError> = redis::cmd("LPUSH")
            .arg(&key)
            .arg(payload)
            .query_async(&mut conn)
            .await;

        match pushed {
            Ok(len) => {
                debug!("Pushed to {} (length {})", key, len);
                Ok(())
            }
            Err(e) => Err(self.classify(e)),
        }
    }
}

#[async_trait]
impl TaskQueue for RedisQueue {
    async fn pop(&mut self, timeout: Duration) -> Result<Option<String>> {
        let mut conn = self.connection().await?;

        // BRPOP treats 0 as "block forever"
        let timeout_secs = timeout.as_secs().max(1);

        let popped: std::result::Result<Option<(String, String)>, RedisError> = redis::cmd("BRPOP")
            .arg(&self.task_key)
            .arg(timeout_secs)
            .query_async(&mut conn)
            .await;

        match popped {
            Ok(item) => Ok(item.map(|(_key, payload)| payload)),
            Err(e) => Err(self.classify(e)),
        }
    }

    async fn push_result(&mut self, payload: String) -> Result<()> {
        let key = self.result_key.clone();
        self.lpush(key, payload).await
    }

    async fn push_task(&mut self, payload: String) -> Result<()> {
        let key = self.task_key.clone();
        self.lpush(key, payload).await
    }
}
