use chrono::Utc;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::models::job::{JobKind, TaskName};

/// Upper bound of delayed jobs moved to the ready list per poll.
const PROMOTE_BATCH: isize = 100;

/// Job payload serialized into Redis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedJob {
    pub job_id: Uuid,
    /// Number of times this job has been re-dispatched.
    #[serde(default)]
    pub retries: u32,
    #[serde(flatten)]
    pub task: JobKind,
}

impl QueuedJob {
    pub fn new(task: JobKind) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            retries: 0,
            task,
        }
    }

    pub fn name(&self) -> TaskName {
        self.task.name()
    }

    /// Copy dispatched again after a retry. Keeps the job id so storage-side
    /// claims (the model lock) stay attributable to the same job.
    pub fn next_attempt(&self) -> Self {
        Self {
            retries: self.retries + 1,
            ..self.clone()
        }
    }
}

/// Redis-backed job queue: a ready list, a processing list and a sorted set
/// of jobs waiting for their retry countdown.
pub struct JobQueue {
    client: redis::Client,
    name: String,
    queue_key: String,
    processing_key: String,
    scheduled_key: String,
}

impl JobQueue {
    pub fn new(redis_url: &str, name: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url).map_err(QueueError::Redis)?;
        Ok(Self {
            client,
            name: name.to_string(),
            queue_key: format!("provider:{name}:jobs"),
            processing_key: format!("provider:{name}:processing"),
            scheduled_key: format!("provider:{name}:scheduled"),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Enqueue a job for immediate processing.
    pub async fn enqueue(&self, job: &QueuedJob) -> Result<(), QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload = serde_json::to_string(job)?;
        conn.lpush::<_, _, ()>(&self.queue_key, &payload).await?;
        Ok(())
    }

    /// Re-dispatch a job once `delay` has elapsed.
    pub async fn schedule(&self, job: &QueuedJob, delay: Duration) -> Result<(), QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload = serde_json::to_string(job)?;
        let due = Utc::now().timestamp_millis() + delay.as_millis() as i64;
        conn.zadd::<_, _, _, ()>(&self.scheduled_key, &payload, due)
            .await?;
        Ok(())
    }

    /// Move delayed jobs whose countdown elapsed onto the ready list.
    pub async fn promote_due(&self) -> Result<usize, QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let now = Utc::now().timestamp_millis();
        let due: Vec<String> = conn
            .zrangebyscore_limit(&self.scheduled_key, "-inf", now, 0, PROMOTE_BATCH)
            .await?;

        let mut promoted = 0;
        for payload in due {
            // Only the worker that removes the entry gets to push it.
            let removed: i64 = conn.zrem(&self.scheduled_key, &payload).await?;
            if removed == 1 {
                conn.lpush::<_, _, ()>(&self.queue_key, &payload).await?;
                promoted += 1;
            }
        }
        Ok(promoted)
    }

    /// Dequeue a job for processing (pop with move to processing list).
    pub async fn dequeue(&self) -> Result<Option<QueuedJob>, QueueError> {
        self.promote_due().await?;

        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let result: Option<String> = conn
            .rpoplpush(&self.queue_key, &self.processing_key)
            .await?;

        match result {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    /// Check Redis connectivity (for health checks).
    pub async fn health_check(&self) -> Result<(), QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }

    /// Jobs ready to run plus jobs waiting on a retry countdown.
    pub async fn queue_depth(&self) -> Result<u64, QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let ready: u64 = conn.llen(&self.queue_key).await?;
        let scheduled: u64 = conn.zcard(&self.scheduled_key).await?;
        Ok(ready + scheduled)
    }

    /// Mark a job as complete (remove from processing list).
    pub async fn complete(&self, job: &QueuedJob) -> Result<(), QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload = serde_json::to_string(job)?;
        conn.lrem::<_, _, ()>(&self.processing_key, 1, &payload)
            .await?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
