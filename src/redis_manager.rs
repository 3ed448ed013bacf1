//! Redis Manager - Centralized Redis connection and operations
//!
//! This module handles all Redis-related operations including:
//! - Worker ID allocation and lease management
//! - Job queue operations (RPUSH / bounded BLPOP)
//! - Report storage and publishing

use std::time::Duration;

use anyhow::{Context, Result};
use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::jobs::{JudgeReport, WorkerJob};

/// Redis key constants
pub mod keys {
    /// Worker lease key prefix for distributed worker ID allocation
    pub const WORKER_LEASE_PREFIX: &str = "judge:worker:lease:";

    /// Judge job queue key
    pub const JUDGE_QUEUE: &str = "judge:queue";

    /// Judge result key prefix (for polling)
    pub const JUDGE_RESULT_PREFIX: &str = "judge:result:";

    /// Judge result channel (for pub/sub)
    pub const JUDGE_RESULT_CHANNEL: &str = "judge:results";

    pub fn worker_lease(worker_id: u32) -> String {
        format!("{}{}", WORKER_LEASE_PREFIX, worker_id)
    }

    pub fn judge_result(request_id: &uuid::Uuid) -> String {
        format!("{}{}", JUDGE_RESULT_PREFIX, request_id)
    }
}

/// Configuration constants
const MAX_WORKERS: u32 = 10;
const WORKER_LEASE_TTL_SECS: u64 = 120;
const RESULT_EXPIRY_SECS: u64 = 3600; // 1 hour

/// Centralized Redis manager for queue operations
pub struct RedisManager {
    client: redis::Client,
    conn: MultiplexedConnection,
    lease: Option<WorkerLease>,
}

struct WorkerLease {
    worker_id: u32,
    heartbeat: JoinHandle<()>,
}

impl RedisManager {
    /// Connect without claiming a worker id (producers such as the gateway)
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("Failed to create Redis client")?;
        let conn = get_connection_with_retry(&client).await?;
        info!("Connected to Redis at {}", redis_url);

        Ok(Self {
            client,
            conn,
            lease: None,
        })
    }

    /// Connect and allocate a unique worker ID (0 to MAX_WORKERS-1),
    /// keeping its lease alive in the background
    pub async fn with_worker_lease(redis_url: &str) -> Result<Self> {
        let mut manager = Self::connect(redis_url).await?;

        let worker_id = allocate_worker_id(&manager.client).await?;
        info!(
            "Allocated worker_id={} (lease {}s)",
            worker_id, WORKER_LEASE_TTL_SECS
        );

        manager.lease = Some(WorkerLease {
            worker_id,
            heartbeat: spawn_lease_heartbeat(manager.client.clone(), worker_id),
        });
        Ok(manager)
    }

    /// Allocated worker ID, or 0 for connections without a lease
    pub fn worker_id(&self) -> u32 {
        self.lease.as_ref().map_or(0, |lease| lease.worker_id)
    }

    /// Handle for storing reports from concurrent tasks, on its own connection
    /// (the manager's connection sits in `BLPOP`)
    pub async fn result_sink(&self) -> Result<ResultSink> {
        let conn = get_connection_with_retry(&self.client).await?;
        Ok(ResultSink {
            client: self.client.clone(),
            conn,
        })
    }

    /// Append a job to the queue
    pub async fn push_job(&mut self, job: &WorkerJob) -> Result<()> {
        let json = serde_json::to_string(job)?;

        if let Err(e) = self
            .conn
            .rpush::<_, _, ()>(keys::JUDGE_QUEUE, &json)
            .await
        {
            warn!("Failed to enqueue job: {}. Reconnecting...", e);
            self.reconnect().await?;
            self.conn
                .rpush::<_, _, ()>(keys::JUDGE_QUEUE, &json)
                .await
                .context("Failed to enqueue job")?;
        }
        Ok(())
    }

    /// Wait up to `timeout` for the next job.
    ///
    /// Returns `None` when the wait times out so callers can check for shutdown.
    /// Malformed entries are logged and dropped. Automatically reconnects on
    /// connection failure.
    pub async fn pop_job(&mut self, timeout: Duration) -> Result<Option<WorkerJob>> {
        let result: Option<(String, String)> =
            match self.conn.blpop(keys::JUDGE_QUEUE, timeout.as_secs_f64()).await {
                Ok(res) => res,
                Err(e) => {
                    warn!("Redis BLPOP failed: {}. Reconnecting...", e);
                    self.reconnect().await?;
                    return Ok(None);
                }
            };

        let Some((_, job_data)) = result else {
            return Ok(None);
        };

        match serde_json::from_str::<WorkerJob>(&job_data) {
            Ok(job) => Ok(Some(job)),
            Err(e) => {
                warn!("Failed to parse job data: {}. Data: {}", e, job_data);
                Ok(None)
            }
        }
    }

    /// Stop the heartbeat and release the worker ID
    pub async fn close(mut self) -> Result<()> {
        if let Some(lease) = self.lease.take() {
            lease.heartbeat.abort();
            self.conn
                .del::<_, ()>(keys::worker_lease(lease.worker_id))
                .await
                .context("Failed to release worker lease")?;
            info!("Released worker_id={}", lease.worker_id);
        }
        Ok(())
    }

    /// Reconnect to Redis
    async fn reconnect(&mut self) -> Result<()> {
        self.conn = get_connection_with_retry(&self.client).await?;
        Ok(())
    }
}

impl Drop for RedisManager {
    fn drop(&mut self) {
        if let Some(lease) = &self.lease {
            lease.heartbeat.abort();
        }
    }
}

/// Stores reports; cheap to clone into job tasks
#[derive(Clone)]
pub struct ResultSink {
    client: redis::Client,
    conn: MultiplexedConnection,
}

impl ResultSink {
    /// Store a report in Redis.
    ///
    /// The report is stored with a 1-hour expiration and also published
    /// to a channel for real-time subscribers.
    pub async fn store_report(&mut self, report: &JudgeReport) -> Result<()> {
        let json = serde_json::to_string(report)?;
        let key = keys::judge_result(&report.request_id);

        // Try to store, reconnect on failure
        if let Err(e) = self
            .conn
            .set_ex::<_, _, ()>(&key, &json, RESULT_EXPIRY_SECS)
            .await
        {
            warn!("Failed to store result: {}. Reconnecting...", e);
            self.conn = get_connection_with_retry(&self.client).await?;
            self.conn
                .set_ex::<_, _, ()>(&key, &json, RESULT_EXPIRY_SECS)
                .await?;
        }

        // Publish to channel (ignore errors as there may be no subscribers)
        let _ = self
            .conn
            .publish::<_, _, ()>(keys::JUDGE_RESULT_CHANNEL, &json)
            .await;

        Ok(())
    }
}

/// Get a Redis connection with retry logic
async fn get_connection_with_retry(client: &redis::Client) -> Result<MultiplexedConnection> {
    loop {
        match client.get_multiplexed_async_connection().await {
            Ok(conn) => return Ok(conn),
            Err(e) => {
                warn!(
                    "Failed to connect to Redis: {}. Retrying in 3 seconds...",
                    e
                );
                tokio::time::sleep(Duration::from_secs(3)).await;
            }
        }
    }
}

/// Allocate a unique worker ID using Redis SET NX with expiration
async fn allocate_worker_id(client: &redis::Client) -> Result<u32> {
    loop {
        let mut conn = get_connection_with_retry(client).await?;

        for worker_id in 0..MAX_WORKERS {
            let claimed: Option<String> = redis::cmd("SET")
                .arg(keys::worker_lease(worker_id))
                .arg("claimed")
                .arg("NX")
                .arg("EX")
                .arg(WORKER_LEASE_TTL_SECS as usize)
                .query_async(&mut conn)
                .await?;

            if claimed.is_some() {
                return Ok(worker_id);
            }
        }

        warn!(
            "No free worker_id (0-{}). Retrying in 1 second...",
            MAX_WORKERS - 1
        );
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
}

/// Spawn a background task to keep the worker lease alive
fn spawn_lease_heartbeat(client: redis::Client, worker_id: u32) -> JoinHandle<()> {
    tokio::spawn(async move {
        let interval = Duration::from_secs(WORKER_LEASE_TTL_SECS / 2);

        loop {
            tokio::time::sleep(interval).await;

            match get_connection_with_retry(&client).await {
                Ok(mut conn) => {
                    if let Err(e) = redis::cmd("EXPIRE")
                        .arg(keys::worker_lease(worker_id))
                        .arg(WORKER_LEASE_TTL_SECS as usize)
                        .query_async::<()>(&mut conn)
                        .await
                    {
                        warn!("Failed to refresh worker lease {}: {}", worker_id, e);
                    }
                }
                Err(e) => {
                    warn!(
                        "Failed to refresh worker lease {} (connection): {}",
                        worker_id, e
                    );
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Verdict;
    use uuid::Uuid;

    #[tokio::test]
    #[ignore = "requires redis"]
    async fn test_store_is_not_blocked_by_waiting_pop() {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".into());
        let mut manager = RedisManager::connect(&url).await.unwrap();
        let mut sink = manager.result_sink().await.unwrap();

        let waiting = tokio::spawn(async move {
            // Empty queue: waits the full timeout
            let _ = manager.pop_job(Duration::from_secs(3)).await;
            manager
        });
        tokio::time::sleep(Duration::from_millis(100)).await;

        let report = JudgeReport::verdict(Uuid::new_v4(), Verdict::Accepted, None);
        tokio::time::timeout(Duration::from_secs(1), sink.store_report(&report))
            .await
            .expect("store waited behind BLPOP")
            .unwrap();

        let manager = waiting.await.unwrap();
        manager.close().await.unwrap();
    }

    #[test]
    fn test_keys() {
        assert_eq!(keys::worker_lease(3), "judge:worker:lease:3");
        assert_eq!(
            keys::judge_result(&Uuid::nil()),
            "judge:result:00000000-0000-0000-0000-000000000000"
        );
    }
}
