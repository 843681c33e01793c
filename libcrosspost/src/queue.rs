//! Delayed publish job queue
//!
//! One retryable job per post, keyed by the post id, stored next to the
//! posts in SQLite. The worker polls for due jobs; retries back off
//! exponentially and exhausted jobs are parked for operator attention
//! rather than silently dropped.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::db::Database;
use crate::error::Result;
use crate::types::Job;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// First retry delay; doubles on each subsequent attempt
    pub base_delay_secs: i64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 30,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay_secs: config.base_delay_secs,
        }
    }
}

impl RetryPolicy {
    /// Delay before the given attempt number (1-based) runs again
    pub fn backoff_secs(&self, attempt: u32) -> i64 {
        self.base_delay_secs << (attempt.saturating_sub(1).min(16))
    }
}

#[derive(Clone)]
pub struct JobQueue {
    db: Database,
    policy: RetryPolicy,
}

impl JobQueue {
    pub fn new(db: Database, policy: RetryPolicy) -> Self {
        Self { db, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Enqueue the publish job for a post. Re-enqueueing with the same post
    /// id replaces the previous job, so a rescheduled post never has two
    /// jobs in flight.
    pub async fn schedule(&self, post_id: &str, run_at: DateTime<Utc>) -> Result<()> {
        debug!(post_id, run_at = run_at.timestamp(), "enqueueing publish job");
        self.db.enqueue_job(post_id, run_at.timestamp()).await
    }

    /// Remove a pending job. Returns whether one existed.
    pub async fn cancel(&self, post_id: &str) -> Result<bool> {
        debug!(post_id, "cancelling publish job");
        self.db.cancel_job(post_id).await
    }

    /// Jobs whose run time has arrived, oldest first
    pub async fn due(&self, limit: usize) -> Result<Vec<Job>> {
        self.db.due_jobs(Utc::now().timestamp(), limit).await
    }

    pub async fn get(&self, post_id: &str) -> Result<Option<Job>> {
        self.db.get_job(post_id).await
    }

    pub async fn all(&self) -> Result<Vec<Job>> {
        self.db.all_jobs().await
    }

    /// The job ran to completion; drop it.
    pub async fn complete(&self, post_id: &str) -> Result<()> {
        self.db.complete_job(post_id).await
    }

    /// The job failed with a system error. Re-arm it with exponential
    /// backoff, or park it once attempts are exhausted.
    pub async fn record_failure(&self, job: &Job, error: &str) -> Result<()> {
        let attempts = job.attempts + 1;

        if attempts >= i64::from(self.policy.max_attempts) {
            warn!(
                post_id = %job.post_id,
                attempts,
                error,
                "publish job exhausted its retries, parking for manual intervention"
            );
            self.db
                .update_job_failure(&job.post_id, None, attempts, error)
                .await
        } else {
            let delay = self.policy.backoff_secs(attempts as u32);
            let next_run = Utc::now().timestamp() + delay;
            warn!(
                post_id = %job.post_id,
                attempts,
                delay,
                error,
                "publish job failed, retrying with backoff"
            );
            self.db
                .update_job_failure(&job.post_id, Some(next_run), attempts, error)
                .await
        }
    }
}
