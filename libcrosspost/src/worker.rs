//! Queue worker
//!
//! Drains due publish jobs and hands each to the executor. Several workers
//! may run against the same database; delivery is at-least-once, and the
//! executor's per-destination claim makes a double-dequeue harmless.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::executor::PublishExecutor;
use crate::queue::JobQueue;

pub struct Worker {
    queue: JobQueue,
    executor: Arc<PublishExecutor>,
    batch_size: usize,
}

impl Worker {
    pub fn new(queue: JobQueue, executor: Arc<PublishExecutor>, batch_size: usize) -> Self {
        Self {
            queue,
            executor,
            batch_size,
        }
    }

    /// Process one batch of due jobs. Returns how many jobs were picked up.
    pub async fn tick(&self) -> Result<usize> {
        let jobs = self.queue.due(self.batch_size).await?;
        if jobs.is_empty() {
            return Ok(0);
        }

        info!(count = jobs.len(), "processing due publish jobs");

        for job in &jobs {
            debug!(post_id = %job.post_id, attempt = job.attempts + 1, "executing publish job");

            match self.executor.execute(&job.post_id).await {
                Ok(_) => {
                    self.queue.complete(&job.post_id).await?;
                }
                Err(crate::CrosspostError::InvalidInput(message)) => {
                    // Typically a post deleted after its job was fetched;
                    // retrying cannot help
                    warn!(post_id = %job.post_id, error = %message, "dropping unprocessable job");
                    self.queue.complete(&job.post_id).await?;
                }
                Err(e) => {
                    error!(post_id = %job.post_id, error = %e, "publish job failed");
                    self.queue.record_failure(job, &e.to_string()).await?;
                }
            }
        }

        Ok(jobs.len())
    }

    /// Poll until the shutdown flag is raised. The sleep is chopped into
    /// one-second slices so a signal is honored promptly.
    pub async fn run(&self, poll_interval: u64, shutdown: Arc<AtomicBool>) -> Result<()> {
        loop {
            if shutdown.load(Ordering::Relaxed) {
                info!("shutdown requested, stopping worker loop");
                break;
            }

            if let Err(e) = self.tick().await {
                error!("worker tick failed: {}", e);
            }

            for _ in 0..poll_interval {
                if shutdown.load(Ordering::Relaxed) {
                    break;
                }
                sleep(Duration::from_secs(1)).await;
            }
        }

        Ok(())
    }
}
