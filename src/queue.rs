//! Job queue collaborator.
//!
//! The dispatcher and workers speak to the queue through the `JobQueue`
//! trait: at-least-once delivery with idempotent finish/fail, an atomic
//! claim that moves a job from the queued set into the started set, and
//! enough read surface for the status endpoint and the stuck-job reaper.
//! `MemoryQueue` is the in-process implementation backed by a single-writer
//! key-value map; it is both the production default and the test double.

use crate::error::CaseStrainerError;
use crate::types::{Job, JobPhase, JobStatus};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use tracing::debug;

pub type QueueResult<T> = Result<T, CaseStrainerError>;

/// Queue operations per the collaborator contract.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Persist a new job in the queued set; returns its id.
    async fn enqueue(&self, job: Job) -> QueueResult<String>;

    /// Atomically pop the oldest queued job into the started set.
    async fn claim(&self, worker_id: &str) -> QueueResult<Option<Job>>;

    /// Read a job record by id.
    async fn get(&self, id: &str) -> QueueResult<Option<Job>>;

    /// Refresh `heartbeat_at` for a started job.
    async fn heartbeat(&self, id: &str) -> QueueResult<()>;

    /// Publish phase and percent for a running job.
    async fn update_progress(&self, id: &str, phase: JobPhase, percent: u8) -> QueueResult<()>;

    /// Mark finished with its result reference. Idempotent.
    async fn finish(&self, id: &str, result_id: &str) -> QueueResult<()>;

    /// Mark failed with a short message. Idempotent.
    async fn fail(&self, id: &str, error: &str) -> QueueResult<()>;

    /// Request cancellation: queued jobs cancel immediately, started jobs
    /// get the cooperative flag set.
    async fn cancel(&self, id: &str) -> QueueResult<()>;

    /// Whether cancellation was requested for a job.
    async fn is_cancel_requested(&self, id: &str) -> QueueResult<bool>;

    /// Snapshot of every started job, for the reaper.
    async fn iterate_started(&self) -> QueueResult<Vec<Job>>;

    /// Return a stuck job to the queued set, bumping its attempt count.
    async fn requeue(&self, id: &str) -> QueueResult<()>;

    /// Complete a cooperative cancellation: the owning worker marks the job
    /// canceled at a phase boundary. Idempotent.
    async fn mark_canceled(&self, id: &str) -> QueueResult<()>;
}

#[derive(Default)]
struct QueueInner {
    /// FIFO of queued job ids
    queued: VecDeque<String>,
    /// All job records, keyed by id
    jobs: HashMap<String, Job>,
}

/// In-memory single-writer queue.
pub struct MemoryQueue {
    name: String,
    inner: Mutex<QueueInner>,
}

impl MemoryQueue {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            inner: Mutex::new(QueueInner::default()),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> QueueResult<std::sync::MutexGuard<'_, QueueInner>> {
        self.inner
            .lock()
            .map_err(|_| CaseStrainerError::StoreUnavailable("queue lock poisoned".into()))
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn enqueue(&self, job: Job) -> QueueResult<String> {
        let id = job.id.clone();
        let mut inner = self.lock()?;
        inner.queued.push_back(id.clone());
        inner.jobs.insert(id.clone(), job);
        debug!(queue = %self.name, job_id = %id, "enqueued");
        Ok(id)
    }

    async fn claim(&self, worker_id: &str) -> QueueResult<Option<Job>> {
        let mut inner = self.lock()?;
        while let Some(id) = inner.queued.pop_front() {
            let Some(job) = inner.jobs.get_mut(&id) else {
                continue;
            };
            // Jobs canceled while queued stay out of the started set.
            if job.status != JobStatus::Queued {
                continue;
            }
            let now = Utc::now();
            job.status = JobStatus::Started;
            job.started_at = Some(now);
            job.heartbeat_at = Some(now);
            job.attempts += 1;
            debug!(queue = %self.name, job_id = %id, worker_id, "claimed");
            return Ok(Some(job.clone()));
        }
        Ok(None)
    }

    async fn get(&self, id: &str) -> QueueResult<Option<Job>> {
        Ok(self.lock()?.jobs.get(id).cloned())
    }

    async fn heartbeat(&self, id: &str) -> QueueResult<()> {
        let mut inner = self.lock()?;
        if let Some(job) = inner.jobs.get_mut(id) {
            if job.status == JobStatus::Started {
                job.heartbeat_at = Some(Utc::now());
            }
        }
        Ok(())
    }

    async fn update_progress(&self, id: &str, phase: JobPhase, percent: u8) -> QueueResult<()> {
        let mut inner = self.lock()?;
        if let Some(job) = inner.jobs.get_mut(id) {
            if job.status == JobStatus::Started {
                job.phase = phase;
                job.percent = percent.min(100);
            }
        }
        Ok(())
    }

    async fn finish(&self, id: &str, result_id: &str) -> QueueResult<()> {
        let mut inner = self.lock()?;
        if let Some(job) = inner.jobs.get_mut(id) {
            if job.status.is_terminal() {
                return Ok(());
            }
            job.status = JobStatus::Finished;
            job.phase = JobPhase::Done;
            job.percent = 100;
            job.result_id = Some(result_id.to_string());
            job.ended_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn fail(&self, id: &str, error: &str) -> QueueResult<()> {
        let mut inner = self.lock()?;
        if let Some(job) = inner.jobs.get_mut(id) {
            if job.status.is_terminal() {
                return Ok(());
            }
            job.status = JobStatus::Failed;
            job.error = Some(error.to_string());
            job.ended_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn cancel(&self, id: &str) -> QueueResult<()> {
        let mut inner = self.lock()?;
        if let Some(job) = inner.jobs.get_mut(id) {
            match job.status {
                JobStatus::Queued => {
                    job.status = JobStatus::Canceled;
                    job.ended_at = Some(Utc::now());
                }
                JobStatus::Started => {
                    job.cancel_requested = true;
                }
                _ => {}
            }
        }
        Ok(())
    }

    async fn is_cancel_requested(&self, id: &str) -> QueueResult<bool> {
        Ok(self
            .lock()?
            .jobs
            .get(id)
            .is_some_and(|j| j.cancel_requested))
    }

    async fn iterate_started(&self) -> QueueResult<Vec<Job>> {
        Ok(self
            .lock()?
            .jobs
            .values()
            .filter(|j| j.status == JobStatus::Started)
            .cloned()
            .collect())
    }

    async fn requeue(&self, id: &str) -> QueueResult<()> {
        let mut inner = self.lock()?;
        if let Some(job) = inner.jobs.get_mut(id) {
            if job.status != JobStatus::Started {
                return Ok(());
            }
            job.status = JobStatus::Queued;
            job.phase = JobPhase::Initializing;
            job.percent = 0;
            job.started_at = None;
            job.heartbeat_at = None;
            inner.queued.push_back(id.to_string());
            debug!(queue = %self.name, job_id = %id, "requeued");
        }
        Ok(())
    }

    async fn mark_canceled(&self, id: &str) -> QueueResult<()> {
        let mut inner = self.lock()?;
        if let Some(job) = inner.jobs.get_mut(id) {
            if !job.status.is_terminal() {
                job.status = JobStatus::Canceled;
                job.ended_at = Some(Utc::now());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
impl MemoryQueue {
    /// Age a started job's heartbeat, for reaper tests.
    pub fn backdate_heartbeat(&self, id: &str, age: std::time::Duration) {
        let mut inner = self.inner.lock().expect("queue lock");
        if let Some(job) = inner.jobs.get_mut(id) {
            job.heartbeat_at =
                Some(Utc::now() - chrono::Duration::from_std(age).expect("age fits"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(id: &str) -> Job {
        Job::new(id.to_string(), "See 123 F.3d 456.".to_string(), None)
    }

    #[tokio::test]
    async fn claim_is_fifo() {
        let q = MemoryQueue::new("casestrainer");
        q.enqueue(job("a")).await.unwrap();
        q.enqueue(job("b")).await.unwrap();
        assert_eq!(q.claim("w1").await.unwrap().unwrap().id, "a");
        assert_eq!(q.claim("w1").await.unwrap().unwrap().id, "b");
        assert!(q.claim("w1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn claim_moves_job_into_started() {
        let q = MemoryQueue::new("casestrainer");
        q.enqueue(job("a")).await.unwrap();
        let claimed = q.claim("w1").await.unwrap().unwrap();
        assert_eq!(claimed.status, JobStatus::Started);
        assert_eq!(claimed.attempts, 1);
        assert!(claimed.heartbeat_at.is_some());
        assert_eq!(q.iterate_started().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn finish_is_idempotent() {
        let q = MemoryQueue::new("casestrainer");
        q.enqueue(job("a")).await.unwrap();
        q.claim("w1").await.unwrap();
        q.finish("a", "r1").await.unwrap();
        q.finish("a", "r2").await.unwrap();
        let done = q.get("a").await.unwrap().unwrap();
        assert_eq!(done.status, JobStatus::Finished);
        assert_eq!(done.result_id.as_deref(), Some("r1"));
        assert_eq!(done.percent, 100);
    }

    #[tokio::test]
    async fn fail_does_not_overwrite_finished() {
        let q = MemoryQueue::new("casestrainer");
        q.enqueue(job("a")).await.unwrap();
        q.claim("w1").await.unwrap();
        q.finish("a", "r1").await.unwrap();
        q.fail("a", "boom").await.unwrap();
        assert_eq!(
            q.get("a").await.unwrap().unwrap().status,
            JobStatus::Finished
        );
    }

    #[tokio::test]
    async fn canceling_a_queued_job_is_immediate() {
        let q = MemoryQueue::new("casestrainer");
        q.enqueue(job("a")).await.unwrap();
        q.cancel("a").await.unwrap();
        assert_eq!(
            q.get("a").await.unwrap().unwrap().status,
            JobStatus::Canceled
        );
        // The canceled job never reaches a worker.
        assert!(q.claim("w1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn canceling_a_started_job_sets_the_flag() {
        let q = MemoryQueue::new("casestrainer");
        q.enqueue(job("a")).await.unwrap();
        q.claim("w1").await.unwrap();
        q.cancel("a").await.unwrap();
        assert!(q.is_cancel_requested("a").await.unwrap());
        assert_eq!(
            q.get("a").await.unwrap().unwrap().status,
            JobStatus::Started
        );
    }

    #[tokio::test]
    async fn requeue_bumps_attempts_and_returns_to_fifo() {
        let q = MemoryQueue::new("casestrainer");
        q.enqueue(job("a")).await.unwrap();
        q.claim("w1").await.unwrap();
        q.requeue("a").await.unwrap();
        let back = q.get("a").await.unwrap().unwrap();
        assert_eq!(back.status, JobStatus::Queued);
        assert!(back.heartbeat_at.is_none());
        let reclaimed = q.claim("w2").await.unwrap().unwrap();
        assert_eq!(reclaimed.attempts, 2);
    }

    #[tokio::test]
    async fn progress_updates_are_visible() {
        let q = MemoryQueue::new("casestrainer");
        q.enqueue(job("a")).await.unwrap();
        q.claim("w1").await.unwrap();
        q.update_progress("a", JobPhase::Clustering, 55).await.unwrap();
        let j = q.get("a").await.unwrap().unwrap();
        assert_eq!(j.phase, JobPhase::Clustering);
        assert_eq!(j.percent, 55);
    }
}
