//! Worker pool and stuck-job reaper.
//!
//! Each worker is an independent tokio task looping claim → process →
//! backoff. While a job runs, a scoped heartbeat task refreshes
//! `heartbeat_at` every five seconds and mirrors the queue's cancellation
//! flag into an atomic the pipeline checks at phase boundaries; the task is
//! aborted on every exit path. The reaper sweeps the started set once a
//! minute and returns silent jobs to the queue until their attempts run
//! out.

use crate::config::Config;
use crate::error::CaseStrainerError;
use crate::pipeline::Pipeline;
use crate::progress::ResultStore;
use crate::queue::JobQueue;
use crate::types::{Job, JobPhase};
use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Backoff between claim attempts when the queue is empty.
const IDLE_BACKOFF: Duration = Duration::from_millis(500);

/// Reaper sweep cadence.
const REAPER_INTERVAL: Duration = Duration::from_secs(60);

/// A started job is reaped after this many claims.
const MAX_ATTEMPTS: u32 = 3;

/// Shared dependencies for workers and the reaper.
#[derive(Clone)]
pub struct WorkerContext {
    pub config: Arc<Config>,
    pub queue: Arc<dyn JobQueue>,
    pub store: Arc<ResultStore>,
    pub pipeline: Arc<Pipeline>,
}

/// Spawn the configured number of workers plus the reaper. Tasks stop when
/// `shutdown` flips to true.
pub fn spawn_workers(
    ctx: &WorkerContext,
    shutdown: &watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::with_capacity(ctx.config.worker_count + 1);
    for n in 0..ctx.config.worker_count {
        let ctx = ctx.clone();
        let shutdown = shutdown.clone();
        let worker_id = format!("worker-{n}");
        handles.push(tokio::spawn(async move {
            worker_loop(&worker_id, &ctx, shutdown).await;
        }));
    }
    let ctx = ctx.clone();
    let shutdown = shutdown.clone();
    handles.push(tokio::spawn(async move {
        reaper_loop(&ctx, shutdown).await;
    }));
    handles
}

async fn worker_loop(worker_id: &str, ctx: &WorkerContext, mut shutdown: watch::Receiver<bool>) {
    info!(worker_id, "worker started");
    loop {
        if *shutdown.borrow() {
            break;
        }
        match ctx.queue.claim(worker_id).await {
            Ok(Some(job)) => {
                process_job(worker_id, ctx, job).await;
            }
            Ok(None) => {
                tokio::select! {
                    () = tokio::time::sleep(IDLE_BACKOFF) => {}
                    _ = shutdown.changed() => break,
                }
            }
            Err(e) => {
                error!(worker_id, error = %e, "claim failed, backing off");
                tokio::select! {
                    () = tokio::time::sleep(IDLE_BACKOFF * 5) => {}
                    _ = shutdown.changed() => break,
                }
            }
        }
    }
    info!(worker_id, "worker stopped");
}

/// Run one claimed job through the pipeline, publishing progress and
/// honoring cancellation.
pub async fn process_job(worker_id: &str, ctx: &WorkerContext, job: Job) {
    let job_id = job.id.clone();
    info!(worker_id, job_id = %job_id, attempts = job.attempts, "job started");

    let cancel = Arc::new(AtomicBool::new(false));

    // Scoped heartbeat: refresh the queue record and mirror the
    // cancellation flag until the guard aborts it.
    let heartbeat = {
        let queue = Arc::clone(&ctx.queue);
        let cancel = Arc::clone(&cancel);
        let id = job_id.clone();
        let interval = ctx.config.heartbeat_interval();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if let Err(e) = queue.heartbeat(&id).await {
                    warn!(job_id = %id, error = %e, "heartbeat failed");
                }
                match queue.is_cancel_requested(&id).await {
                    Ok(true) => cancel.store(true, Ordering::Relaxed),
                    Ok(false) => {}
                    Err(e) => warn!(job_id = %id, error = %e, "cancel poll failed"),
                }
            }
        })
    };

    // Progress publication crosses from the pipeline's sync callback into
    // the async queue through a channel drained by a forwarder task.
    let (progress_tx, mut progress_rx) = tokio::sync::mpsc::unbounded_channel::<(JobPhase, u8)>();
    let forwarder = {
        let queue = Arc::clone(&ctx.queue);
        let id = job_id.clone();
        tokio::spawn(async move {
            while let Some((phase, percent)) = progress_rx.recv().await {
                if let Err(e) = queue.update_progress(&id, phase, percent).await {
                    warn!(job_id = %id, error = %e, "progress update failed");
                }
            }
        })
    };

    let mut publish = |phase: JobPhase, percent: u8| {
        let _ = progress_tx.send((phase, percent));
    };
    let outcome = ctx
        .pipeline
        .run(&job.text, job.source_url.as_deref(), &cancel, &mut publish)
        .await;
    drop(progress_tx);
    let _ = forwarder.await;
    heartbeat.abort();

    match outcome {
        Ok(result) => match ctx.store.put(result) {
            Ok(result_id) => {
                if let Err(e) = ctx.queue.finish(&job_id, &result_id).await {
                    error!(job_id = %job_id, error = %e, "finish failed");
                }
                info!(worker_id, job_id = %job_id, result_id = %result_id, "job finished");
            }
            Err(e) => {
                let _ = ctx.queue.fail(&job_id, &format!("result store: {e}")).await;
                error!(job_id = %job_id, error = %e, "result write failed");
            }
        },
        Err(CaseStrainerError::JobCanceled) => {
            if let Err(e) = ctx.queue.mark_canceled(&job_id).await {
                error!(job_id = %job_id, error = %e, "cancel transition failed");
            }
            info!(worker_id, job_id = %job_id, "job canceled");
        }
        Err(e) => {
            let message = format!("{}: {e}", e.code());
            if let Err(e2) = ctx.queue.fail(&job_id, &message).await {
                error!(job_id = %job_id, error = %e2, "fail transition failed");
            }
            warn!(worker_id, job_id = %job_id, error = %e, "job failed");
        }
    }
}

/// One reaper sweep: requeue started jobs whose heartbeat went silent,
/// failing them once their attempts are spent. Returns how many jobs were
/// touched.
pub async fn reap_stuck_jobs(
    queue: &dyn JobQueue,
    stuck_threshold: Duration,
    max_attempts: u32,
) -> Result<usize, CaseStrainerError> {
    let started = queue.iterate_started().await?;
    let mut touched = 0;
    for job in started {
        let Some(heartbeat_at) = job.heartbeat_at else {
            continue;
        };
        let silent = Utc::now()
            .signed_duration_since(heartbeat_at)
            .to_std()
            .unwrap_or_default();
        if silent <= stuck_threshold {
            continue;
        }
        touched += 1;
        if job.attempts >= max_attempts {
            warn!(job_id = %job.id, attempts = job.attempts, "stuck job failed for good");
            queue
                .fail(&job.id, "job stuck: heartbeat silent past threshold")
                .await?;
        } else {
            warn!(
                job_id = %job.id,
                attempts = job.attempts,
                silent_s = silent.as_secs(),
                "stuck job returned to queue"
            );
            queue.requeue(&job.id).await?;
        }
    }
    Ok(touched)
}

async fn reaper_loop(ctx: &WorkerContext, mut shutdown: watch::Receiver<bool>) {
    let threshold = ctx.config.stuck_threshold();
    loop {
        tokio::select! {
            () = tokio::time::sleep(REAPER_INTERVAL) => {}
            _ = shutdown.changed() => break,
        }
        if *shutdown.borrow() {
            break;
        }
        match reap_stuck_jobs(ctx.queue.as_ref(), threshold, MAX_ATTEMPTS).await {
            Ok(0) => {}
            Ok(n) => debug!(reaped = n, "reaper sweep"),
            Err(e) => error!(error = %e, "reaper sweep failed"),
        }
        // Results expire on the same cadence.
        if let Err(e) = ctx.store.sweep() {
            error!(error = %e, "result sweep failed");
        }
    }
}
