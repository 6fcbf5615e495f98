//! The single background worker that drives jobs through their lifecycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::notify::Notifier;
use crate::queue::SubmissionQueue;
use crate::record::{JobRecord, JobState};
use crate::table::{Advance, JobTable, Settle};

/// Tuning knobs for the worker loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Longest single wait on an empty queue before re-checking shutdown.
    pub dequeue_wait: Duration,
    /// Lower bound for the interval between progress updates.
    pub min_tick: Duration,
    /// Failed jobs are re-queued forever when `None`; otherwise a job is
    /// archived in `Error` after failing more than this many retries.
    pub max_job_retries: Option<u32>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            dequeue_wait: Duration::from_secs(1),
            min_tick: Duration::from_secs(1),
            max_job_retries: None,
        }
    }
}

/// Handle to the spawned worker.
#[derive(Debug)]
pub struct EngineHandle {
    shutdown: CancellationToken,
    join: JoinHandle<()>,
}

impl EngineHandle {
    /// Signal the worker to stop and wait for it to exit.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        if let Err(e) = self.join.await {
            warn!(error = %e, "processing engine task ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

/// Clears the running flag when the worker exits, including by panic.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Dequeues one job at a time and runs it to a terminal state.
pub(crate) struct ProcessingEngine {
    table: JobTable,
    queue: SubmissionQueue,
    notifier: Notifier,
    config: EngineConfig,
    /// Cleared when the worker exits so a new one may be spawned.
    running: Arc<AtomicBool>,
}

impl ProcessingEngine {
    pub(crate) fn new(
        table: JobTable,
        queue: SubmissionQueue,
        notifier: Notifier,
        config: EngineConfig,
        running: Arc<AtomicBool>,
    ) -> Self {
        Self {
            table,
            queue,
            notifier,
            config,
            running,
        }
    }

    pub(crate) fn spawn(self, shutdown: CancellationToken) -> EngineHandle {
        let join = tokio::spawn(self.run(shutdown.clone()));
        EngineHandle { shutdown, join }
    }

    async fn run(self, shutdown: CancellationToken) {
        let _running = RunningGuard(self.running.clone());
        info!("processing engine started");
        loop {
            let next = tokio::select! {
                _ = shutdown.cancelled() => break,
                next = self.queue.dequeue(self.config.dequeue_wait) => next,
            };
            let Some(job_id) = next else {
                continue;
            };
            self.process(&job_id, &shutdown).await;
        }
        info!("processing engine stopped");
    }

    async fn process(&self, job_id: &str, shutdown: &CancellationToken) {
        let Some(job) = self.table.begin(job_id, Instant::now()).await else {
            // Removed, cancelled or reset after it was queued.
            debug!(job_id, "discarding stale queue entry");
            return;
        };
        info!(
            job_id,
            client_id = %job.client_id,
            delay_secs = job.delay_secs,
            error_rate = job.error_rate,
            "job started"
        );

        let Some(finished) = self.run_to_terminal(&job, shutdown).await else {
            return;
        };

        if let Some(target) = finished.callback_target.as_deref() {
            self.notify(target, &finished).await;
        }

        match finished.state {
            JobState::Completed => {
                if self.table.settle_completed(job_id).await.is_some() {
                    info!(job_id, client_id = %finished.client_id, "job archived as completed");
                } else {
                    debug!(job_id, "completed job vanished before archiving");
                }
            }
            JobState::Error => {
                match self
                    .table
                    .settle_failed(job_id, self.config.max_job_retries)
                    .await
                {
                    Settle::Requeue => {
                        self.queue.enqueue(job_id);
                        info!(job_id, failures = finished.failures, "failed job re-queued");
                    }
                    Settle::Archived => {
                        warn!(job_id, failures = finished.failures, "retry limit reached, job archived as error");
                    }
                    Settle::Skipped => {
                        debug!(job_id, "failed job changed while notifying, leaving it alone");
                    }
                }
            }
            _ => {}
        }
    }

    /// Tick the job until it completes or fails.
    ///
    /// Returns `None` when the job was cancelled, reset or cleared underneath
    /// us, or on shutdown. A job interrupted by shutdown stays `Running`; state
    /// does not outlive the process.
    async fn run_to_terminal(
        &self,
        job: &JobRecord,
        shutdown: &CancellationToken,
    ) -> Option<JobRecord> {
        let cadence = job.poll_interval(self.config.min_tick);
        loop {
            let roll: f64 = rand::random();
            let advance = self.table.advance(&job.id, Instant::now(), roll).await;
            match &advance {
                Advance::Abandoned => {
                    info!(job_id = %job.id, "job no longer running, abandoning it");
                    return None;
                }
                Advance::Running(progress) => {
                    debug!(job_id = %job.id, progress, "job progress");
                }
                Advance::Finished(snapshot) if snapshot.state == JobState::Error => {
                    warn!(job_id = %job.id, progress = snapshot.progress, "simulated processing error");
                }
                Advance::Finished(_) => {
                    info!(job_id = %job.id, "job completed");
                }
            }

            tokio::select! {
                _ = shutdown.cancelled() => return None,
                _ = tokio::time::sleep(cadence) => {}
            }

            if let Advance::Finished(snapshot) = advance {
                return Some(snapshot);
            }
        }
    }

    async fn notify(&self, target: &str, job: &JobRecord) {
        let payload = match serde_json::to_value(job) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "could not serialize job for callback");
                return;
            }
        };
        if !self.notifier.notify(target, &payload).await {
            warn!(
                job_id = %job.id,
                callback = %target,
                "callback notification failed; job state is unaffected"
            );
        }
    }
}
