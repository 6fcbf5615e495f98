//! Public facade over the job table, the submission queue and the engine.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

use crate::engine::{EngineConfig, EngineHandle, ProcessingEngine};
use crate::error::JobError;
use crate::notify::Notifier;
use crate::queue::SubmissionQueue;
use crate::record::{validate_delay, validate_error_rate, JobRecord, SimulationParams};
use crate::table::JobTable;
use crate::view::ClientJobView;

/// Settings for a [`JobService`].
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    /// Parameters applied to new jobs until changed with `set_params`.
    pub defaults: SimulationParams,
    /// Draw each new job's delay uniformly from 5..=15 seconds instead of
    /// using the configured delay.
    pub randomize_delay: bool,
    pub engine: EngineConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            defaults: SimulationParams::default(),
            randomize_delay: false,
            engine: EngineConfig::default(),
        }
    }
}

/// Entry point for submitting, inspecting and controlling jobs.
///
/// Cheap to clone; clones share the same table, queue and parameters.
#[derive(Debug, Clone)]
pub struct JobService {
    table: JobTable,
    queue: SubmissionQueue,
    notifier: Notifier,
    params: Arc<RwLock<SimulationParams>>,
    randomize_delay: bool,
    engine: EngineConfig,
    engine_running: Arc<AtomicBool>,
}

impl JobService {
    pub fn new(config: ServiceConfig, notifier: Notifier) -> Self {
        Self {
            table: JobTable::new(),
            queue: SubmissionQueue::new(),
            notifier,
            params: Arc::new(RwLock::new(config.defaults)),
            randomize_delay: config.randomize_delay,
            engine: config.engine,
            engine_running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start the single processing engine.
    ///
    /// Only one engine may run per service; a second call fails until the
    /// first has shut down.
    pub fn spawn_engine(&self, shutdown: CancellationToken) -> Result<EngineHandle, JobError> {
        if self
            .engine_running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(JobError::EngineAlreadyRunning);
        }
        let engine = ProcessingEngine::new(
            self.table.clone(),
            self.queue.clone(),
            self.notifier.clone(),
            self.engine.clone(),
            self.engine_running.clone(),
        );
        Ok(engine.spawn(shutdown))
    }

    /// Create a job for `client_id` and queue it.
    ///
    /// A fresh UUID is used when `job_id` is `None`. The job takes the current
    /// simulation parameters.
    pub async fn submit_job(
        &self,
        client_id: &str,
        job_id: Option<String>,
        callback_target: Option<String>,
    ) -> Result<JobRecord, JobError> {
        if client_id.trim().is_empty() {
            return Err(JobError::MissingClient);
        }
        let id = match job_id {
            Some(id) if !id.is_empty() => id,
            _ => Uuid::new_v4().to_string(),
        };

        let mut params = self.params();
        if self.randomize_delay {
            params.delay_secs = f64::from(rand::rng().random_range(5..=15u32));
        }

        let job = self
            .table
            .put(JobRecord::new(id, client_id, params, callback_target))
            .await?;
        self.queue.enqueue(job.id.clone());
        info!(
            job_id = %job.id,
            client_id,
            delay_secs = job.delay_secs,
            error_rate = job.error_rate,
            "job submitted"
        );
        Ok(job)
    }

    /// Cancel a queued, running or failed job and archive it.
    pub async fn cancel_job(&self, job_id: &str) -> Result<JobRecord, JobError> {
        let job = self.table.cancel(job_id).await?;
        self.queue.remove(job_id);
        info!(job_id, client_id = %job.client_id, "job cancelled");
        Ok(job)
    }

    pub async fn get_status(&self, job_id: &str) -> Result<JobRecord, JobError> {
        self.table.get(job_id).await
    }

    /// Every known job, live or archived, keyed by id.
    pub async fn all_statuses(&self) -> BTreeMap<String, JobRecord> {
        self.table.snapshot().await
    }

    /// Live jobs of one client in submission order.
    pub async fn status_by_client(&self, client_id: &str) -> Result<Vec<JobRecord>, JobError> {
        self.table.list_by_client(client_id).await
    }

    /// Archived jobs in the order they finished.
    pub async fn list_completed(&self, client_id: Option<&str>) -> Result<Vec<JobRecord>, JobError> {
        self.table.list_archived(client_id).await
    }

    /// Put a job back to `Queued`, optionally with new parameters.
    pub async fn reset_job(
        &self,
        job_id: &str,
        delay_secs: Option<f64>,
        error_rate: Option<f64>,
    ) -> Result<JobRecord, JobError> {
        if let Some(delay) = delay_secs {
            validate_delay(delay)?;
        }
        if let Some(rate) = error_rate {
            validate_error_rate(rate)?;
        }
        let (job, needs_enqueue) = self.table.reset(job_id, delay_secs, error_rate).await?;
        if needs_enqueue {
            self.queue.enqueue(job_id);
        }
        info!(job_id, delay_secs = job.delay_secs, error_rate = job.error_rate, "job reset");
        Ok(job)
    }

    /// Forget every job and drain the queue.
    ///
    /// A job the engine is running at the time is abandoned on its next tick.
    pub async fn reset_all(&self) {
        self.table.clear_all().await;
        self.queue.clear();
        info!("all jobs cleared");
    }

    /// Replace the parameters used for new jobs. Existing jobs keep theirs.
    pub fn set_params(&self, delay_secs: f64, error_rate: f64) -> Result<SimulationParams, JobError> {
        let params = SimulationParams::new(delay_secs, error_rate)?;
        *self.params.write().unwrap_or_else(PoisonError::into_inner) = params;
        info!(delay_secs, error_rate, "simulation parameters updated");
        Ok(params)
    }

    pub fn params(&self) -> SimulationParams {
        *self.params.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of ids waiting in the submission queue.
    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    /// A polling view for clients that cannot receive callbacks.
    pub fn view(&self, poll_interval: Duration, max_wait: Duration) -> ClientJobView {
        ClientJobView::new(self.clone(), poll_interval, max_wait)
    }
}
