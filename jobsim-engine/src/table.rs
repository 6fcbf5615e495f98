//! Shared job table.
//!
//! Every read and write goes through one `RwLock`: writers are exclusive across
//! the whole table, and readers clone a consistent snapshot before the guard is
//! released, so a status query never sees a half-applied transition.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::error::JobError;
use crate::record::{JobRecord, JobState, Tick};

/// Result of advancing a running job by one tick.
#[derive(Debug, Clone)]
pub(crate) enum Advance {
    /// The job was removed, cancelled or reset since the engine started it.
    Abandoned,
    Running(u8),
    /// The job reached `Completed` or `Error`; carries a snapshot.
    Finished(JobRecord),
}

/// What happened to a failed job after its notification went out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Settle {
    /// Reset to `Queued`; the caller must push the id back onto the queue.
    Requeue,
    /// Retry limit reached; archived in `Error`.
    Archived,
    /// The record changed meanwhile (reset, cancelled or cleared).
    Skipped,
}

/// Internal storage.
#[derive(Debug, Default)]
struct TableState {
    /// Live (non-archived) jobs by id.
    live: HashMap<String, JobRecord>,
    /// Client id -> live job ids in submission order.
    active: HashMap<String, Vec<String>>,
    /// Jobs that left the live set, in archival order.
    archive: Vec<JobRecord>,
}

impl TableState {
    fn insert(&mut self, job: JobRecord) -> Result<(), JobError> {
        if self.live.contains_key(&job.id) {
            return Err(JobError::DuplicateId(job.id));
        }
        self.active
            .entry(job.client_id.clone())
            .or_default()
            .push(job.id.clone());
        self.live.insert(job.id.clone(), job);
        Ok(())
    }

    /// Remove a live job and drop it from its client's active list.
    fn detach(&mut self, id: &str) -> Option<JobRecord> {
        let job = self.live.remove(id)?;
        if let Some(ids) = self.active.get_mut(&job.client_id) {
            ids.retain(|other| other != id);
        }
        Some(job)
    }

    fn archive(&mut self, id: &str) -> Option<JobRecord> {
        let job = self.detach(id)?;
        self.archive.push(job.clone());
        Some(job)
    }

    fn find(&self, id: &str) -> Option<&JobRecord> {
        self.live
            .get(id)
            .or_else(|| self.archive.iter().rev().find(|job| job.id == id))
    }

    fn live_mut(&mut self, id: &str) -> Result<&mut JobRecord, JobError> {
        self.live
            .get_mut(id)
            .ok_or_else(|| JobError::NotFound(id.to_string()))
    }

    fn knows_client(&self, client_id: &str) -> bool {
        self.active.contains_key(client_id)
    }

    fn clear(&mut self) {
        self.live.clear();
        self.active.clear();
        self.archive.clear();
    }
}

/// Concurrent-safe store of live jobs, per-client indices and the archive.
#[derive(Clone, Default)]
pub struct JobTable {
    state: Arc<RwLock<TableState>>,
}

impl fmt::Debug for JobTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobTable")
            .field("state", &"<RwLock<TableState>>")
            .finish()
    }
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new live job. Fails if a live job already uses the id.
    pub async fn put(&self, job: JobRecord) -> Result<JobRecord, JobError> {
        let mut state = self.state.write().await;
        state.insert(job.clone())?;
        Ok(job)
    }

    /// Look up a job, preferring the live record over an archived one.
    pub async fn get(&self, id: &str) -> Result<JobRecord, JobError> {
        let state = self.state.read().await;
        state
            .find(id)
            .cloned()
            .ok_or_else(|| JobError::NotFound(id.to_string()))
    }

    /// Every known job by id, live records shadowing archived ones.
    pub async fn snapshot(&self) -> BTreeMap<String, JobRecord> {
        let state = self.state.read().await;
        let mut all: BTreeMap<String, JobRecord> = state
            .archive
            .iter()
            .map(|job| (job.id.clone(), job.clone()))
            .collect();
        all.extend(
            state
                .live
                .iter()
                .map(|(id, job)| (id.clone(), job.clone())),
        );
        all
    }

    /// Live jobs of a client in submission order.
    pub async fn list_by_client(&self, client_id: &str) -> Result<Vec<JobRecord>, JobError> {
        let state = self.state.read().await;
        let ids = state
            .active
            .get(client_id)
            .ok_or_else(|| JobError::ClientNotFound(client_id.to_string()))?;
        Ok(ids
            .iter()
            .filter_map(|id| state.live.get(id))
            .cloned()
            .collect())
    }

    /// Archived jobs in archival order, optionally for one client.
    pub async fn list_archived(&self, client_id: Option<&str>) -> Result<Vec<JobRecord>, JobError> {
        let state = self.state.read().await;
        match client_id {
            Some(client) => {
                if !state.knows_client(client) {
                    return Err(JobError::ClientNotFound(client.to_string()));
                }
                Ok(state
                    .archive
                    .iter()
                    .filter(|job| job.client_id == client)
                    .cloned()
                    .collect())
            }
            None => Ok(state.archive.clone()),
        }
    }

    /// Move a live job to the archive as-is.
    pub async fn move_to_archive(&self, id: &str) -> Result<JobRecord, JobError> {
        let mut state = self.state.write().await;
        state
            .archive(id)
            .ok_or_else(|| JobError::NotFound(id.to_string()))
    }

    /// Drop a live job without archiving it.
    pub async fn remove(&self, id: &str) -> Result<JobRecord, JobError> {
        let mut state = self.state.write().await;
        state
            .detach(id)
            .ok_or_else(|| JobError::NotFound(id.to_string()))
    }

    /// Forget every job, client and archived record.
    pub async fn clear_all(&self) {
        let mut state = self.state.write().await;
        state.clear();
    }

    /// Number of jobs currently `Running`.
    pub async fn running_count(&self) -> usize {
        let state = self.state.read().await;
        state
            .live
            .values()
            .filter(|job| job.state == JobState::Running)
            .count()
    }

    /// Cancel a job and archive it in one step.
    pub async fn cancel(&self, id: &str) -> Result<JobRecord, JobError> {
        let mut state = self.state.write().await;
        if let Some(job) = state.live.get_mut(id) {
            job.cancel()?;
            return state
                .archive(id)
                .ok_or_else(|| JobError::NotFound(id.to_string()));
        }
        // Archived jobs are finished; unknown ids are not found.
        match state.find(id) {
            Some(job) => Err(JobError::AlreadyTerminal {
                id: id.to_string(),
                state: job.state,
            }),
            None => Err(JobError::NotFound(id.to_string())),
        }
    }

    /// Reset a job to `Queued`.
    ///
    /// Returns the updated record and whether its id must be pushed onto the
    /// submission queue (false when it was already waiting there).
    pub async fn reset(
        &self,
        id: &str,
        delay_secs: Option<f64>,
        error_rate: Option<f64>,
    ) -> Result<(JobRecord, bool), JobError> {
        let mut state = self.state.write().await;
        if !state.live.contains_key(id) {
            return match state.find(id) {
                Some(job) => Err(JobError::AlreadyTerminal {
                    id: id.to_string(),
                    state: job.state,
                }),
                None => Err(JobError::NotFound(id.to_string())),
            };
        }
        let job = state.live_mut(id)?;
        if job.state.is_terminal() {
            return Err(JobError::AlreadyTerminal {
                id: id.to_string(),
                state: job.state,
            });
        }
        let needs_enqueue = job.state != JobState::Queued;
        job.reset(delay_secs, error_rate);
        Ok((job.clone(), needs_enqueue))
    }

    /// Start a queued job. Returns `None` if the id is stale.
    pub(crate) async fn begin(&self, id: &str, now: Instant) -> Option<JobRecord> {
        let mut state = self.state.write().await;
        let job = state.live.get_mut(id)?;
        if job.state != JobState::Queued {
            return None;
        }
        job.start(now);
        Some(job.clone())
    }

    /// Apply one progress tick to a running job.
    pub(crate) async fn advance(&self, id: &str, now: Instant, roll: f64) -> Advance {
        let mut state = self.state.write().await;
        let Some(job) = state.live.get_mut(id) else {
            return Advance::Abandoned;
        };
        match job.tick(now, roll) {
            None => Advance::Abandoned,
            Some(Tick::Progress(progress)) => Advance::Running(progress),
            Some(Tick::Completed | Tick::Failed) => Advance::Finished(job.clone()),
        }
    }

    /// Archive a completed job. Returns `None` if it is no longer live and completed.
    pub(crate) async fn settle_completed(&self, id: &str) -> Option<JobRecord> {
        let mut state = self.state.write().await;
        if state.live.get(id)?.state != JobState::Completed {
            return None;
        }
        state.archive(id)
    }

    /// Re-queue a failed job, or archive it once `max_retries` is exceeded.
    pub(crate) async fn settle_failed(&self, id: &str, max_retries: Option<u32>) -> Settle {
        let mut state = self.state.write().await;
        let Some(job) = state.live.get_mut(id) else {
            return Settle::Skipped;
        };
        if job.state != JobState::Error {
            return Settle::Skipped;
        }
        match max_retries {
            Some(limit) if job.failures > limit => {
                state.archive(id);
                Settle::Archived
            }
            _ => {
                job.reset(None, None);
                Settle::Requeue
            }
        }
    }
}
