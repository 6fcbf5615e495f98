//! Job records and the per-job state machine.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::error::JobError;

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Error,
    Cancelled,
}

impl JobState {
    /// Returns true if the engine will never advance a job in this state again.
    ///
    /// `Error` is not terminal here: the engine decides whether it is re-queued.
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Returns true if a cancel request may still move the job to `Cancelled`.
    #[inline]
    pub const fn is_cancellable(self) -> bool {
        matches!(self, Self::Queued | Self::Running | Self::Error)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Cancelled => "cancelled",
        })
    }
}

/// Simulation knobs applied to newly created jobs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationParams {
    #[serde(rename = "delay")]
    pub delay_secs: f64,
    pub error_rate: f64,
}

impl Default for SimulationParams {
    fn default() -> Self {
        Self {
            delay_secs: 10.0,
            error_rate: 0.1,
        }
    }
}

impl SimulationParams {
    /// Build validated parameters.
    pub fn new(delay_secs: f64, error_rate: f64) -> Result<Self, JobError> {
        validate_delay(delay_secs)?;
        validate_error_rate(error_rate)?;
        Ok(Self {
            delay_secs,
            error_rate,
        })
    }
}

/// Reject non-positive (or NaN) delays.
pub(crate) fn validate_delay(delay_secs: f64) -> Result<(), JobError> {
    if delay_secs > 0.0 && delay_secs.is_finite() {
        Ok(())
    } else {
        Err(JobError::InvalidParams(format!(
            "delay must be > 0, got {delay_secs}"
        )))
    }
}

/// Reject error rates outside `[0, 1]`.
pub(crate) fn validate_error_rate(error_rate: f64) -> Result<(), JobError> {
    if (0.0..=1.0).contains(&error_rate) {
        Ok(())
    } else {
        Err(JobError::InvalidParams(format!(
            "errorRate must be within [0, 1], got {error_rate}"
        )))
    }
}

/// Outcome of a single progress update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// Still running at the given percentage.
    Progress(u8),
    Completed,
    /// The injected random failure fired.
    Failed,
}

/// One simulated job and its current state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    #[serde(rename = "jobId")]
    pub id: String,
    pub client_id: String,
    #[serde(rename = "delay")]
    pub delay_secs: f64,
    pub error_rate: f64,
    pub progress: u8,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub callback_target: Option<String>,
    /// Number of times this job has resolved to `Error`.
    pub failures: u32,
    /// Monotonic start of the current run, used for progress.
    #[serde(skip)]
    run_started: Option<Instant>,
}

impl JobRecord {
    /// Create a new queued job.
    pub fn new(
        id: impl Into<String>,
        client_id: impl Into<String>,
        params: SimulationParams,
        callback_target: Option<String>,
    ) -> Self {
        Self {
            id: id.into(),
            client_id: client_id.into(),
            delay_secs: params.delay_secs,
            error_rate: params.error_rate,
            progress: 0,
            state: JobState::Queued,
            created_at: Utc::now(),
            started_at: None,
            callback_target,
            failures: 0,
            run_started: None,
        }
    }

    #[inline]
    pub fn params(&self) -> SimulationParams {
        SimulationParams {
            delay_secs: self.delay_secs,
            error_rate: self.error_rate,
        }
    }

    /// Mark the job as running from `now`.
    pub fn start(&mut self, now: Instant) {
        self.state = JobState::Running;
        self.progress = 0;
        self.started_at = Some(Utc::now());
        self.run_started = Some(now);
    }

    /// Advance a running job.
    ///
    /// `roll` is a uniform draw in `[0, 1)`; the job fails when it lands below
    /// the error rate, regardless of how far along the job is. Returns `None`
    /// when the job is not running.
    pub fn tick(&mut self, now: Instant, roll: f64) -> Option<Tick> {
        if self.state != JobState::Running {
            return None;
        }
        let started = self.run_started?;

        if roll < self.error_rate {
            self.state = JobState::Error;
            self.failures += 1;
            return Some(Tick::Failed);
        }

        let elapsed = now.saturating_duration_since(started).as_secs_f64();
        if elapsed < self.delay_secs {
            let pct = ((elapsed / self.delay_secs) * 100.0).floor() as u8;
            self.progress = self.progress.max(pct.min(99));
            Some(Tick::Progress(self.progress))
        } else {
            self.progress = 100;
            self.state = JobState::Completed;
            Some(Tick::Completed)
        }
    }

    /// Put the job back into `Queued`, optionally replacing its parameters.
    pub fn reset(&mut self, delay_secs: Option<f64>, error_rate: Option<f64>) {
        self.state = JobState::Queued;
        self.progress = 0;
        self.started_at = None;
        self.run_started = None;
        if let Some(delay) = delay_secs {
            self.delay_secs = delay;
        }
        if let Some(rate) = error_rate {
            self.error_rate = rate;
        }
    }

    /// Mark the job as cancelled.
    pub fn cancel(&mut self) -> Result<(), JobError> {
        if !self.state.is_cancellable() {
            return Err(JobError::AlreadyTerminal {
                id: self.id.clone(),
                state: self.state,
            });
        }
        self.state = JobState::Cancelled;
        self.run_started = None;
        Ok(())
    }

    /// Interval between progress updates: 10% of the delay, never below `floor`.
    ///
    /// Saturates at `Duration::MAX` for delays too large to represent.
    pub fn poll_interval(&self, floor: Duration) -> Duration {
        let tenth = Duration::try_from_secs_f64(self.delay_secs * 0.1).unwrap_or(Duration::MAX);
        tenth.max(floor)
    }
}
