//! Polling view for clients that wait on a job without a callback.

use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::error::JobError;
use crate::record::{JobRecord, JobState};
use crate::service::JobService;

/// How a wait on a job ended.
#[derive(Debug, Clone)]
pub enum WaitOutcome {
    Completed(JobRecord),
    Cancelled(JobRecord),
    /// Archived in `Error` after the retry limit was reached.
    Failed(JobRecord),
    /// Gave up waiting; carries the last observed record.
    TimedOut(JobRecord),
}

impl WaitOutcome {
    pub fn record(&self) -> &JobRecord {
        match self {
            Self::Completed(job) | Self::Cancelled(job) | Self::Failed(job) | Self::TimedOut(job) => job,
        }
    }
}

/// Polls the service until a job settles.
#[derive(Debug, Clone)]
pub struct ClientJobView {
    service: JobService,
    poll_interval: Duration,
    max_wait: Duration,
}

impl ClientJobView {
    pub fn new(service: JobService, poll_interval: Duration, max_wait: Duration) -> Self {
        Self {
            service,
            poll_interval,
            max_wait,
        }
    }

    /// Current record of one job.
    pub async fn status(&self, job_id: &str) -> Result<JobRecord, JobError> {
        self.service.get_status(job_id).await
    }

    /// Live jobs for a client.
    pub async fn jobs_for(&self, client_id: &str) -> Result<Vec<JobRecord>, JobError> {
        self.service.status_by_client(client_id).await
    }

    /// Poll until the job is completed, cancelled or archived as failed, or
    /// until `max_wait` elapses.
    ///
    /// A job in `Error` that the engine will re-queue is still in flight and
    /// keeps the wait going.
    pub async fn wait_for(&self, job_id: &str) -> Result<WaitOutcome, JobError> {
        let deadline = Instant::now() + self.max_wait;
        loop {
            let job = self.service.get_status(job_id).await?;
            match job.state {
                JobState::Completed => return Ok(WaitOutcome::Completed(job)),
                JobState::Cancelled => return Ok(WaitOutcome::Cancelled(job)),
                JobState::Error if self.is_archived(&job).await? => {
                    return Ok(WaitOutcome::Failed(job));
                }
                _ => {}
            }
            debug!(job_id, state = %job.state, progress = job.progress, "waiting on job");

            let now = Instant::now();
            if now >= deadline {
                return Ok(WaitOutcome::TimedOut(job));
            }
            tokio::time::sleep(self.poll_interval.min(deadline - now)).await;
        }
    }

    async fn is_archived(&self, job: &JobRecord) -> Result<bool, JobError> {
        match self.service.status_by_client(&job.client_id).await {
            Ok(live) => Ok(!live.iter().any(|other| other.id == job.id)),
            // The whole table was reset underneath us.
            Err(JobError::ClientNotFound(_)) => Err(JobError::NotFound(job.id.clone())),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineConfig;
    use crate::notify::{CallbackTransport, Notifier, RetryPolicy};
    use crate::record::SimulationParams;
    use crate::service::ServiceConfig;
    use crate::NotifyError;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::Arc;
    use tokio_util::sync::CancellationToken;

    struct NullTransport;

    #[async_trait]
    impl CallbackTransport for NullTransport {
        async fn deliver(&self, _target: &str, _payload: &Value) -> Result<(), NotifyError> {
            Ok(())
        }
    }

    fn service(delay_secs: f64, error_rate: f64, max_job_retries: Option<u32>) -> JobService {
        JobService::new(
            ServiceConfig {
                defaults: SimulationParams::new(delay_secs, error_rate).unwrap(),
                randomize_delay: false,
                engine: EngineConfig {
                    max_job_retries,
                    ..EngineConfig::default()
                },
            },
            Notifier::new(Arc::new(NullTransport), RetryPolicy::default()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn waits_until_completion() {
        let svc = service(3.0, 0.0, None);
        let engine = svc.spawn_engine(CancellationToken::new()).unwrap();
        let job = svc.submit_job("c1", None, None).await.unwrap();

        let view = svc.view(Duration::from_millis(500), Duration::from_secs(30));
        let outcome = view.wait_for(&job.id).await.unwrap();
        assert!(matches!(outcome, WaitOutcome::Completed(_)));
        assert_eq!(outcome.record().progress, 100);

        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_with_last_seen_record() {
        let svc = service(60.0, 0.0, None);
        let engine = svc.spawn_engine(CancellationToken::new()).unwrap();
        let job = svc.submit_job("c1", None, None).await.unwrap();

        let view = svc.view(Duration::from_secs(1), Duration::from_secs(5));
        let started = Instant::now();
        let outcome = view.wait_for(&job.id).await.unwrap();
        let WaitOutcome::TimedOut(last) = outcome else {
            panic!("expected a timeout, got {outcome:?}");
        };
        assert_eq!(last.state, JobState::Running);
        assert_eq!(started.elapsed(), Duration::from_secs(5));

        engine.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn reports_cancellation() {
        let svc = service(60.0, 0.0, None);
        let job = svc.submit_job("c1", None, None).await.unwrap();

        let view = svc.view(Duration::from_secs(1), Duration::from_secs(30));
        let waiter = tokio::spawn({
            let view = view.clone();
            let id = job.id.clone();
            async move { view.wait_for(&id).await }
        });

        tokio::time::sleep(Duration::from_millis(2_500)).await;
        svc.cancel_job(&job.id).await.unwrap();

        let outcome = waiter.await.unwrap().unwrap();
        assert!(matches!(outcome, WaitOutcome::Cancelled(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn retrying_job_is_still_in_flight_until_archived() {
        let svc = service(10.0, 1.0, Some(1));
        let engine = svc.spawn_engine(CancellationToken::new()).unwrap();
        let job = svc.submit_job("c1", None, None).await.unwrap();

        let view = svc.view(Duration::from_millis(250), Duration::from_secs(30));
        let outcome = view.wait_for(&job.id).await.unwrap();
        let WaitOutcome::Failed(last) = outcome else {
            panic!("expected a failure, got {outcome:?}");
        };
        assert_eq!(last.failures, 2);

        engine.shutdown().await;
    }

    #[tokio::test]
    async fn unknown_job_is_an_error() {
        let svc = service(1.0, 0.0, None);
        let view = svc.view(Duration::from_millis(10), Duration::from_millis(50));
        assert!(matches!(
            view.wait_for("missing").await,
            Err(JobError::NotFound(_))
        ));
    }
}
