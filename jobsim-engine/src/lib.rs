//! Job lifecycle engine for the jobsim service.
//!
//! Clients submit simulated jobs, a single background worker drains the
//! submission queue one job at a time, and terminal outcomes are pushed to a
//! client callback on top of the poll-based status surface.
//!
//! # Architecture
//!
//! - [`JobRecord`] - One job and its state machine
//! - [`JobTable`] - Shared store of live and archived jobs, guarded by a single lock
//! - [`SubmissionQueue`] - FIFO of job ids feeding the worker
//! - [`Notifier`] - Callback delivery with bounded exponential backoff
//! - [`JobService`] - The operations exposed to request handlers; owns the worker
//! - [`ClientJobView`] - Polling helper that waits for a job to settle
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use jobsim_engine::{JobService, Notifier, RetryPolicy, ServiceConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let notifier = Notifier::http(Duration::from_secs(5), RetryPolicy::default()).unwrap();
//!     let service = JobService::new(ServiceConfig::default(), notifier);
//!
//!     let engine = service.spawn_engine(CancellationToken::new()).unwrap();
//!
//!     let job = service.submit_job("client-1", None, None).await.unwrap();
//!     println!("queued job {}", job.id);
//!
//!     engine.shutdown().await;
//! }
//! ```

mod engine;
mod error;
mod notify;
mod queue;
mod record;
mod service;
mod table;
mod view;

pub use engine::{EngineConfig, EngineHandle};
pub use error::{JobError, NotifyError};
pub use notify::{CallbackTransport, HttpTransport, Notifier, RetryPolicy};
pub use queue::SubmissionQueue;
pub use record::{JobRecord, JobState, SimulationParams, Tick};
pub use service::{JobService, ServiceConfig};
pub use table::JobTable;
pub use view::{ClientJobView, WaitOutcome};

// Re-export async_trait for convenience when implementing CallbackTransport
pub use async_trait::async_trait;
