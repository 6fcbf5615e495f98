use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Extension, Path, Query};
use axum::Json;
use serde_json::{json, Value};

use crate::handlers::utils::{parse_optional_f64, path_param, to_payload};
use crate::{error::ApiError, state::AppState};

/// POST /reset
/// Forget every job and client.
pub async fn reset_all(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    state.jobs.reset_all().await;
    Ok(Json(json!({ "message": "Server reset successfully" })))
}

/// POST /reset/{jobId}?delay=&errorRate=
/// Re-queue one job, optionally with new simulation parameters.
pub async fn reset_job(
    Extension(state): Extension<Arc<AppState>>,
    Path(path): Path<HashMap<String, String>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let job_id = path_param(&path, "jobId")?;
    let delay = parse_optional_f64(&params, "delay")?;
    let error_rate = parse_optional_f64(&params, "errorRate")?;

    let job = state.jobs.reset_job(job_id, delay, error_rate).await?;
    Ok(Json(to_payload(&job)))
}
