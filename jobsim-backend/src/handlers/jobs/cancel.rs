use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Extension, Path};
use axum::Json;
use serde_json::{json, Value};

use crate::handlers::utils::{path_param, to_payload};
use crate::{error::ApiError, state::AppState};

/// POST /cancel/{jobId}
/// Cancel a job that has not completed yet.
pub async fn cancel_job(
    Extension(state): Extension<Arc<AppState>>,
    Path(path): Path<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let job_id = path_param(&path, "jobId")?;
    let job = state.jobs.cancel_job(job_id).await?;

    Ok(Json(json!({
        "message": "Job cancelled successfully",
        "job": to_payload(&job),
    })))
}
