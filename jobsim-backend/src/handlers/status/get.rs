use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Extension, Path};
use axum::Json;
use serde_json::Value;

use crate::handlers::utils::{path_param, to_payload};
use crate::{error::ApiError, state::AppState};

/// GET /status/{jobId}
pub async fn get_status(
    Extension(state): Extension<Arc<AppState>>,
    Path(path): Path<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let job_id = path_param(&path, "jobId")?;
    let job = state.jobs.get_status(job_id).await?;
    Ok(Json(to_payload(&job)))
}
