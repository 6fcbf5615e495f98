use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Extension, Path, Query};
use axum::Json;
use serde_json::Value;

use crate::handlers::utils::{path_param, to_payload};
use crate::{error::ApiError, state::AppState};

/// POST /create_job/{clientId}?jobId=
/// Submit a new job for a client. The job id is generated when not supplied.
pub async fn create_job(
    Extension(state): Extension<Arc<AppState>>,
    Path(path): Path<HashMap<String, String>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let client_id = path_param(&path, "clientId")?;
    let job_id = params.get("jobId").filter(|id| !id.is_empty()).cloned();

    let callback_target = state.callback_target_for(client_id);
    let job = state
        .jobs
        .submit_job(client_id, job_id, callback_target)
        .await?;

    Ok(Json(to_payload(&job)))
}
