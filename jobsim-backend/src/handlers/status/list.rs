use std::sync::Arc;

use axum::extract::Extension;
use axum::Json;
use serde_json::Value;

use crate::handlers::utils::to_payload;
use crate::{error::ApiError, state::AppState};

/// GET /status
/// Every known job keyed by id.
pub async fn list_statuses(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let all = state.jobs.all_statuses().await;
    Ok(Json(to_payload(&all)))
}
