use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Extension, Path};
use axum::Json;
use serde_json::Value;

use crate::handlers::utils::{path_param, to_payload};
use crate::{error::ApiError, state::AppState};

/// GET /completed
/// Archived jobs of every client, in the order they finished.
pub async fn list_completed(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    let jobs = state.jobs.list_completed(None).await?;
    Ok(Json(to_payload(&jobs)))
}

/// GET /completed/{clientId}
pub async fn client_completed(
    Extension(state): Extension<Arc<AppState>>,
    Path(path): Path<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let client_id = path_param(&path, "clientId")?;
    let jobs = state.jobs.list_completed(Some(client_id)).await?;
    Ok(Json(to_payload(&jobs)))
}
