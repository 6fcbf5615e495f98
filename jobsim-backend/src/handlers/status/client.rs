use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Extension, Path};
use axum::Json;
use serde_json::Value;

use crate::handlers::utils::{path_param, to_payload};
use crate::{error::ApiError, state::AppState};

/// GET /status/client/{clientId}
/// Active jobs of one client in submission order.
pub async fn client_statuses(
    Extension(state): Extension<Arc<AppState>>,
    Path(path): Path<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let client_id = path_param(&path, "clientId")?;
    let jobs = state.jobs.status_by_client(client_id).await?;
    Ok(Json(to_payload(&jobs)))
}
