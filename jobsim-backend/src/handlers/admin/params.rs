use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Extension, Query};
use axum::Json;
use serde_json::{json, Value};

use crate::handlers::utils::{parse_optional_f64, to_payload};
use crate::{error::ApiError, state::AppState};

/// POST /set_params?delay=&errorRate=
/// Change the parameters applied to jobs created from now on.
pub async fn set_params(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, ApiError> {
    let current = state.jobs.params();
    let delay = parse_optional_f64(&params, "delay")?.unwrap_or(current.delay_secs);
    let error_rate = parse_optional_f64(&params, "errorRate")?.unwrap_or(current.error_rate);

    let updated = state.jobs.set_params(delay, error_rate)?;
    Ok(Json(json!({
        "message": "Server parameters updated successfully",
        "delay": updated.delay_secs,
        "errorRate": updated.error_rate,
    })))
}

/// GET /params
pub async fn get_params(
    Extension(state): Extension<Arc<AppState>>,
) -> Result<Json<Value>, ApiError> {
    Ok(Json(to_payload(&state.jobs.params())))
}
