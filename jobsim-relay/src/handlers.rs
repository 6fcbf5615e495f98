use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Extension, Path};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::{error::RelayError, state::RelayState};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub callback_url: Option<String>,
}

fn client_id_param(path: &HashMap<String, String>) -> Result<&str, RelayError> {
    path.get("clientId")
        .map(String::as_str)
        .ok_or(RelayError::MissingFields)
}

/// POST /register
/// Map a client id to the URL its updates are forwarded to.
pub async fn register(
    Extension(state): Extension<Arc<RelayState>>,
    Json(body): Json<Registration>,
) -> Result<Json<Value>, RelayError> {
    let client_id = body
        .client_id
        .filter(|s| !s.trim().is_empty())
        .ok_or(RelayError::MissingFields)?;
    let callback_url = body
        .callback_url
        .filter(|s| !s.trim().is_empty())
        .ok_or(RelayError::MissingFields)?;
    match url::Url::parse(&callback_url) {
        Ok(u) if matches!(u.scheme(), "http" | "https") => {}
        _ => return Err(RelayError::InvalidUrl(callback_url)),
    }

    state.register(&client_id, &callback_url);
    info!(client_id = %client_id, callback_url = %callback_url, "client registered");
    Ok(Json(json!({ "result": "success", "message": "Client registered" })))
}

/// DELETE /register/{clientId}
pub async fn unregister(
    Extension(state): Extension<Arc<RelayState>>,
    Path(path): Path<HashMap<String, String>>,
) -> Result<Json<Value>, RelayError> {
    let client_id = client_id_param(&path)?;
    state
        .unregister(client_id)
        .ok_or_else(|| RelayError::NotRegistered(client_id.to_string()))?;
    info!(client_id, "client unregistered");
    Ok(Json(json!({ "result": "success", "message": "Client unregistered" })))
}

/// POST /callback/{clientId}
/// Forward a job update to the client's registered URL.
pub async fn callback(
    Extension(state): Extension<Arc<RelayState>>,
    Path(path): Path<HashMap<String, String>>,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, RelayError> {
    let client_id = client_id_param(&path)?;
    match state.forward(client_id, &payload).await {
        Ok(code) => {
            info!(client_id, response_code = code, "callback forwarded");
            Ok(Json(json!({
                "result": "success",
                "message": "Callback forwarded",
                "responseCode": code,
            })))
        }
        Err(e) => {
            warn!(client_id, error = %e, "callback not forwarded");
            Err(e)
        }
    }
}
