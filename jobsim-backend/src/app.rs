use std::sync::Arc;

use axum::{
    extract::Extension,
    routing::{get, post},
    Router,
};

use crate::handlers::{admin, jobs, status};
use crate::state::AppState;

/// Build the axum router with the provided shared application state.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        // submission and cancellation
        .route("/create_job/{clientId}", post(jobs::create::create_job))
        .route("/cancel/{jobId}", post(jobs::cancel::cancel_job))
        // status queries
        .route("/status", get(status::list::list_statuses))
        .route("/status/{jobId}", get(status::get::get_status))
        .route("/status/client/{clientId}", get(status::client::client_statuses))
        .route("/completed", get(status::completed::list_completed))
        .route("/completed/{clientId}", get(status::completed::client_completed))
        // management
        .route("/reset", post(admin::reset::reset_all))
        .route("/reset/{jobId}", post(admin::reset::reset_job))
        .route("/set_params", post(admin::params::set_params))
        .route("/params", get(admin::params::get_params))
        .route("/health", get(health_handler))
        .layer(Extension(state))
}

async fn health_handler() -> &'static str {
    "OK"
}
