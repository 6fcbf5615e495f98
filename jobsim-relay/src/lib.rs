//! Callback relay.
//!
//! Clients register the URL they want terminal job updates delivered to; the
//! job server posts each update to `/callback/{clientId}` and the relay
//! forwards the body unchanged.

pub mod error;
pub mod handlers;
pub mod state;

use std::sync::Arc;

use axum::{
    extract::Extension,
    routing::{delete, get, post},
    Router,
};

pub use error::RelayError;
pub use state::RelayState;

/// Build the relay router.
pub fn build_router(state: Arc<RelayState>) -> Router {
    Router::new()
        .route("/register", post(handlers::register))
        .route("/register/{clientId}", delete(handlers::unregister))
        .route("/callback/{clientId}", post(handlers::callback))
        .route("/health", get(|| async { "OK" }))
        .layer(Extension(state))
}
