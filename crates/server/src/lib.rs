//! HTTP API for the knowledge base service.
//!
//! This crate provides the JSON control plane over the `database` crate:
//! - Account registration, sessions and staff administration
//! - Profiles, teams and API keys
//! - Knowledge bases with sharing, tags, settings and stats

pub mod auth;
pub mod config;
pub mod error;
pub mod extract;
pub mod password;
pub mod routes;
pub mod state;

use axum::Router;
use tower_http::trace::TraceLayer;

pub use auth::CurrentUser;
pub use config::{Config, ConfigError};
pub use error::{ApiError, ApiResult};
pub use extract::ApiJson;
pub use password::Passwords;
pub use state::AppState;

/// Build the application with request tracing.
pub fn create_router(state: AppState) -> Router {
    routes::router()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
