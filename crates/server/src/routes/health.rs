//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Serialize)]
pub struct Health {
    pub status: String,
}

/// Health check endpoint. Touches the database so a broken pool shows up.
pub async fn health(State(state): State<AppState>) -> ApiResult<Json<Health>> {
    database::user::count_users(state.db.pool()).await?;
    Ok(Json(Health {
        status: "ok".to_string(),
    }))
}
