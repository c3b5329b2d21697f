//! API key routes. Every key is scoped to the caller.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use database::api_key::{self, ApiKeyUpdate};
use database::{ApiKey, IssuedApiKey};
use serde::Deserialize;

use super::{nullable, required};
use crate::auth::CurrentUser;
use crate::extract::ApiJson;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateApiKeyRequest {
    pub name: Option<String>,
    /// RFC 3339 timestamp.
    pub expires_at: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateApiKeyRequest {
    pub name: Option<String>,
    pub is_active: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    pub expires_at: Option<Option<String>>,
}

pub async fn list_api_keys(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<Json<Vec<ApiKey>>> {
    Ok(Json(api_key::list_api_keys(state.db.pool(), &current.user.id).await?))
}

/// Issue a key. The response is the only time the secret is shown.
pub async fn create_api_key(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiJson(req): ApiJson<CreateApiKeyRequest>,
) -> ApiResult<(StatusCode, Json<IssuedApiKey>)> {
    let name = required("name", req.name)?;
    let issued = api_key::create_api_key(
        state.db.pool(),
        &current.user.id,
        &name,
        req.expires_at.as_deref(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(issued)))
}

pub async fn get_api_key(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<ApiKey>> {
    Ok(Json(api_key::get_api_key(state.db.pool(), &current.user.id, &id).await?))
}

pub async fn update_api_key(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateApiKeyRequest>,
) -> ApiResult<Json<ApiKey>> {
    let key = api_key::update_api_key(
        state.db.pool(),
        &current.user.id,
        &id,
        &ApiKeyUpdate {
            name: req.name,
            is_active: req.is_active,
            expires_at: req.expires_at,
        },
    )
    .await?;
    Ok(Json(key))
}

pub async fn delete_api_key(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    api_key::delete_api_key(state.db.pool(), &current.user.id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Replace the secret; the old one stops working immediately.
pub async fn regenerate_api_key(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<IssuedApiKey>> {
    let issued = api_key::regenerate_api_key(state.db.pool(), &current.user.id, &id).await?;
    Ok(Json(issued))
}
