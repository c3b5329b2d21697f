//! The caller's own profile.

use axum::extract::State;
use axum::Json;
use database::user_profile::{self, ProfileUpdate};
use database::UserProfile;
use serde::Deserialize;

use super::nullable;
use crate::auth::CurrentUser;
use crate::extract::ApiJson;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct UpdateProfileRequest {
    #[serde(default, deserialize_with = "nullable")]
    pub nickname: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub bio: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub company: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub department: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub position: Option<Option<String>>,
    pub language: Option<String>,
    pub timezone: Option<String>,
}

pub async fn get_profile(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<Json<UserProfile>> {
    let profile = user_profile::get_or_create_profile(state.db.pool(), &current.user.id).await?;
    Ok(Json(profile))
}

pub async fn update_profile(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> ApiResult<Json<UserProfile>> {
    let profile = user_profile::update_profile(
        state.db.pool(),
        &current.user.id,
        &ProfileUpdate {
            nickname: req.nickname,
            bio: req.bio,
            company: req.company,
            department: req.department,
            position: req.position,
            language: req.language,
            timezone: req.timezone,
        },
    )
    .await?;
    Ok(Json(profile))
}
