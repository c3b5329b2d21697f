//! Team routes. Teams are only visible to their members.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use database::team::{self, TeamUpdate};
use database::{Team, TeamMember, TeamRole};
use serde::Deserialize;

use super::{nullable, required, Message};
use crate::auth::CurrentUser;
use crate::extract::ApiJson;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CreateTeamRequest {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateTeamRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub is_active: Option<bool>,
}

#[derive(Deserialize)]
pub struct AddMemberRequest {
    pub user_id: Option<String>,
    pub role: Option<String>,
}

#[derive(Deserialize)]
pub struct RemoveMemberRequest {
    pub user_id: Option<String>,
}

/// Load a team for a member holding at least `required` role.
async fn team_with_role(
    state: &AppState,
    team_id: &str,
    user_id: &str,
    required: TeamRole,
) -> ApiResult<Team> {
    let (team, role) = team::get_team_for_member(state.db.pool(), team_id, user_id).await?;
    if role < required {
        return Err(ApiError::Forbidden(format!(
            "{} role required on team {}",
            required.as_str(),
            team_id
        )));
    }
    Ok(team)
}

pub async fn list_teams(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<Json<Vec<Team>>> {
    Ok(Json(team::list_user_teams(state.db.pool(), &current.user.id).await?))
}

/// Create a team owned by the caller.
pub async fn create_team(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiJson(req): ApiJson<CreateTeamRequest>,
) -> ApiResult<(StatusCode, Json<Team>)> {
    let name = required("name", req.name)?;
    let team = team::create_team(
        state.db.pool(),
        &current.user.id,
        &name,
        req.description.as_deref(),
    )
    .await?;
    Ok((StatusCode::CREATED, Json(team)))
}

pub async fn get_team(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Team>> {
    let team = team_with_role(&state, &id, &current.user.id, TeamRole::Viewer).await?;
    Ok(Json(team))
}

pub async fn update_team(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateTeamRequest>,
) -> ApiResult<Json<Team>> {
    team_with_role(&state, &id, &current.user.id, TeamRole::Admin).await?;
    let team = team::update_team(
        state.db.pool(),
        &id,
        &TeamUpdate {
            name: req.name,
            description: req.description,
            is_active: req.is_active,
        },
    )
    .await?;
    Ok(Json(team))
}

pub async fn delete_team(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    team_with_role(&state, &id, &current.user.id, TeamRole::Owner).await?;
    team::delete_team(state.db.pool(), &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_members(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<TeamMember>>> {
    team_with_role(&state, &id, &current.user.id, TeamRole::Viewer).await?;
    Ok(Json(team::list_members(state.db.pool(), &id).await?))
}

/// Add a user to the team. The role defaults to `member`.
pub async fn add_member(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<AddMemberRequest>,
) -> ApiResult<Json<TeamMember>> {
    let user_id = required("user_id", req.user_id)?;
    let role = match req.role.as_deref() {
        Some(role) => role.parse::<TeamRole>()?,
        None => TeamRole::Member,
    };

    team_with_role(&state, &id, &current.user.id, TeamRole::Admin).await?;
    let member = team::add_member(state.db.pool(), &id, &user_id, role).await?;
    Ok(Json(member))
}

pub async fn remove_member(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<RemoveMemberRequest>,
) -> ApiResult<Json<Message>> {
    let user_id = required("user_id", req.user_id)?;

    team_with_role(&state, &id, &current.user.id, TeamRole::Admin).await?;
    team::remove_member(state.db.pool(), &id, &user_id).await?;
    Ok(Json(Message::new("Member removed")))
}
