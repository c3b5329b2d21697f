//! Knowledge base routes.
//!
//! Every handler that addresses a knowledge base by id goes through
//! `access::authorize` with the level the operation needs.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use database::access::{self, Access};
use database::knowledge_base::{self, KnowledgeBaseUpdate, NewKnowledgeBase};
use database::settings::{self, SettingsUpdate};
use database::validation::ChunkingConfig;
use database::{
    share, stats, tag, KnowledgeBase, KnowledgeBaseSettings, KnowledgeBaseShare,
    KnowledgeBaseStatus, KnowledgeBaseTag, SearchMode, SharePermission,
};
use serde::{Deserialize, Serialize};

use super::{nullable, required, Message};
use crate::auth::CurrentUser;
use crate::extract::ApiJson;
use crate::error::ApiResult;
use crate::state::AppState;

/// A knowledge base with its tag names.
#[derive(Serialize)]
pub struct KnowledgeBaseDetail {
    #[serde(flatten)]
    pub knowledge_base: KnowledgeBase,
    pub tags: Vec<String>,
}

#[derive(Deserialize)]
pub struct CreateKnowledgeBaseRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    #[serde(default)]
    pub is_public: bool,
    pub chunk_size: Option<i64>,
    pub chunk_overlap: Option<i64>,
    pub similarity_threshold: Option<f64>,
    pub top_k: Option<i64>,
}

#[derive(Deserialize)]
pub struct UpdateKnowledgeBaseRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub icon: Option<Option<String>>,
    pub status: Option<String>,
    pub is_public: Option<bool>,
    pub chunk_size: Option<i64>,
    pub chunk_overlap: Option<i64>,
    pub similarity_threshold: Option<f64>,
    pub top_k: Option<i64>,
}

#[derive(Deserialize)]
pub struct ShareRequest {
    pub user_email: Option<String>,
    pub permission: Option<String>,
    pub permissions: Option<serde_json::Value>,
}

#[derive(Deserialize)]
pub struct UnshareRequest {
    pub user_email: Option<String>,
}

#[derive(Deserialize)]
pub struct AddTagRequest {
    pub name: Option<String>,
    pub color: Option<String>,
}

#[derive(Deserialize)]
pub struct RemoveTagRequest {
    pub name: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateSettingsRequest {
    pub auto_index: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    pub index_schedule: Option<Option<String>>,
    pub search_mode: Option<String>,
    pub enable_rerank: Option<bool>,
    #[serde(default, deserialize_with = "nullable")]
    pub rerank_model: Option<Option<String>>,
}

async fn detail(state: &AppState, knowledge_base: KnowledgeBase) -> ApiResult<Json<KnowledgeBaseDetail>> {
    let tags = tag::list_tag_names(state.db.pool(), &knowledge_base.id).await?;
    Ok(Json(KnowledgeBaseDetail {
        knowledge_base,
        tags,
    }))
}

/// Knowledge bases the caller owns or has been shared.
pub async fn list(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<Json<Vec<KnowledgeBase>>> {
    Ok(Json(
        knowledge_base::list_visible(state.db.pool(), &current.user.id).await?,
    ))
}

pub async fn public(
    State(state): State<AppState>,
    _current: CurrentUser,
) -> ApiResult<Json<Vec<KnowledgeBase>>> {
    Ok(Json(knowledge_base::list_public(state.db.pool()).await?))
}

pub async fn shared_with_me(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<Json<Vec<KnowledgeBase>>> {
    Ok(Json(
        knowledge_base::list_shared_with(state.db.pool(), &current.user.id).await?,
    ))
}

pub async fn create(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiJson(req): ApiJson<CreateKnowledgeBaseRequest>,
) -> ApiResult<(StatusCode, Json<KnowledgeBaseDetail>)> {
    let name = required("name", req.name)?;
    let defaults = ChunkingConfig::default();

    let kb = knowledge_base::create_knowledge_base(
        state.db.pool(),
        &current.user.id,
        &NewKnowledgeBase {
            name,
            description: req.description,
            icon: req.icon,
            is_public: req.is_public,
            chunking: ChunkingConfig {
                chunk_size: req.chunk_size.unwrap_or(defaults.chunk_size),
                chunk_overlap: req.chunk_overlap.unwrap_or(defaults.chunk_overlap),
                similarity_threshold: req
                    .similarity_threshold
                    .unwrap_or(defaults.similarity_threshold),
                top_k: req.top_k.unwrap_or(defaults.top_k),
            },
        },
    )
    .await?;

    let Json(body) = detail(&state, kb).await?;
    Ok((StatusCode::CREATED, Json(body)))
}

pub async fn get(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<KnowledgeBaseDetail>> {
    let kb = access::authorize(state.db.pool(), &id, &current.user.id, Access::Read).await?;
    detail(&state, kb).await
}

pub async fn update(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateKnowledgeBaseRequest>,
) -> ApiResult<Json<KnowledgeBaseDetail>> {
    let status = req
        .status
        .as_deref()
        .map(str::parse::<KnowledgeBaseStatus>)
        .transpose()?;

    access::authorize(state.db.pool(), &id, &current.user.id, Access::Write).await?;
    let kb = knowledge_base::update_knowledge_base(
        state.db.pool(),
        &id,
        &KnowledgeBaseUpdate {
            name: req.name,
            description: req.description,
            icon: req.icon,
            status,
            is_public: req.is_public,
            chunk_size: req.chunk_size,
            chunk_overlap: req.chunk_overlap,
            similarity_threshold: req.similarity_threshold,
            top_k: req.top_k,
        },
    )
    .await?;
    detail(&state, kb).await
}

/// Soft delete. Only the owner may do this.
pub async fn destroy(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    access::authorize(state.db.pool(), &id, &current.user.id, Access::Owner).await?;
    knowledge_base::soft_delete_knowledge_base(state.db.pool(), &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Grant or adjust a user's access. The permission defaults to `read`.
pub async fn share(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<ShareRequest>,
) -> ApiResult<Json<KnowledgeBaseShare>> {
    let email = required("user_email", req.user_email)?;
    let permission = match req.permission.as_deref() {
        Some(permission) => permission.parse::<SharePermission>()?,
        None => SharePermission::Read,
    };

    access::authorize(state.db.pool(), &id, &current.user.id, Access::Admin).await?;
    let share = share::share_knowledge_base(
        state.db.pool(),
        &id,
        &email,
        permission,
        req.permissions.as_ref(),
    )
    .await?;
    Ok(Json(share))
}

pub async fn unshare(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UnshareRequest>,
) -> ApiResult<Json<Message>> {
    let email = required("user_email", req.user_email)?;

    access::authorize(state.db.pool(), &id, &current.user.id, Access::Admin).await?;
    share::unshare_knowledge_base(state.db.pool(), &id, &email).await?;
    Ok(Json(Message::new("Share revoked")))
}

pub async fn shares(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<KnowledgeBaseShare>>> {
    access::authorize(state.db.pool(), &id, &current.user.id, Access::Read).await?;
    Ok(Json(share::list_shares(state.db.pool(), &id).await?))
}

pub async fn tags(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<KnowledgeBaseTag>>> {
    access::authorize(state.db.pool(), &id, &current.user.id, Access::Read).await?;
    Ok(Json(tag::list_tags(state.db.pool(), &id).await?))
}

pub async fn add_tag(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<AddTagRequest>,
) -> ApiResult<Json<KnowledgeBaseTag>> {
    let name = required("name", req.name)?;

    access::authorize(state.db.pool(), &id, &current.user.id, Access::Write).await?;
    let tag = tag::add_tag(state.db.pool(), &id, &name, req.color.as_deref()).await?;
    Ok(Json(tag))
}

pub async fn remove_tag(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<RemoveTagRequest>,
) -> ApiResult<Json<Message>> {
    let name = required("name", req.name)?;

    access::authorize(state.db.pool(), &id, &current.user.id, Access::Write).await?;
    tag::remove_tag(state.db.pool(), &id, &name).await?;
    Ok(Json(Message::new("Tag removed")))
}

pub async fn get_settings(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<KnowledgeBaseSettings>> {
    access::authorize(state.db.pool(), &id, &current.user.id, Access::Read).await?;
    Ok(Json(settings::get_or_create_settings(state.db.pool(), &id).await?))
}

pub async fn update_settings(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateSettingsRequest>,
) -> ApiResult<Json<KnowledgeBaseSettings>> {
    let search_mode = req
        .search_mode
        .as_deref()
        .map(str::parse::<SearchMode>)
        .transpose()?;

    access::authorize(state.db.pool(), &id, &current.user.id, Access::Write).await?;
    let settings = settings::update_settings(
        state.db.pool(),
        &id,
        &SettingsUpdate {
            auto_index: req.auto_index,
            index_schedule: req.index_schedule,
            search_mode,
            enable_rerank: req.enable_rerank,
            rerank_model: req.rerank_model,
        },
    )
    .await?;
    Ok(Json(settings))
}

/// Recompute the document counters from scratch.
pub async fn update_stats(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<KnowledgeBaseDetail>> {
    access::authorize(state.db.pool(), &id, &current.user.id, Access::Write).await?;
    let kb = stats::recompute_stats(state.db.pool(), &id).await?;
    detail(&state, kb).await
}
