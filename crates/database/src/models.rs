//! Database models.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::types::Json;
use sqlx::{FromRow, Row};

use crate::validation::ValidationError;

/// A registered account. The password hash never leaves the `user` module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: String,
    /// Login identity, stored lowercase.
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub is_active: bool,
    /// Staff accounts may administer other users.
    pub is_staff: bool,
    pub is_email_verified: bool,
    pub is_phone_verified: bool,
    pub last_login: Option<String>,
    pub last_login_ip: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Personal details attached 1:1 to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct UserProfile {
    pub id: String,
    pub user_id: String,
    pub nickname: Option<String>,
    pub bio: Option<String>,
    pub company: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    /// Preferred UI language (e.g., "zh-hans", "en").
    pub language: String,
    /// IANA timezone name.
    pub timezone: String,
    pub created_at: String,
    pub updated_at: String,
}

/// A team owned by one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: String,
    pub is_active: bool,
    /// Number of memberships, computed at read time.
    pub members_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// Role held by a team member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum TeamRole {
    Viewer,
    Member,
    Admin,
    Owner,
}

impl TeamRole {
    pub const ALL: &'static [&'static str] = &["owner", "admin", "member", "viewer"];

    pub fn as_str(&self) -> &'static str {
        match self {
            TeamRole::Owner => "owner",
            TeamRole::Admin => "admin",
            TeamRole::Member => "member",
            TeamRole::Viewer => "viewer",
        }
    }

    /// Owners and admins may manage the team and its members.
    pub fn can_manage(&self) -> bool {
        matches!(self, TeamRole::Owner | TeamRole::Admin)
    }
}

impl FromStr for TeamRole {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "owner" => Ok(TeamRole::Owner),
            "admin" => Ok(TeamRole::Admin),
            "member" => Ok(TeamRole::Member),
            "viewer" => Ok(TeamRole::Viewer),
            other => Err(ValidationError::invalid_choice("role", other, Self::ALL)),
        }
    }
}

/// A user's membership in a team.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct TeamMember {
    pub id: String,
    pub team_id: String,
    pub user_id: String,
    pub user_email: String,
    pub role: TeamRole,
    pub joined_at: String,
    pub created_at: String,
}

/// An API key record. The secret itself is only ever returned at issue time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ApiKey {
    pub id: String,
    pub user_id: String,
    pub name: String,
    /// First characters of the secret, for display.
    pub key_prefix: String,
    pub is_active: bool,
    pub last_used_at: Option<String>,
    pub expires_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// An API key together with its plaintext secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuedApiKey {
    #[serde(flatten)]
    pub api_key: ApiKey,
    pub key: String,
}

/// Processing status of a knowledge base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum KnowledgeBaseStatus {
    Active,
    Inactive,
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl KnowledgeBaseStatus {
    pub const ALL: &'static [&'static str] = &[
        "active",
        "inactive",
        "pending",
        "processing",
        "completed",
        "failed",
        "cancelled",
    ];
}

impl FromStr for KnowledgeBaseStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(Self::Active),
            "inactive" => Ok(Self::Inactive),
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(ValidationError::invalid_choice("status", other, Self::ALL)),
        }
    }
}

/// Whether a soft-deletable row is live or hidden.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum Lifecycle {
    Active,
    Deleted { at: String },
}

impl Lifecycle {
    pub fn is_active(&self) -> bool {
        matches!(self, Lifecycle::Active)
    }
}

/// A named collection of documents with retrieval configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeBase {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub status: KnowledgeBaseStatus,
    pub is_public: bool,
    pub chunk_size: i64,
    pub chunk_overlap: i64,
    pub similarity_threshold: f64,
    pub top_k: i64,
    /// Snapshot counters, refreshed only by `stats::recompute_stats`.
    pub documents_count: i64,
    pub chunks_count: i64,
    pub total_size: i64,
    pub created_by: String,
    pub created_by_name: String,
    pub lifecycle: Lifecycle,
    pub created_at: String,
    pub updated_at: String,
}

impl<'r> FromRow<'r, SqliteRow> for KnowledgeBase {
    fn from_row(row: &'r SqliteRow) -> sqlx::Result<Self> {
        let state: String = row.try_get("lifecycle")?;
        let deleted_at: Option<String> = row.try_get("deleted_at")?;
        let lifecycle = match (state.as_str(), deleted_at) {
            ("active", _) => Lifecycle::Active,
            ("deleted", Some(at)) => Lifecycle::Deleted { at },
            (other, _) => {
                return Err(sqlx::Error::ColumnDecode {
                    index: "lifecycle".to_string(),
                    source: format!("invalid lifecycle state: {}", other).into(),
                })
            }
        };

        Ok(Self {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            icon: row.try_get("icon")?,
            status: row.try_get("status")?,
            is_public: row.try_get("is_public")?,
            chunk_size: row.try_get("chunk_size")?,
            chunk_overlap: row.try_get("chunk_overlap")?,
            similarity_threshold: row.try_get("similarity_threshold")?,
            top_k: row.try_get("top_k")?,
            documents_count: row.try_get("documents_count")?,
            chunks_count: row.try_get("chunks_count")?,
            total_size: row.try_get("total_size")?,
            created_by: row.try_get("created_by")?,
            created_by_name: row.try_get("created_by_name")?,
            lifecycle,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// Permission level granted by a share.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum SharePermission {
    Read,
    Write,
    Admin,
}

impl SharePermission {
    pub const ALL: &'static [&'static str] = &["read", "write", "admin"];

    pub fn as_str(&self) -> &'static str {
        match self {
            SharePermission::Read => "read",
            SharePermission::Write => "write",
            SharePermission::Admin => "admin",
        }
    }
}

impl FromStr for SharePermission {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "read" => Ok(SharePermission::Read),
            "write" => Ok(SharePermission::Write),
            "admin" => Ok(SharePermission::Admin),
            other => Err(ValidationError::invalid_choice("permission", other, Self::ALL)),
        }
    }
}

impl fmt::Display for SharePermission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A grant giving one user access to one knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct KnowledgeBaseShare {
    pub id: String,
    pub knowledge_base_id: String,
    pub knowledge_base_name: String,
    pub shared_with: String,
    pub shared_with_name: String,
    pub shared_with_email: String,
    pub permission: SharePermission,
    /// Free-form permission flags, always a JSON object.
    pub permissions: Json<serde_json::Value>,
    pub created_at: String,
    pub updated_at: String,
}

/// A label scoped to one knowledge base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct KnowledgeBaseTag {
    pub id: String,
    pub knowledge_base_id: String,
    pub name: String,
    pub color: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Retrieval strategy used when searching a knowledge base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum SearchMode {
    Semantic,
    Keyword,
    Hybrid,
}

impl SearchMode {
    pub const ALL: &'static [&'static str] = &["semantic", "keyword", "hybrid"];
}

impl FromStr for SearchMode {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "semantic" => Ok(SearchMode::Semantic),
            "keyword" => Ok(SearchMode::Keyword),
            "hybrid" => Ok(SearchMode::Hybrid),
            other => Err(ValidationError::invalid_choice("search_mode", other, Self::ALL)),
        }
    }
}

/// Indexing and retrieval settings, one row per knowledge base.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct KnowledgeBaseSettings {
    pub id: String,
    pub knowledge_base_id: String,
    pub auto_index: bool,
    /// Five-field cron expression.
    pub index_schedule: Option<String>,
    pub search_mode: SearchMode,
    pub enable_rerank: bool,
    pub rerank_model: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// The slice of a document the stats aggregator needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Document {
    pub id: String,
    pub knowledge_base_id: String,
    pub title: String,
    pub chunks_count: i64,
    /// Size in bytes.
    pub file_size: i64,
    pub is_deleted: bool,
    pub created_at: String,
    pub updated_at: String,
}
