//! Knowledge base registry.

use sqlx::SqlitePool;

use crate::access::{PUBLICLY_VISIBLE, VISIBLE_TO_USER};
use crate::error::{is_unique_violation, DatabaseError, Result};
use crate::models::{KnowledgeBase, KnowledgeBaseStatus};
use crate::settings::insert_default_settings;
use crate::validation::{
    validate_length, validate_required, ChunkingConfig, ValidationError, MAX_ICON_LENGTH,
    MAX_NAME_LENGTH,
};

const KB_SELECT: &str = r#"
    SELECT kb.id, kb.name, kb.description, kb.icon, kb.status, kb.is_public,
           kb.chunk_size, kb.chunk_overlap, kb.similarity_threshold, kb.top_k,
           kb.documents_count, kb.chunks_count, kb.total_size,
           kb.created_by, u.username AS created_by_name,
           kb.lifecycle, kb.deleted_at, kb.created_at, kb.updated_at
    FROM knowledge_bases kb
    JOIN users u ON u.id = kb.created_by
"#;

const KB_ORDER: &str = "ORDER BY kb.created_at DESC, kb.rowid DESC";

/// Fields accepted when creating a knowledge base.
#[derive(Debug, Clone, Default)]
pub struct NewKnowledgeBase {
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub is_public: bool,
    pub chunking: ChunkingConfig,
}

/// Partial knowledge base update. `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeBaseUpdate {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub icon: Option<Option<String>>,
    pub status: Option<KnowledgeBaseStatus>,
    pub is_public: Option<bool>,
    pub chunk_size: Option<i64>,
    pub chunk_overlap: Option<i64>,
    pub similarity_threshold: Option<f64>,
    pub top_k: Option<i64>,
}

fn duplicate_name() -> DatabaseError {
    DatabaseError::Validation(ValidationError::Duplicate {
        field: "name".to_string(),
        message: "A knowledge base with this name already exists".to_string(),
    })
}

fn map_name_conflict(e: sqlx::Error) -> DatabaseError {
    if is_unique_violation(&e) {
        return duplicate_name();
    }
    DatabaseError::Sqlx(e)
}

/// Create a knowledge base together with its default settings.
///
/// Names are unique among the owner's live knowledge bases.
pub async fn create_knowledge_base(
    pool: &SqlitePool,
    owner_id: &str,
    new: &NewKnowledgeBase,
) -> Result<KnowledgeBase> {
    let name = validate_required("name", &new.name, MAX_NAME_LENGTH)?;
    if let Some(icon) = &new.icon {
        validate_length("icon", icon, MAX_ICON_LENGTH)?;
    }
    new.chunking.validate()?;

    let id = uuid::Uuid::new_v4().to_string();
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO knowledge_bases (
            id, created_by, name, description, icon, is_public,
            chunk_size, chunk_overlap, similarity_threshold, top_k
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(owner_id)
    .bind(name)
    .bind(&new.description)
    .bind(&new.icon)
    .bind(new.is_public)
    .bind(new.chunking.chunk_size)
    .bind(new.chunking.chunk_overlap)
    .bind(new.chunking.similarity_threshold)
    .bind(new.chunking.top_k)
    .execute(&mut *tx)
    .await
    .map_err(map_name_conflict)?;

    insert_default_settings(&mut *tx, &id).await?;

    tx.commit().await?;

    tracing::info!(knowledge_base_id = %id, owner_id = %owner_id, "Created knowledge base");
    get_knowledge_base(pool, &id).await
}

/// Load a knowledge base regardless of lifecycle or caller.
///
/// User-facing paths must go through [`crate::access::authorize`] instead.
pub async fn get_knowledge_base(pool: &SqlitePool, id: &str) -> Result<KnowledgeBase> {
    sqlx::query_as::<_, KnowledgeBase>(&format!("{KB_SELECT} WHERE kb.id = ?"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("KnowledgeBase", id))
}

/// Knowledge bases the user owns or has been granted a share on.
pub async fn list_visible(pool: &SqlitePool, user_id: &str) -> Result<Vec<KnowledgeBase>> {
    let rows = sqlx::query_as::<_, KnowledgeBase>(&format!(
        "{KB_SELECT} WHERE {VISIBLE_TO_USER} {KB_ORDER}"
    ))
    .bind(user_id)
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Live knowledge bases marked public.
pub async fn list_public(pool: &SqlitePool) -> Result<Vec<KnowledgeBase>> {
    let rows = sqlx::query_as::<_, KnowledgeBase>(&format!(
        "{KB_SELECT} WHERE {PUBLICLY_VISIBLE} {KB_ORDER}"
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Visible knowledge bases the user does not own.
pub async fn list_shared_with(pool: &SqlitePool, user_id: &str) -> Result<Vec<KnowledgeBase>> {
    let rows = sqlx::query_as::<_, KnowledgeBase>(&format!(
        "{KB_SELECT} WHERE {VISIBLE_TO_USER} AND kb.created_by != ? {KB_ORDER}"
    ))
    .bind(user_id)
    .bind(user_id)
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Apply a partial update to a live knowledge base.
pub async fn update_knowledge_base(
    pool: &SqlitePool,
    id: &str,
    update: &KnowledgeBaseUpdate,
) -> Result<KnowledgeBase> {
    let current = get_knowledge_base(pool, id).await?;
    if !current.lifecycle.is_active() {
        return Err(DatabaseError::not_found("KnowledgeBase", id));
    }

    let name = match update.name.as_deref() {
        Some(name) => validate_required("name", name, MAX_NAME_LENGTH)?.to_string(),
        None => current.name,
    };
    let description = match &update.description {
        Some(description) => description.clone(),
        None => current.description,
    };
    let icon = match &update.icon {
        Some(Some(icon)) => {
            validate_length("icon", icon, MAX_ICON_LENGTH)?;
            Some(icon.clone())
        }
        Some(None) => None,
        None => current.icon,
    };
    let chunking = ChunkingConfig {
        chunk_size: update.chunk_size.unwrap_or(current.chunk_size),
        chunk_overlap: update.chunk_overlap.unwrap_or(current.chunk_overlap),
        similarity_threshold: update
            .similarity_threshold
            .unwrap_or(current.similarity_threshold),
        top_k: update.top_k.unwrap_or(current.top_k),
    };
    chunking.validate()?;
    let status = update.status.unwrap_or(current.status);
    let is_public = update.is_public.unwrap_or(current.is_public);

    sqlx::query(
        r#"
        UPDATE knowledge_bases
        SET name = ?, description = ?, icon = ?, status = ?, is_public = ?,
            chunk_size = ?, chunk_overlap = ?, similarity_threshold = ?, top_k = ?,
            updated_at = datetime('now')
        WHERE id = ? AND lifecycle = 'active'
        "#,
    )
    .bind(&name)
    .bind(&description)
    .bind(&icon)
    .bind(status)
    .bind(is_public)
    .bind(chunking.chunk_size)
    .bind(chunking.chunk_overlap)
    .bind(chunking.similarity_threshold)
    .bind(chunking.top_k)
    .bind(id)
    .execute(pool)
    .await
    .map_err(map_name_conflict)?;

    get_knowledge_base(pool, id).await
}

/// Hide a knowledge base. The row and its children are kept.
pub async fn soft_delete_knowledge_base(pool: &SqlitePool, id: &str) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE knowledge_bases
        SET lifecycle = 'deleted', deleted_at = datetime('now'), updated_at = datetime('now')
        WHERE id = ? AND lifecycle = 'active'
        "#,
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("KnowledgeBase", id));
    }

    tracing::info!(knowledge_base_id = %id, "Soft-deleted knowledge base");
    Ok(())
}

/// Bring a soft-deleted knowledge base back.
///
/// Fails with a name validation error if the owner has since reused the name.
pub async fn restore_knowledge_base(pool: &SqlitePool, id: &str) -> Result<KnowledgeBase> {
    let result = sqlx::query(
        r#"
        UPDATE knowledge_bases
        SET lifecycle = 'active', deleted_at = NULL, updated_at = datetime('now')
        WHERE id = ? AND lifecycle = 'deleted'
        "#,
    )
    .bind(id)
    .execute(pool)
    .await
    .map_err(map_name_conflict)?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("KnowledgeBase", id));
    }

    tracing::info!(knowledge_base_id = %id, "Restored knowledge base");
    get_knowledge_base(pool, id).await
}
