//! Tags scoped to a single knowledge base.

use sqlx::SqlitePool;

use crate::error::{is_unique_violation, DatabaseError, Result};
use crate::models::KnowledgeBaseTag;
use crate::validation::{validate_color, validate_required, MAX_TAG_NAME_LENGTH};

/// Color given to tags created without one.
pub const DEFAULT_TAG_COLOR: &str = "#1890ff";

/// Attach a tag to a knowledge base.
///
/// Tag names are unique within a knowledge base; a duplicate leaves the
/// existing tag untouched.
pub async fn add_tag(
    pool: &SqlitePool,
    knowledge_base_id: &str,
    name: &str,
    color: Option<&str>,
) -> Result<KnowledgeBaseTag> {
    let name = validate_required("name", name, MAX_TAG_NAME_LENGTH)?;
    let color = color.map(str::trim).unwrap_or(DEFAULT_TAG_COLOR);
    validate_color(color)?;

    let tag = sqlx::query_as::<_, KnowledgeBaseTag>(
        r#"
        INSERT INTO knowledge_base_tags (id, knowledge_base_id, name, color)
        VALUES (?, ?, ?, ?)
        RETURNING id, knowledge_base_id, name, color, created_at, updated_at
        "#,
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(knowledge_base_id)
    .bind(name)
    .bind(color)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            DatabaseError::AlreadyExists {
                entity: "KnowledgeBaseTag",
                id: name.to_string(),
            }
        } else {
            DatabaseError::Sqlx(e)
        }
    })?;

    tracing::debug!(knowledge_base_id = %knowledge_base_id, tag = %tag.name, "Added tag");
    Ok(tag)
}

/// Remove a tag by name.
pub async fn remove_tag(pool: &SqlitePool, knowledge_base_id: &str, name: &str) -> Result<()> {
    let name = name.trim();
    let result = sqlx::query("DELETE FROM knowledge_base_tags WHERE knowledge_base_id = ? AND name = ?")
        .bind(knowledge_base_id)
        .bind(name)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("KnowledgeBaseTag", name));
    }

    Ok(())
}

/// List a knowledge base's tags, oldest first.
pub async fn list_tags(pool: &SqlitePool, knowledge_base_id: &str) -> Result<Vec<KnowledgeBaseTag>> {
    let tags = sqlx::query_as::<_, KnowledgeBaseTag>(
        r#"
        SELECT id, knowledge_base_id, name, color, created_at, updated_at
        FROM knowledge_base_tags
        WHERE knowledge_base_id = ?
        ORDER BY created_at, rowid
        "#,
    )
    .bind(knowledge_base_id)
    .fetch_all(pool)
    .await?;

    Ok(tags)
}

/// Just the tag names, as embedded in knowledge base responses.
pub async fn list_tag_names(pool: &SqlitePool, knowledge_base_id: &str) -> Result<Vec<String>> {
    let names = sqlx::query_scalar::<_, String>(
        "SELECT name FROM knowledge_base_tags WHERE knowledge_base_id = ? ORDER BY created_at, rowid",
    )
    .bind(knowledge_base_id)
    .fetch_all(pool)
    .await?;

    Ok(names)
}
