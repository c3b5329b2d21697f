//! Document records counted by the knowledge base statistics.

use sqlx::SqlitePool;

use crate::error::{DatabaseError, Result};
use crate::models::Document;
use crate::validation::{validate_required, ValidationError};

const MAX_TITLE_LENGTH: usize = 255;

/// Fields accepted when recording a document.
#[derive(Debug, Clone, Default)]
pub struct NewDocument {
    pub title: String,
    pub chunks_count: i64,
    pub file_size: i64,
}

/// Record a document against a knowledge base.
pub async fn create_document(
    pool: &SqlitePool,
    knowledge_base_id: &str,
    new: &NewDocument,
) -> Result<Document> {
    let title = validate_required("title", &new.title, MAX_TITLE_LENGTH)?;
    if new.chunks_count < 0 {
        return Err(ValidationError::invalid("chunks_count", "must not be negative").into());
    }
    if new.file_size < 0 {
        return Err(ValidationError::invalid("file_size", "must not be negative").into());
    }

    let document = sqlx::query_as::<_, Document>(
        r#"
        INSERT INTO documents (id, knowledge_base_id, title, chunks_count, file_size)
        VALUES (?, ?, ?, ?, ?)
        RETURNING id, knowledge_base_id, title, chunks_count, file_size, is_deleted,
                  created_at, updated_at
        "#,
    )
    .bind(uuid::Uuid::new_v4().to_string())
    .bind(knowledge_base_id)
    .bind(title)
    .bind(new.chunks_count)
    .bind(new.file_size)
    .fetch_one(pool)
    .await?;

    Ok(document)
}

/// Mark a document deleted so it no longer counts.
pub async fn soft_delete_document(pool: &SqlitePool, id: &str) -> Result<()> {
    let result = sqlx::query(
        "UPDATE documents SET is_deleted = 1, updated_at = datetime('now') WHERE id = ? AND is_deleted = 0",
    )
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("Document", id));
    }

    Ok(())
}

/// Live documents of a knowledge base.
pub async fn list_documents(pool: &SqlitePool, knowledge_base_id: &str) -> Result<Vec<Document>> {
    let documents = sqlx::query_as::<_, Document>(
        r#"
        SELECT id, knowledge_base_id, title, chunks_count, file_size, is_deleted,
               created_at, updated_at
        FROM documents
        WHERE knowledge_base_id = ? AND is_deleted = 0
        ORDER BY created_at, rowid
        "#,
    )
    .bind(knowledge_base_id)
    .fetch_all(pool)
    .await?;

    Ok(documents)
}
