//! Knowledge base counters derived from its documents.

use sqlx::SqlitePool;

use crate::error::Result;
use crate::models::KnowledgeBase;

#[derive(sqlx::FromRow)]
struct Totals {
    documents: i64,
    chunks: i64,
    size: i64,
}

/// Recompute `documents_count`, `chunks_count` and `total_size` from the
/// live documents. Aggregation and write happen in one transaction.
pub async fn recompute_stats(pool: &SqlitePool, knowledge_base_id: &str) -> Result<KnowledgeBase> {
    let mut tx = pool.begin().await?;

    let totals = sqlx::query_as::<_, Totals>(
        r#"
        SELECT COUNT(*) AS documents,
               COALESCE(SUM(chunks_count), 0) AS chunks,
               COALESCE(SUM(file_size), 0) AS size
        FROM documents
        WHERE knowledge_base_id = ? AND is_deleted = 0
        "#,
    )
    .bind(knowledge_base_id)
    .fetch_one(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        UPDATE knowledge_bases
        SET documents_count = ?, chunks_count = ?, total_size = ?, updated_at = datetime('now')
        WHERE id = ?
        "#,
    )
    .bind(totals.documents)
    .bind(totals.chunks)
    .bind(totals.size)
    .bind(knowledge_base_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;

    tracing::debug!(
        knowledge_base_id = %knowledge_base_id,
        documents = totals.documents,
        chunks = totals.chunks,
        size = totals.size,
        "Recomputed knowledge base stats"
    );

    crate::knowledge_base::get_knowledge_base(pool, knowledge_base_id).await
}
