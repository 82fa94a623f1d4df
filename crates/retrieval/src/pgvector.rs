//! PostgreSQL + pgvector store.
//!
//! Similarity is pgvector's cosine distance operator `<=>`, reported as
//! `1 - distance` so scores line up with the other backends.
//!
//! This module is behind the `postgres` feature flag.

use async_trait::async_trait;
use contractlens_core::error::RetrievalError;
use contractlens_core::retrieval::{ChunkFilter, ChunkRecord, ScoredChunk, VectorStore};
use sqlx::Row;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use tracing::{debug, info};

pub struct PgVectorStore {
    pool: PgPool,
    table: String,
    dimensions: usize,
}

impl PgVectorStore {
    /// `table` must be a plain identifier; config validation enforces that.
    pub async fn connect(
        database_url: &str,
        table: &str,
        dimensions: usize,
    ) -> Result<Self, RetrievalError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| RetrievalError::Store(format!("PostgreSQL connection failed: {e}")))?;

        info!(table, "Connected to PostgreSQL for vector storage");
        Ok(Self::from_pool(pool, table, dimensions))
    }

    pub fn from_pool(pool: PgPool, table: &str, dimensions: usize) -> Self {
        Self {
            pool,
            table: table.to_string(),
            dimensions,
        }
    }

    /// Create the extension, table and ANN index if missing.
    pub async fn migrate(&self) -> Result<(), RetrievalError> {
        sqlx::raw_sql(&schema_sql(&self.table, self.dimensions))
            .execute(&self.pool)
            .await
            .map_err(|e| RetrievalError::Store(format!("Migration failed: {e}")))?;

        info!(table = %self.table, "Vector schema migration complete");
        Ok(())
    }
}

fn schema_sql(table: &str, dimensions: usize) -> String {
    format!(
        "CREATE EXTENSION IF NOT EXISTS vector;\n\
         CREATE TABLE IF NOT EXISTS {table} (\n    \
             id TEXT PRIMARY KEY,\n    \
             document_id TEXT NOT NULL,\n    \
             title TEXT NOT NULL,\n    \
             chunk_index INTEGER NOT NULL,\n    \
             content TEXT NOT NULL,\n    \
             embedding vector({dimensions}) NOT NULL\n\
         );\n\
         CREATE INDEX IF NOT EXISTS {table}_document_idx ON {table} (document_id);\n\
         CREATE INDEX IF NOT EXISTS {table}_embedding_idx ON {table} \
         USING hnsw (embedding vector_cosine_ops);"
    )
}

/// pgvector accepts the text form `[a,b,c]` cast with `::vector`.
fn vector_literal(values: &[f32]) -> String {
    let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    format!("[{}]", parts.join(","))
}

fn row_to_chunk(row: &PgRow) -> ScoredChunk {
    let chunk_index: i32 = row.get("chunk_index");
    let score: f64 = row.get("score");
    ScoredChunk {
        id: row.get("id"),
        document_id: row.get("document_id"),
        title: row.get("title"),
        chunk_index: chunk_index.max(0) as usize,
        text: row.get("content"),
        score: score as f32,
    }
}

#[async_trait]
impl VectorStore for PgVectorStore {
    fn name(&self) -> &str {
        "pgvector"
    }

    async fn upsert(&self, records: Vec<ChunkRecord>) -> Result<(), RetrievalError> {
        let sql = format!(
            "INSERT INTO {} (id, document_id, title, chunk_index, content, embedding) \
             VALUES ($1, $2, $3, $4, $5, $6::vector) \
             ON CONFLICT (id) DO UPDATE SET \
               document_id = EXCLUDED.document_id, \
               title = EXCLUDED.title, \
               chunk_index = EXCLUDED.chunk_index, \
               content = EXCLUDED.content, \
               embedding = EXCLUDED.embedding",
            self.table
        );

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| RetrievalError::Store(format!("Failed to begin transaction: {e}")))?;

        for record in &records {
            sqlx::query(&sql)
                .bind(&record.id)
                .bind(&record.document_id)
                .bind(&record.title)
                .bind(record.chunk_index as i32)
                .bind(&record.text)
                .bind(vector_literal(&record.embedding))
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    RetrievalError::Store(format!("Failed to upsert chunk {}: {e}", record.id))
                })?;
        }

        tx.commit()
            .await
            .map_err(|e| RetrievalError::Store(format!("Failed to commit upsert: {e}")))?;

        debug!(count = records.len(), "Upserted chunks into pgvector");
        Ok(())
    }

    async fn query(
        &self,
        vector: &[f32],
        top_k: usize,
        filter: &ChunkFilter,
    ) -> Result<Vec<ScoredChunk>, RetrievalError> {
        let document_clause = if filter.document_id.is_some() {
            "WHERE document_id = $3 "
        } else {
            ""
        };
        let sql = format!(
            "SELECT id, document_id, title, chunk_index, content, \
             1.0 - (embedding <=> $1::vector) AS score \
             FROM {} {document_clause}\
             ORDER BY embedding <=> $1::vector ASC \
             LIMIT $2",
            self.table
        );

        let mut query = sqlx::query(&sql).bind(vector_literal(vector)).bind(top_k as i64);
        if let Some(document_id) = &filter.document_id {
            query = query.bind(document_id);
        }

        let rows = query
            .fetch_all(&self.pool)
            .await
            .map_err(|e| RetrievalError::Store(format!("Vector search failed: {e}")))?;

        Ok(rows.iter().map(row_to_chunk).collect())
    }

    async fn delete(&self, ids: &[String]) -> Result<(), RetrievalError> {
        if ids.is_empty() {
            return Ok(());
        }
        let sql = format!("DELETE FROM {} WHERE id = ANY($1)", self.table);
        sqlx::query(&sql)
            .bind(ids)
            .execute(&self.pool)
            .await
            .map_err(|e| RetrievalError::Store(format!("Failed to delete chunks: {e}")))?;
        Ok(())
    }

    async fn health_check(&self) -> Result<bool, RetrievalError> {
        Ok(sqlx::query("SELECT 1").execute(&self.pool).await.is_ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_literal_format() {
        assert_eq!(vector_literal(&[0.1, 0.2, 0.3]), "[0.1,0.2,0.3]");
        assert_eq!(vector_literal(&[]), "[]");
    }

    #[test]
    fn schema_uses_table_and_dimensions() {
        let sql = schema_sql("contract_chunks", 1536);
        assert!(sql.contains("CREATE TABLE IF NOT EXISTS contract_chunks"));
        assert!(sql.contains("vector(1536)"));
        assert!(sql.contains("vector_cosine_ops"));
    }
}
