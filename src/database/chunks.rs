//! Document chunk queries: vector similarity search and content lookup.

use pgvector::Vector;
use sqlx::Row;

use crate::database::Database;
use crate::models::RetrievedChunk;
use crate::Result;

impl Database {
    /// Top-K nearest chunks to `embedding` by cosine distance.
    pub async fn similar_chunks(
        &self,
        embedding: Vec<f32>,
        top_k: i64,
    ) -> Result<Vec<RetrievedChunk>> {
        let rows = sqlx::query(
            r"
            SELECT id, content, embedding <=> $1 AS distance
            FROM document_embeddings
            ORDER BY distance ASC
            LIMIT $2
            ",
        )
        .bind(Vector::from(embedding))
        .bind(top_k)
        .fetch_all(self.pool())
        .await?;

        let chunks = rows
            .into_iter()
            .map(|row| {
                let distance: f64 = row.try_get("distance")?;
                Ok(RetrievedChunk {
                    id: row.try_get("id")?,
                    content: row.try_get("content")?,
                    similarity: 1.0 - distance as f32,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(chunks)
    }

    /// Contents of the given chunk ids. Unknown ids are silently absent
    /// from the result.
    pub async fn chunk_contents(&self, chunk_ids: &[i64]) -> Result<Vec<String>> {
        if chunk_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows = sqlx::query(
            r"
            SELECT content
            FROM document_embeddings
            WHERE id = ANY($1)
            ",
        )
        .bind(chunk_ids)
        .fetch_all(self.pool())
        .await?;

        let contents = rows
            .into_iter()
            .map(|row| Ok(row.try_get("content")?))
            .collect::<Result<Vec<_>>>()?;

        Ok(contents)
    }
}
