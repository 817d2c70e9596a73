//! Schema bootstrap for the `quizgen` tables.

use crate::database::Database;
use crate::Result;

impl Database {
    /// Create the pgvector extension and all tables if they do not exist.
    /// `embedding_dimension` must match the embedding model in use.
    pub async fn ensure_schema(&self, embedding_dimension: usize) -> Result<()> {
        sqlx::query("CREATE EXTENSION IF NOT EXISTS vector")
            .execute(self.pool())
            .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS categories (
                id BIGSERIAL PRIMARY KEY,
                name TEXT NOT NULL,
                parent_id BIGINT REFERENCES categories(id),
                is_leaf BOOLEAN NOT NULL DEFAULT FALSE,
                status TEXT NOT NULL DEFAULT 'active',
                question_count BIGINT NOT NULL DEFAULT 0,
                unsolved_count BIGINT NOT NULL DEFAULT 0
            )
            ",
        )
        .execute(self.pool())
        .await?;

        sqlx::query(&format!(
            r"
            CREATE TABLE IF NOT EXISTS document_embeddings (
                id BIGSERIAL PRIMARY KEY,
                content TEXT NOT NULL,
                embedding vector({embedding_dimension})
            )
            ",
        ))
        .execute(self.pool())
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS questions (
                id BIGSERIAL PRIMARY KEY,
                question_type TEXT NOT NULL,
                content TEXT NOT NULL,
                correct_answer TEXT NOT NULL,
                explanation TEXT NOT NULL DEFAULT '',
                difficulty INT NOT NULL DEFAULT 1,
                quality_score INT NOT NULL DEFAULT 0,
                model_name TEXT NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            ",
        )
        .execute(self.pool())
        .await?;

        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS category_questions (
                category_id BIGINT NOT NULL REFERENCES categories(id),
                question_id BIGINT NOT NULL REFERENCES questions(id),
                PRIMARY KEY (category_id, question_id)
            )
            ",
        )
        .execute(self.pool())
        .await?;

        tracing::info!("Schema ensured (embedding dimension: {embedding_dimension})");
        Ok(())
    }
}
