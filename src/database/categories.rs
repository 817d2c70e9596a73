//! Category statistics and hierarchy queries.

use sqlx::Row;

use crate::database::Database;
use crate::models::CategoryInfo;
use crate::Result;

impl Database {
    /// All active leaf categories with their counters and full hierarchical
    /// paths, ordered by scarcity (fewest unsolved first, then lowest id).
    pub async fn leaf_category_stats(&self) -> Result<Vec<CategoryInfo>> {
        let rows = sqlx::query(
            r"
            WITH RECURSIVE category_paths AS (
                SELECT id, name, parent_id, name::text AS path
                FROM categories
                WHERE parent_id IS NULL

                UNION ALL

                SELECT c.id, c.name, c.parent_id, cp.path || ' > ' || c.name
                FROM categories c
                INNER JOIN category_paths cp ON c.parent_id = cp.id
            )
            SELECT c.id, c.name, cp.path, c.question_count, c.unsolved_count
            FROM categories c
            INNER JOIN category_paths cp ON cp.id = c.id
            WHERE c.is_leaf = TRUE AND c.status = 'active'
            ORDER BY c.unsolved_count ASC, c.id ASC
            ",
        )
        .fetch_all(self.pool())
        .await?;

        let categories = rows
            .into_iter()
            .map(|row| {
                Ok(CategoryInfo {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    path: row.try_get("path")?,
                    question_count: row.try_get("question_count")?,
                    unsolved_count: row.try_get("unsolved_count")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(categories)
    }

    /// Full hierarchical path of one category, root first.
    pub async fn category_path(&self, category_id: i64) -> Result<String> {
        let row = sqlx::query(
            r"
            WITH RECURSIVE category_path AS (
                SELECT id, name, parent_id, name::text AS path
                FROM categories
                WHERE id = $1

                UNION ALL

                SELECT c.id, c.name, c.parent_id, c.name || ' > ' || cp.path
                FROM categories c
                INNER JOIN category_path cp ON c.id = cp.parent_id
            )
            SELECT path FROM category_path
            WHERE parent_id IS NULL
            ",
        )
        .bind(category_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(row
            .map(|r| r.try_get("path"))
            .transpose()?
            .unwrap_or_default())
    }

    /// Total unsolved questions across active leaf categories. Drives the
    /// per-run generation target.
    pub async fn total_unsolved(&self) -> Result<i64> {
        let row = sqlx::query(
            r"
            SELECT COALESCE(SUM(unsolved_count), 0)::BIGINT AS total
            FROM categories
            WHERE is_leaf = TRUE AND status = 'active'
            ",
        )
        .fetch_one(self.pool())
        .await?;

        Ok(row.try_get("total")?)
    }
}
