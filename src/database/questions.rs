//! Persistence writer for admitted questions.
//!
//! Question inserts, category-question associations, and category counter
//! increments all happen inside one transaction; any failure rolls back the
//! whole batch.

use std::collections::HashMap;

use sqlx::Postgres;
use sqlx::Row;
use sqlx::Transaction;

use crate::database::Database;
use crate::models::QuestionType;
use crate::models::ScoredQuestion;
use crate::QuizGenError;
use crate::Result;

const INDEX_TO_LETTER: [&str; 4] = ["A", "B", "C", "D"];

/// Strip a redundant leading label the model may have echoed into an option
/// text, e.g. "A. Source address" or "2) Checksum".
fn clean_option_text(text: &str) -> String {
    let trimmed = text.trim();

    let mut label_len = 0;
    for c in trimmed.chars() {
        let is_label_char = c.is_ascii_digit() || matches!(c.to_ascii_uppercase(), 'A'..='D');
        if is_label_char {
            label_len += c.len_utf8();
        } else {
            break;
        }
    }

    if label_len > 0 {
        let rest = &trimmed[label_len..];
        if let Some(stripped) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            return stripped.trim_start().to_string();
        }
    }

    trimmed.to_string()
}

/// Map a question to its storage form: (content blob, canonical answer).
/// Multiple choice becomes a JSON object with options re-keyed A-D and the
/// answer stored as the matching letter; other types store plain text.
fn storage_form(question: &ScoredQuestion) -> Result<(String, String)> {
    let q = &question.question;
    if q.question_type == QuestionType::MultipleChoice {
        let mut options = serde_json::Map::new();
        for (i, opt) in q.options.iter().take(4).enumerate() {
            options.insert(
                INDEX_TO_LETTER[i].to_string(),
                serde_json::Value::String(clean_option_text(opt)),
            );
        }
        let content = serde_json::json!({
            "question": q.question,
            "options": options,
        });
        let letter = INDEX_TO_LETTER
            .get(q.correct_index)
            .copied()
            .unwrap_or("A");
        Ok((serde_json::to_string(&content)?, letter.to_string()))
    } else {
        Ok((q.question.clone(), q.answer.clone()))
    }
}

impl Database {
    /// Save a batch of admitted questions atomically. Returns the assigned
    /// question ids. On any failure the transaction is rolled back and no
    /// row or counter changes.
    pub async fn save_questions(
        &self,
        questions: &[ScoredQuestion],
        model_name: &str,
    ) -> Result<Vec<i64>> {
        if questions.is_empty() {
            return Ok(Vec::new());
        }

        let mut tx = self.pool().begin().await?;

        match insert_batch(&mut tx, questions, model_name).await {
            Ok(ids) => {
                tx.commit().await?;
                Ok(ids)
            }
            Err(e) => {
                tx.rollback().await.ok();
                Err(QuizGenError::Persistence(format!(
                    "question batch save failed: {e}"
                )))
            }
        }
    }
}

async fn insert_batch(
    tx: &mut Transaction<'_, Postgres>,
    questions: &[ScoredQuestion],
    model_name: &str,
) -> Result<Vec<i64>> {
    let mut saved_ids = Vec::with_capacity(questions.len());
    let mut parent_cache: HashMap<i64, Option<i64>> = HashMap::new();
    let mut category_counts: HashMap<i64, i64> = HashMap::new();
    let mut associations: Vec<(i64, i64)> = Vec::new();

    for question in questions {
        question
            .question
            .validate()
            .map_err(QuizGenError::Persistence)?;

        let (content, correct_answer) = storage_form(question)?;
        let difficulty = i32::from(u8::from(question.question.difficulty));
        let quality_score = question.scores.quality_score();

        let row = sqlx::query(
            r"
            INSERT INTO questions
                (question_type, content, correct_answer, explanation, difficulty, quality_score, model_name)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            ",
        )
        .bind(question.question.question_type.storage_tag())
        .bind(&content)
        .bind(&correct_answer)
        .bind(&question.question.explanation)
        .bind(difficulty)
        .bind(quality_score)
        .bind(model_name)
        .fetch_one(&mut **tx)
        .await?;

        let question_id: i64 = row.try_get("id")?;
        saved_ids.push(question_id);

        let category_id = question.question.category_id;
        if category_id > 0 {
            // Resolve the parent grouping once per distinct category
            if !parent_cache.contains_key(&category_id) {
                let parent_row = sqlx::query("SELECT parent_id FROM categories WHERE id = $1")
                    .bind(category_id)
                    .fetch_optional(&mut **tx)
                    .await?;
                let parent: Option<i64> = match parent_row {
                    Some(r) => r.try_get("parent_id")?,
                    None => None,
                };
                parent_cache.insert(category_id, parent);
            }

            if let Some(parent_id) = parent_cache[&category_id] {
                associations.push((parent_id, question_id));
            }

            *category_counts.entry(category_id).or_insert(0) += 1;
        }
    }

    for (parent_id, question_id) in associations {
        sqlx::query("INSERT INTO category_questions (category_id, question_id) VALUES ($1, $2)")
            .bind(parent_id)
            .bind(question_id)
            .execute(&mut **tx)
            .await?;
    }

    // New questions are by definition unanswered, so both counters move
    for (category_id, count) in category_counts {
        sqlx::query(
            r"
            UPDATE categories
            SET question_count = question_count + $1,
                unsolved_count = unsolved_count + $1
            WHERE id = $2
            ",
        )
        .bind(count)
        .bind(category_id)
        .execute(&mut **tx)
        .await?;
    }

    Ok(saved_ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Difficulty;
    use crate::models::GeneratedQuestion;
    use crate::models::QuestionScores;

    fn scored_multiple_choice() -> ScoredQuestion {
        ScoredQuestion {
            question: GeneratedQuestion {
                question_type: QuestionType::MultipleChoice,
                difficulty: Difficulty::Intermediate,
                question: "Which header field is checked first?".to_string(),
                answer: "B. Destination port".to_string(),
                explanation: "Ports route the segment.".to_string(),
                options: vec![
                    "A. Source address".to_string(),
                    "B. Destination port".to_string(),
                    "C) Sequence number".to_string(),
                    "Checksum".to_string(),
                ],
                correct_index: 1,
                category_id: 11,
                category_name: "tcp".to_string(),
                chunk_ids: vec![1],
            },
            scores: QuestionScores {
                faithfulness: 0.95,
                answer_relevancy: 0.8,
            },
        }
    }

    #[test]
    fn test_clean_option_text_strips_labels() {
        assert_eq!(clean_option_text("A. Source address"), "Source address");
        assert_eq!(clean_option_text("b) lower case"), "lower case");
        assert_eq!(clean_option_text("2. numbered"), "numbered");
        assert_eq!(clean_option_text("12) double digit"), "double digit");
    }

    #[test]
    fn test_clean_option_text_keeps_plain_text() {
        assert_eq!(clean_option_text("Checksum"), "Checksum");
        assert_eq!(clean_option_text("TCP. reliable"), "TCP. reliable");
        assert_eq!(clean_option_text("  padded  "), "padded");
    }

    #[test]
    fn test_storage_form_multiple_choice() {
        let q = scored_multiple_choice();
        let (content, answer) = storage_form(&q).unwrap();
        assert_eq!(answer, "B");
        let parsed: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed["options"]["A"], "Source address");
        assert_eq!(parsed["options"]["C"], "Sequence number");
        assert_eq!(parsed["options"]["D"], "Checksum");
    }

    #[test]
    fn test_storage_form_plain_types() {
        let mut q = scored_multiple_choice();
        q.question.question_type = QuestionType::ShortAnswer;
        q.question.options.clear();
        q.question.answer = "Destination port".to_string();
        let (content, answer) = storage_form(&q).unwrap();
        assert_eq!(content, q.question.question);
        assert_eq!(answer, "Destination port");
    }

    #[tokio::test]
    #[ignore = "Requires database access"]
    async fn test_save_batch_is_atomic() {
        let config = crate::AppConfig::load().unwrap();
        let database = Database::from_config(&config).await.unwrap();
        database.ensure_schema(4).await.unwrap();

        let before: i64 = sqlx::query("SELECT COUNT(*)::BIGINT AS n FROM questions")
            .fetch_one(database.pool())
            .await
            .unwrap()
            .try_get("n")
            .unwrap();

        // Batch where the middle item fails validation inside the
        // transaction: nothing from the batch may persist.
        let good = scored_multiple_choice();
        let mut bad = scored_multiple_choice();
        bad.question.answer = String::new();
        let batch = vec![good.clone(), bad, good];

        let result = database.save_questions(&batch, "HCX-007").await;
        assert!(result.is_err());

        let after: i64 = sqlx::query("SELECT COUNT(*)::BIGINT AS n FROM questions")
            .fetch_one(database.pool())
            .await
            .unwrap()
            .try_get("n")
            .unwrap();
        assert_eq!(before, after);
    }
}
