//! Admission gate: fixed quality thresholds over evaluation scores.

use std::collections::HashMap;

use crate::models::GeneratedQuestion;
use crate::models::QuestionScores;
use crate::models::RejectedQuestion;
use crate::models::ScoredQuestion;

pub const FAITHFULNESS_THRESHOLD: f64 = 0.9;
pub const ANSWER_RELEVANCY_THRESHOLD: f64 = 0.7;

/// Split questions into passed and rejected by their scores, keyed by the
/// question's index in `questions`. Questions without a score (excluded
/// from evaluation) are rejected with `scores: None` so they still appear
/// in the rejection log.
#[must_use]
pub fn classify(
    questions: Vec<GeneratedQuestion>,
    scores: &HashMap<usize, QuestionScores>,
) -> (Vec<ScoredQuestion>, Vec<RejectedQuestion>) {
    let mut passed = Vec::new();
    let mut rejected = Vec::new();

    for (key, question) in questions.into_iter().enumerate() {
        match scores.get(&key) {
            Some(&s)
                if s.faithfulness >= FAITHFULNESS_THRESHOLD
                    && s.answer_relevancy >= ANSWER_RELEVANCY_THRESHOLD =>
            {
                passed.push(ScoredQuestion {
                    question,
                    scores: s,
                });
            }
            other => {
                rejected.push(RejectedQuestion {
                    question,
                    scores: other.copied(),
                    rejected_at: chrono::Utc::now().to_rfc3339(),
                });
            }
        }
    }

    (passed, rejected)
}
