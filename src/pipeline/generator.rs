//! Question generation: one structured-output call per round, then chunk-id
//! filtering and local validation of each candidate.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;
use tracing::warn;

use crate::config::ModelPricing;
use crate::cost::calculate_cost;
use crate::cost::TokenUsage;
use crate::llm::prompts;
use crate::llm::ChatMessage;
use crate::llm::ClovaClient;
use crate::models::Difficulty;
use crate::models::GeneratedQuestion;
use crate::models::QuestionGenerationContext;
use crate::models::QuestionType;
use crate::Result;

const GENERATION_MAX_TOKENS: u32 = 4096;

pub struct QuestionGenerator {
    clova: Arc<ClovaClient>,
    pricing: ModelPricing,
}

impl QuestionGenerator {
    #[must_use]
    pub fn new(clova: Arc<ClovaClient>, pricing: ModelPricing) -> Self {
        Self { clova, pricing }
    }

    /// Generate candidate questions for one round. A reply that is not
    /// valid JSON fails the whole call; individual malformed or ungrounded
    /// candidates are dropped with a diagnostic.
    pub async fn generate(
        &self,
        context: &QuestionGenerationContext,
    ) -> Result<(Vec<GeneratedQuestion>, TokenUsage)> {
        let chunks: Vec<(i64, &str)> = context
            .chunk_ids
            .iter()
            .copied()
            .zip(context.chunks.iter().map(String::as_str))
            .collect();

        let messages = [
            ChatMessage::system(prompts::GENERATION_SYSTEM_PROMPT),
            ChatMessage::user(prompts::build_generation_prompt(
                &context.category_name,
                &context.category_path,
                &chunks,
                context.target_question_count,
            )),
        ];

        let outcome = self
            .clova
            .chat_structured(&messages, prompts::question_schema(), GENERATION_MAX_TOKENS)
            .await?;

        let usage = calculate_cost(
            outcome.usage.input_tokens,
            outcome.usage.output_tokens,
            self.pricing,
        );

        let questions = parse_reply(&outcome.content, context)?;
        Ok((questions, usage))
    }
}

#[derive(Debug, Deserialize)]
struct RawQuestion {
    question_type: QuestionType,
    difficulty: Difficulty,
    question: String,
    answer: String,
    #[serde(default)]
    explanation: String,
    #[serde(default)]
    options: Vec<String>,
    #[serde(default)]
    correct_index: usize,
    #[serde(default)]
    chunk_ids: Vec<i64>,
}

/// Parse the model reply into validated questions. Candidates whose chunk
/// references all fall outside the context are discarded before validation;
/// ungrounded questions must never reach evaluation.
fn parse_reply(
    content: &str,
    context: &QuestionGenerationContext,
) -> Result<Vec<GeneratedQuestion>> {
    let reply: serde_json::Value = serde_json::from_str(content)?;
    let items = reply
        .get("questions")
        .and_then(serde_json::Value::as_array)
        .cloned()
        .unwrap_or_default();

    let valid_ids: HashSet<i64> = context.chunk_ids.iter().copied().collect();
    let mut questions = Vec::with_capacity(items.len());

    for item in items {
        let raw: RawQuestion = match serde_json::from_value(item) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("Discarding malformed candidate: {e}");
                continue;
            }
        };

        let chunk_ids: Vec<i64> = raw
            .chunk_ids
            .iter()
            .copied()
            .filter(|id| valid_ids.contains(id))
            .collect();

        if chunk_ids.is_empty() {
            warn!(
                "Discarding candidate with no valid chunk references: {}",
                truncate(&raw.question, 50)
            );
            continue;
        }

        let question = GeneratedQuestion {
            question_type: raw.question_type,
            difficulty: raw.difficulty,
            question: raw.question,
            answer: raw.answer,
            explanation: raw.explanation,
            options: raw.options,
            correct_index: raw.correct_index,
            category_id: context.category_id,
            category_name: context.category_name.clone(),
            chunk_ids,
        };

        if let Err(reason) = question.validate() {
            warn!("Discarding invalid candidate: {reason}");
            continue;
        }

        questions.push(question);
    }

    Ok(questions)
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context() -> QuestionGenerationContext {
        QuestionGenerationContext {
            category_id: 11,
            category_name: "tcp".to_string(),
            category_path: "Networks > Transport > tcp".to_string(),
            chunks: vec![
                "TCP provides reliable delivery.".to_string(),
                "UDP is connectionless.".to_string(),
            ],
            chunk_ids: vec![3970, 3065],
            target_question_count: 10,
        }
    }

    fn candidate(chunk_ids: &[i64]) -> serde_json::Value {
        serde_json::json!({
            "question_type": "short_answer",
            "difficulty": 1,
            "question": "What does TCP provide?",
            "answer": "Reliable delivery",
            "explanation": "TCP retransmits lost segments.",
            "chunk_ids": chunk_ids,
        })
    }

    fn reply(candidates: Vec<serde_json::Value>) -> String {
        serde_json::json!({ "questions": candidates }).to_string()
    }

    #[test]
    fn test_parse_keeps_grounded_candidates() {
        let raw = reply(vec![candidate(&[3970]), candidate(&[3065, 3970])]);
        let questions = parse_reply(&raw, &context()).unwrap();
        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].category_id, 11);
        assert_eq!(questions[1].chunk_ids, vec![3065, 3970]);
    }

    #[test]
    fn test_parse_drops_candidates_with_only_unknown_chunk_ids() {
        let raw = reply(vec![
            candidate(&[999]),
            candidate(&[3970]),
            candidate(&[999, 1000]),
        ]);
        let questions = parse_reply(&raw, &context()).unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].chunk_ids, vec![3970]);
    }

    #[test]
    fn test_parse_filters_unknown_ids_from_mixed_references() {
        let raw = reply(vec![candidate(&[999, 3065])]);
        let questions = parse_reply(&raw, &context()).unwrap();
        assert_eq!(questions[0].chunk_ids, vec![3065]);
    }

    #[test]
    fn test_parse_drops_invalid_candidate_but_keeps_batch() {
        let mut bad = candidate(&[3970]);
        bad["answer"] = serde_json::json!("");
        let raw = reply(vec![bad, candidate(&[3065])]);
        let questions = parse_reply(&raw, &context()).unwrap();
        assert_eq!(questions.len(), 1);
    }

    #[test]
    fn test_parse_drops_malformed_candidate_but_keeps_batch() {
        let mut junk = candidate(&[3970]);
        junk["question_type"] = serde_json::json!("true_false");
        let raw = reply(vec![junk, candidate(&[3065])]);
        let questions = parse_reply(&raw, &context()).unwrap();
        assert_eq!(questions.len(), 1);
    }

    #[test]
    fn test_unparsable_reply_is_fatal_for_the_call() {
        assert!(parse_reply("not json at all", &context()).is_err());
    }

    #[test]
    fn test_ten_candidates_two_ungrounded_leaves_eight() {
        let mut candidates: Vec<serde_json::Value> =
            (0..8).map(|_| candidate(&[3970])).collect();
        candidates.push(candidate(&[999]));
        candidates.push(candidate(&[999]));
        let questions = parse_reply(&reply(candidates), &context()).unwrap();
        assert_eq!(questions.len(), 8);
    }
}
