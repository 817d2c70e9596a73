//! Evaluation-set construction and score lookup.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::config::ModelPricing;
use crate::cost::calculate_cost;
use crate::cost::TokenUsage;
use crate::database::Database;
use crate::eval::EvalClient;
use crate::eval::EvalSample;
use crate::models::GeneratedQuestion;
use crate::models::QuestionScores;
use crate::Result;

pub struct Evaluator {
    database: Arc<Database>,
    client: Arc<EvalClient>,
    pricing: ModelPricing,
}

impl Evaluator {
    #[must_use]
    pub fn new(database: Arc<Database>, client: Arc<EvalClient>, pricing: ModelPricing) -> Self {
        Self {
            database,
            client,
            pricing,
        }
    }

    /// Score a batch of questions. Returns scores keyed by each question's
    /// index in `questions`; questions whose cited chunks resolve to no
    /// content are excluded from the evaluation set and have no entry.
    pub async fn score(
        &self,
        questions: &[GeneratedQuestion],
    ) -> Result<(HashMap<usize, QuestionScores>, TokenUsage)> {
        let mut samples = Vec::with_capacity(questions.len());

        for (key, question) in questions.iter().enumerate() {
            let contexts = self.database.chunk_contents(&question.chunk_ids).await?;
            if contexts.is_empty() {
                debug!("Question {key} has no resolvable chunk content, excluded from scoring");
                continue;
            }
            samples.push(EvalSample {
                key,
                user_input: question.question.clone(),
                response: question.explanation.clone(),
                retrieved_contexts: contexts,
            });
        }

        if samples.is_empty() {
            return Ok((HashMap::new(), TokenUsage::default()));
        }

        let outcome = self.client.score(&samples).await?;
        let usage = calculate_cost(
            outcome.usage.input_tokens,
            outcome.usage.output_tokens,
            self.pricing,
        );

        // Join by the explicit key; positional zipping would misassign
        // scores whenever the evaluation set is shorter than the input.
        let scores = outcome
            .scores
            .into_iter()
            .map(|s| {
                (
                    s.key,
                    QuestionScores {
                        faithfulness: s.faithfulness,
                        answer_relevancy: s.answer_relevancy,
                    },
                )
            })
            .collect();

        Ok((scores, usage))
    }
}
