//! Generation pipeline: round loop and the per-round stage sequence
//! Retrieve -> Generate -> Postprocess -> Evaluate -> Persist.
//!
//! Rounds are the unit of both progress and failure isolation: a failure in
//! any stage zeroes that round's yield but never aborts the run.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use tracing::info;
use tracing::warn;

use crate::config::AppConfig;
use crate::cost::CostTracker;
use crate::database::Database;
use crate::eval::EvalClient;
use crate::llm::ClovaClient;
use crate::llm::GeminiClient;
use crate::models::CategoryInfo;
use crate::models::QuestionGenerationContext;
use crate::models::RejectedQuestion;
use crate::output::OutputDir;
use crate::output::RejectionLog;
use crate::Result;

pub mod evaluator;
pub mod gate;
pub mod generator;
pub mod postprocess;
pub mod retriever;
pub mod selector;

use evaluator::Evaluator;
use generator::QuestionGenerator;
use postprocess::Postprocessor;
use retriever::ChunkRetriever;

pub const MAX_ROUNDS: usize = 10;

/// Immutable result of one round, folded into the loop state by the caller.
#[derive(Debug, Default)]
pub struct RoundOutcome {
    pub saved: usize,
    pub rejected: Vec<RejectedQuestion>,
    /// The category had no usable material; exclude it for the rest of
    /// the run. Transient failures leave this false so the category stays
    /// eligible.
    pub exhausted: bool,
    pub cost: CostTracker,
}

/// One round of the pipeline against a single category. The loop is generic
/// over this seam so its termination behavior is testable in isolation.
pub trait RoundRunner {
    async fn run_round(&mut self, category: &CategoryInfo) -> RoundOutcome;
}

#[derive(Debug)]
pub struct RunSummary {
    pub rounds: usize,
    pub saved: usize,
    pub rejected: usize,
    pub cost: CostTracker,
}

/// Drive rounds until the target is reached, the round budget is spent, or
/// no eligible category remains. The rejection log is flushed after every
/// round so an interrupted run keeps its rejected-question history.
pub async fn run_rounds<R: RoundRunner>(
    categories: &mut Vec<CategoryInfo>,
    target: usize,
    threshold: i64,
    runner: &mut R,
    rejection_log: &RejectionLog,
) -> Result<RunSummary> {
    let mut exhausted: HashSet<i64> = HashSet::new();
    let mut all_rejected: Vec<RejectedQuestion> = Vec::new();
    let mut cost = CostTracker::default();
    let mut total_saved = 0usize;
    let mut rounds = 0usize;

    while total_saved < target && rounds < MAX_ROUNDS {
        let Some(category) = selector::select_next(categories, &exhausted, threshold) else {
            info!("No eligible category remains, stopping");
            break;
        };
        let category = category.clone();
        rounds += 1;

        info!(
            "Round {rounds}: {} (id: {}, unsolved: {})",
            category.name, category.id, category.unsolved_count
        );

        let outcome = runner.run_round(&category).await;

        total_saved += outcome.saved;
        cost.absorb(&outcome.cost);
        all_rejected.extend(outcome.rejected);
        rejection_log.write(&all_rejected)?;

        if outcome.exhausted {
            exhausted.insert(category.id);
        }

        if outcome.saved > 0 {
            // Fold the save into the in-memory counters so the next round's
            // ranking reflects it without re-querying storage
            if let Some(entry) = categories.iter_mut().find(|c| c.id == category.id) {
                entry.question_count += outcome.saved as i64;
                entry.unsolved_count += outcome.saved as i64;
            }
        }

        info!("  progress: {total_saved}/{target}");
    }

    Ok(RunSummary {
        rounds,
        saved: total_saved,
        rejected: all_rejected.len(),
        cost,
    })
}

/// The real pipeline: owns the stage components and runs full rounds
/// against the production services.
pub struct PipelineController {
    database: Arc<Database>,
    retriever: ChunkRetriever,
    generator: QuestionGenerator,
    postprocessor: Postprocessor,
    evaluator: Evaluator,
    top_k_chunks: i64,
    unsolved_threshold: i64,
    model_name: String,
}

impl PipelineController {
    pub async fn new(config: &AppConfig) -> Result<Self> {
        let database = Arc::new(Database::from_config(config).await?);
        let clova = Arc::new(ClovaClient::new(&config.clova)?);
        let gemini = Arc::new(GeminiClient::new(&config.gemini)?);
        let eval_client = Arc::new(EvalClient::new(&config.evaluation)?);

        let clova_pricing = config.pricing.for_model(&config.clova.chat_model);
        let gemini_pricing = config.pricing.for_model(&config.gemini.model);
        let eval_pricing = config.pricing.for_model(&config.evaluation.model);

        Ok(Self {
            retriever: ChunkRetriever::new(Arc::clone(&database), Arc::clone(&clova), clova_pricing),
            generator: QuestionGenerator::new(Arc::clone(&clova), clova_pricing),
            postprocessor: Postprocessor::new(gemini, gemini_pricing),
            evaluator: Evaluator::new(Arc::clone(&database), eval_client, eval_pricing),
            database,
            top_k_chunks: config.top_k_chunks(),
            unsolved_threshold: config.unsolved_threshold(),
            model_name: config.clova.chat_model.clone(),
        })
    }

    /// Run the full pipeline, writing artifacts into `output`.
    pub async fn run(&mut self, output: &OutputDir) -> Result<RunSummary> {
        let started = Instant::now();
        let threshold = self.unsolved_threshold;

        let unsolved = self.database.total_unsolved().await?;
        let target = (threshold - unsolved).max(0) as usize;
        info!("Pipeline start (unsolved: {unsolved}, threshold: {threshold}, target: {target})");

        if target == 0 {
            info!("Unsolved pool already at threshold, nothing to generate");
            return Ok(RunSummary {
                rounds: 0,
                saved: 0,
                rejected: 0,
                cost: CostTracker::default(),
            });
        }

        let mut categories = self.database.leaf_category_stats().await?;
        if categories.is_empty() {
            info!("No active leaf categories, stopping");
            return Ok(RunSummary {
                rounds: 0,
                saved: 0,
                rejected: 0,
                cost: CostTracker::default(),
            });
        }
        info!("Candidate categories: {}", categories.len());
        for category in categories.iter().take(5) {
            info!(
                "  - {}: {} questions, {} unsolved",
                category.name, category.question_count, category.unsolved_count
            );
        }

        let rejection_log = RejectionLog::new(output.rejected_file());
        let summary = run_rounds(&mut categories, target, threshold, self, &rejection_log).await?;

        let elapsed = started.elapsed();
        info!(
            "Done: saved {} questions, rejected {} over {} rounds",
            summary.saved, summary.rejected, summary.rounds
        );
        info!("Cost: {}", summary.cost.summary());
        info!(
            "Elapsed: {}m {}s",
            elapsed.as_secs() / 60,
            elapsed.as_secs() % 60
        );

        Ok(summary)
    }
}

impl RoundRunner for PipelineController {
    async fn run_round(&mut self, category: &CategoryInfo) -> RoundOutcome {
        let mut outcome = RoundOutcome::default();

        // Retrieve
        let retrieval = match self.retriever.retrieve(category, self.top_k_chunks).await {
            Ok(retrieval) => retrieval,
            Err(e) => {
                warn!("Chunk retrieval failed for {}: {e}", category.name);
                return outcome;
            }
        };
        outcome.cost.hyde = retrieval.hyde_usage;
        outcome.cost.reranker = retrieval.reranker_usage;

        if retrieval.chunks.is_empty() || retrieval.target_question_count == 0 {
            info!("No cited chunks for {}, skipping category", category.name);
            outcome.exhausted = true;
            return outcome;
        }
        info!(
            "  retrieved {} chunks, target {} questions ({:.1} KRW)",
            retrieval.chunks.len(),
            retrieval.target_question_count,
            retrieval.hyde_usage.total_cost() + retrieval.reranker_usage.total_cost()
        );

        // Generate
        let context = QuestionGenerationContext {
            category_id: category.id,
            category_name: category.name.clone(),
            category_path: category.path.clone(),
            chunks: retrieval.chunks.iter().map(|c| c.content.clone()).collect(),
            chunk_ids: retrieval.chunks.iter().map(|c| c.id).collect(),
            target_question_count: retrieval.target_question_count,
        };
        let (mut questions, generation_usage) = match self.generator.generate(&context).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Question generation failed for {}: {e}", category.name);
                return outcome;
            }
        };
        outcome.cost.generation = generation_usage;
        if questions.is_empty() {
            info!("  no valid candidates generated");
            return outcome;
        }
        info!(
            "  generated {} questions ({:.1} KRW)",
            questions.len(),
            generation_usage.total_cost()
        );

        // Postprocess (best-effort)
        outcome.cost.postprocess = self.postprocessor.clean_all(&mut questions).await;

        // Evaluate and classify
        let (scores, evaluation_usage) = match self.evaluator.score(&questions).await {
            Ok(result) => result,
            Err(e) => {
                warn!("Evaluation failed for {}: {e}", category.name);
                return outcome;
            }
        };
        outcome.cost.evaluation = evaluation_usage;
        let (passed, rejected) = gate::classify(questions, &scores);
        info!(
            "  evaluated: {} passed, {} rejected ({:.1} KRW)",
            passed.len(),
            rejected.len(),
            evaluation_usage.total_cost()
        );
        outcome.rejected = rejected;

        // Persist
        if !passed.is_empty() {
            match self.database.save_questions(&passed, &self.model_name).await {
                Ok(ids) => {
                    outcome.saved = ids.len();
                    info!("  saved {} questions (ids: {ids:?})", ids.len());
                }
                Err(e) => {
                    warn!("Saving questions failed for {}: {e}", category.name);
                }
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cost::calculate_cost;
    use crate::config::ModelPricing;
    use crate::models::Difficulty;
    use crate::models::GeneratedQuestion;
    use crate::models::QuestionScores;
    use crate::models::QuestionType;

    fn category(id: i64, question_count: i64, unsolved_count: i64) -> CategoryInfo {
        CategoryInfo {
            id,
            name: format!("cat-{id}"),
            path: format!("root > cat-{id}"),
            question_count,
            unsolved_count,
        }
    }

    fn rejected_item() -> RejectedQuestion {
        RejectedQuestion {
            question: GeneratedQuestion {
                question_type: QuestionType::Essay,
                difficulty: Difficulty::Basic,
                question: "Explain flow control.".to_string(),
                answer: "Window-based pacing.".to_string(),
                explanation: String::new(),
                options: Vec::new(),
                correct_index: 0,
                category_id: 1,
                category_name: "cat-1".to_string(),
                chunk_ids: vec![1],
            },
            scores: Some(QuestionScores {
                faithfulness: 0.5,
                answer_relevancy: 0.5,
            }),
            rejected_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    struct FixedYield {
        saved_per_round: usize,
        rejected_per_round: usize,
        calls: usize,
    }

    impl RoundRunner for FixedYield {
        async fn run_round(&mut self, _category: &CategoryInfo) -> RoundOutcome {
            self.calls += 1;
            RoundOutcome {
                saved: self.saved_per_round,
                rejected: (0..self.rejected_per_round).map(|_| rejected_item()).collect(),
                exhausted: false,
                cost: CostTracker {
                    generation: calculate_cost(
                        100,
                        100,
                        ModelPricing {
                            input: 1.0,
                            output: 1.0,
                        },
                    ),
                    ..Default::default()
                },
            }
        }
    }

    struct ExhaustEverything;

    impl RoundRunner for ExhaustEverything {
        async fn run_round(&mut self, _category: &CategoryInfo) -> RoundOutcome {
            RoundOutcome {
                exhausted: true,
                ..Default::default()
            }
        }
    }

    fn test_log(dir: &tempfile::TempDir) -> RejectionLog {
        RejectionLog::new(dir.path().join("rejected_questions.json"))
    }

    #[tokio::test]
    async fn test_zero_yield_stops_at_exactly_max_rounds() {
        let dir = tempfile::tempdir().unwrap();
        let log = test_log(&dir);
        let mut categories = vec![category(1, 0, 0), category(2, 5, 3)];
        let mut runner = FixedYield {
            saved_per_round: 0,
            rejected_per_round: 0,
            calls: 0,
        };

        let summary = run_rounds(&mut categories, 10, 30, &mut runner, &log)
            .await
            .unwrap();
        assert_eq!(summary.rounds, MAX_ROUNDS);
        assert_eq!(runner.calls, MAX_ROUNDS);
        assert_eq!(summary.saved, 0);
    }

    #[tokio::test]
    async fn test_target_reached_in_first_round_stops_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let log = test_log(&dir);
        let mut categories = vec![category(1, 0, 0)];
        let mut runner = FixedYield {
            saved_per_round: 10,
            rejected_per_round: 0,
            calls: 0,
        };

        let summary = run_rounds(&mut categories, 10, 30, &mut runner, &log)
            .await
            .unwrap();
        assert_eq!(summary.rounds, 1);
        assert_eq!(summary.saved, 10);
    }

    #[tokio::test]
    async fn test_partial_yield_accumulates_across_rounds() {
        let dir = tempfile::tempdir().unwrap();
        let log = test_log(&dir);
        let mut categories = vec![category(1, 0, 0), category(2, 5, 1)];
        let mut runner = FixedYield {
            saved_per_round: 3,
            rejected_per_round: 1,
            calls: 0,
        };

        let summary = run_rounds(&mut categories, 10, 30, &mut runner, &log)
            .await
            .unwrap();
        // 3 + 3 + 3 + 3 = 12 >= 10 after four rounds
        assert_eq!(summary.rounds, 4);
        assert_eq!(summary.saved, 12);
        assert_eq!(summary.rejected, 4);
        assert!(summary.cost.total() > 0.0);
    }

    #[tokio::test]
    async fn test_saved_counts_fold_into_category_counters() {
        let dir = tempfile::tempdir().unwrap();
        let log = test_log(&dir);
        let mut categories = vec![category(1, 0, 0)];
        let mut runner = FixedYield {
            saved_per_round: 4,
            rejected_per_round: 0,
            calls: 0,
        };

        run_rounds(&mut categories, 8, 30, &mut runner, &log)
            .await
            .unwrap();
        assert_eq!(categories[0].question_count, 8);
        assert_eq!(categories[0].unsolved_count, 8);
    }

    #[tokio::test]
    async fn test_exhausted_categories_end_the_run_early() {
        let dir = tempfile::tempdir().unwrap();
        let log = test_log(&dir);
        let mut categories = vec![category(1, 0, 0), category(2, 5, 3)];
        let mut runner = ExhaustEverything;

        let summary = run_rounds(&mut categories, 10, 30, &mut runner, &log)
            .await
            .unwrap();
        // Both categories are marked exhausted, so the loop ends after
        // trying each once
        assert_eq!(summary.rounds, 2);
        assert_eq!(summary.saved, 0);
    }

    #[tokio::test]
    async fn test_rejection_log_flushed_every_round() {
        let dir = tempfile::tempdir().unwrap();
        let log = test_log(&dir);
        let mut categories = vec![category(1, 0, 0)];
        let mut runner = FixedYield {
            saved_per_round: 0,
            rejected_per_round: 2,
            calls: 0,
        };

        let summary = run_rounds(&mut categories, 5, 30, &mut runner, &log)
            .await
            .unwrap();
        assert_eq!(summary.rejected, 2 * MAX_ROUNDS);

        let content = std::fs::read_to_string(log.path()).unwrap();
        let parsed: Vec<RejectedQuestion> = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.len(), 2 * MAX_ROUNDS);
    }

    #[tokio::test]
    async fn test_no_eligible_category_means_zero_rounds() {
        let dir = tempfile::tempdir().unwrap();
        let log = test_log(&dir);
        // All categories saturated relative to the threshold
        let mut categories = vec![category(1, 40, 30), category(2, 50, 31)];
        let mut runner = FixedYield {
            saved_per_round: 1,
            rejected_per_round: 0,
            calls: 0,
        };

        let summary = run_rounds(&mut categories, 10, 30, &mut runner, &log)
            .await
            .unwrap();
        assert_eq!(summary.rounds, 0);
        assert_eq!(runner.calls, 0);
    }
}
