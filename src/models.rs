//! Data model for the generation pipeline.

use serde::Deserialize;
use serde::Serialize;

/// A leaf topic category with its question counters.
///
/// Counters are read fresh from the database at run start and folded forward
/// in memory by the pipeline controller after each successful save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryInfo {
    pub id: i64,
    pub name: String,
    /// Full hierarchical path, e.g. "Computer Networks > Transport > TCP"
    pub path: String,
    pub question_count: i64,
    pub unsolved_count: i64,
}

impl CategoryInfo {
    /// How many questions this category still needs to reach `threshold`
    /// unsolved questions. A category with `needed == 0` is never a
    /// generation target.
    #[must_use]
    pub fn needed(&self, threshold: i64) -> i64 {
        (threshold - self.unsolved_count).max(0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    MultipleChoice,
    ShortAnswer,
    Essay,
}

impl QuestionType {
    /// Storage-level type tag used by the questions table.
    #[must_use]
    pub const fn storage_tag(&self) -> &'static str {
        match self {
            Self::MultipleChoice => "multiple",
            Self::ShortAnswer => "short",
            Self::Essay => "essay",
        }
    }
}

/// Ordinal difficulty. Generation requests levels 1-3; the scale reserves
/// room up to 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Difficulty {
    Basic = 1,
    Intermediate = 2,
    Advanced = 3,
    Hard = 4,
    Expert = 5,
}

impl TryFrom<u8> for Difficulty {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Basic),
            2 => Ok(Self::Intermediate),
            3 => Ok(Self::Advanced),
            4 => Ok(Self::Hard),
            5 => Ok(Self::Expert),
            other => Err(format!("difficulty out of range: {other}")),
        }
    }
}

impl From<Difficulty> for u8 {
    fn from(value: Difficulty) -> Self {
        value as Self
    }
}

/// One candidate question produced by the generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedQuestion {
    pub question_type: QuestionType,
    pub difficulty: Difficulty,
    pub question: String,
    /// Canonical answer; for multiple choice this equals
    /// `options[correct_index]`.
    pub answer: String,
    #[serde(default)]
    pub explanation: String,
    /// Exactly four entries for multiple choice, empty otherwise.
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub correct_index: usize,
    #[serde(default)]
    pub category_id: i64,
    #[serde(default)]
    pub category_name: String,
    /// Chunk ids this question claims to be grounded in. Filtered to valid
    /// context ids before the question is constructed.
    #[serde(default)]
    pub chunk_ids: Vec<i64>,
}

impl GeneratedQuestion {
    /// Local schema validation, applied before a candidate is accepted into
    /// the pipeline.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.question.trim().is_empty() {
            return Err("question text is empty".to_string());
        }
        if self.answer.trim().is_empty() {
            return Err("answer text is empty".to_string());
        }
        if self.question_type == QuestionType::MultipleChoice {
            if self.options.len() != 4 {
                return Err(format!(
                    "multiple choice requires exactly 4 options, got {}",
                    self.options.len()
                ));
            }
            if self.correct_index > 3 {
                return Err(format!(
                    "correct index out of range: {}",
                    self.correct_index
                ));
            }
            if self.options.iter().any(|opt| opt.trim().is_empty()) {
                return Err("blank option text".to_string());
            }
        }
        Ok(())
    }
}

/// Immutable per-round input to the question generator.
#[derive(Debug, Clone)]
pub struct QuestionGenerationContext {
    pub category_id: i64,
    pub category_name: String,
    pub category_path: String,
    /// Chunk contents, parallel to `chunk_ids`.
    pub chunks: Vec<String>,
    pub chunk_ids: Vec<i64>,
    pub target_question_count: usize,
}

/// Faithfulness / answer-relevancy scores attached at the admission gate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuestionScores {
    pub faithfulness: f64,
    pub answer_relevancy: f64,
}

impl QuestionScores {
    /// Single scalar quality score: faithfulness weighted 70%, answer
    /// relevancy 30%, scaled to an integer percentage.
    #[must_use]
    pub fn quality_score(&self) -> i32 {
        ((self.faithfulness * 0.7 + self.answer_relevancy * 0.3) * 100.0) as i32
    }
}

/// A question that cleared the admission gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredQuestion {
    #[serde(flatten)]
    pub question: GeneratedQuestion,
    pub scores: QuestionScores,
}

/// A question that failed admission, kept for the run's rejection log.
/// `scores` is `None` when the question was excluded from evaluation
/// because none of its cited chunks resolved to content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedQuestion {
    #[serde(flatten)]
    pub question: GeneratedQuestion,
    pub scores: Option<QuestionScores>,
    pub rejected_at: String,
}

/// A chunk returned by similarity search or cited by the reranker.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub id: i64,
    pub content: String,
    pub similarity: f32,
}
