//! Run artifacts: the dated output directory and the rejection log.

use std::path::Path;
use std::path::PathBuf;

use crate::models::RejectedQuestion;
use crate::Result;

/// Dated output directory for one run, e.g. `output/2026-08-23/`.
#[derive(Debug, Clone)]
pub struct OutputDir {
    path: PathBuf,
}

impl OutputDir {
    /// Create (or reuse) today's directory under `base`.
    pub fn create(base: &Path) -> Result<Self> {
        let today = chrono::Local::now().format("%Y-%m-%d").to_string();
        let path = base.join(today);
        std::fs::create_dir_all(&path)?;
        Ok(Self { path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn rejected_file(&self) -> PathBuf {
        self.path.join("rejected_questions.json")
    }
}

/// Durable log of rejected questions, rewritten after every round so a
/// crash loses at most the in-flight round.
#[derive(Debug)]
pub struct RejectionLog {
    path: PathBuf,
}

impl RejectionLog {
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Write the full rejected list. Acceptable at expected scale (tens of
    /// items); streaming appends would replace this if runs grew much larger.
    pub fn write(&self, rejected: &[RejectedQuestion]) -> Result<()> {
        let json = serde_json::to_string_pretty(rejected)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Difficulty;
    use crate::models::GeneratedQuestion;
    use crate::models::QuestionScores;
    use crate::models::QuestionType;

    fn rejected(question_text: &str) -> RejectedQuestion {
        RejectedQuestion {
            question: GeneratedQuestion {
                question_type: QuestionType::Essay,
                difficulty: Difficulty::Advanced,
                question: question_text.to_string(),
                answer: "An answer".to_string(),
                explanation: String::new(),
                options: Vec::new(),
                correct_index: 0,
                category_id: 1,
                category_name: "tcp".to_string(),
                chunk_ids: vec![1],
            },
            scores: Some(QuestionScores {
                faithfulness: 0.5,
                answer_relevancy: 0.9,
            }),
            rejected_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    #[test]
    fn test_output_dir_is_dated() {
        let base = tempfile::tempdir().unwrap();
        let output = OutputDir::create(base.path()).unwrap();
        let name = output.path().file_name().unwrap().to_string_lossy();
        assert_eq!(name.len(), "2026-08-23".len());
        assert!(output.path().is_dir());
    }

    #[test]
    fn test_rejection_log_rewrite_replaces_contents() {
        let base = tempfile::tempdir().unwrap();
        let log = RejectionLog::new(base.path().join("rejected_questions.json"));

        log.write(&[rejected("first")]).unwrap();
        log.write(&[rejected("first"), rejected("second")]).unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        let parsed: Vec<RejectedQuestion> = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].question.question, "second");
    }

    #[test]
    fn test_rejection_log_round_trips_missing_scores() {
        let base = tempfile::tempdir().unwrap();
        let log = RejectionLog::new(base.path().join("rejected_questions.json"));

        let mut item = rejected("unscored");
        item.scores = None;
        log.write(&[item]).unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        let parsed: Vec<RejectedQuestion> = serde_json::from_str(&content).unwrap();
        assert!(parsed[0].scores.is_none());
    }
}
