//! HTTP clients for the external language-model services.

use serde::Serialize;

pub mod clova;
pub mod gemini;
pub mod prompts;

pub use clova::ClovaClient;
pub use gemini::GeminiClient;

/// A chat message in the shape both vendor APIs accept.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Raw token counts reported by a completion call. Cost is attached by the
/// caller with its pricing table.
#[derive(Debug, Clone, Default)]
pub struct CompletionUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}
