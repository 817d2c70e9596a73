//! Explanation postprocessing: strip source-revealing phrasing via a second
//! model, best-effort per question.

use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::config::ModelPricing;
use crate::cost::calculate_cost;
use crate::cost::TokenUsage;
use crate::llm::prompts::POSTPROCESS_SYSTEM_PROMPT;
use crate::llm::GeminiClient;
use crate::models::GeneratedQuestion;
use crate::Result;

const MAX_RETRIES: u32 = 3;
const RETRY_DELAY: Duration = Duration::from_secs(2);
const REWRITE_TEMPERATURE: f64 = 0.1;

pub struct Postprocessor {
    gemini: Arc<GeminiClient>,
    pricing: ModelPricing,
}

impl Postprocessor {
    #[must_use]
    pub fn new(gemini: Arc<GeminiClient>, pricing: ModelPricing) -> Self {
        Self { gemini, pricing }
    }

    /// Clean one explanation. Retries with linear backoff only on rate
    /// limiting; any other error, or retry exhaustion, propagates.
    pub async fn clean_explanation(&self, explanation: &str) -> Result<(String, TokenUsage)> {
        let user = format!("Revise this explanation:\n\n{explanation}");

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self
                .gemini
                .generate(POSTPROCESS_SYSTEM_PROMPT, &user, REWRITE_TEMPERATURE)
                .await
            {
                Ok(outcome) => {
                    let cleaned = parse_cleaned_reply(&outcome.text)?;
                    let usage = calculate_cost(
                        outcome.usage.input_tokens,
                        outcome.usage.output_tokens,
                        self.pricing,
                    );
                    return Ok((cleaned, usage));
                }
                Err(e) if e.is_rate_limited() && attempt < MAX_RETRIES => {
                    warn!("Rate limited during postprocessing, retry {attempt}/{MAX_RETRIES}");
                    tokio::time::sleep(RETRY_DELAY * attempt).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Clean every explanation in place. Per-question failures keep the
    /// original explanation; postprocessing never blocks admission.
    pub async fn clean_all(&self, questions: &mut [GeneratedQuestion]) -> TokenUsage {
        let mut total = TokenUsage::default();

        for question in questions.iter_mut() {
            match self.clean_explanation(&question.explanation).await {
                Ok((cleaned, usage)) => {
                    question.explanation = cleaned;
                    total += usage;
                }
                Err(e) => {
                    warn!("Postprocessing failed, keeping original explanation: {e}");
                }
            }
        }

        total
    }
}

#[derive(Debug, Deserialize)]
struct CleanedReply {
    cleaned_explanation: String,
}

/// Extract the cleaned explanation from a strict single-field JSON reply,
/// tolerating markdown code fences around it.
fn parse_cleaned_reply(text: &str) -> Result<String> {
    let reply: CleanedReply = serde_json::from_str(strip_code_fences(text))?;
    Ok(reply.cleaned_explanation)
}

fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let inner = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}
