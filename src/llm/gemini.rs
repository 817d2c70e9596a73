//! Gemini client for explanation postprocessing.

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::GeminiConfig;
use crate::llm::CompletionUsage;
use crate::QuizGenError;
use crate::Result;

const SERVICE: &str = "gemini";

#[derive(Debug)]
pub struct GeminiOutcome {
    pub text: String,
    pub usage: CompletionUsage,
}

pub struct GeminiClient {
    endpoint: String,
    api_key: String,
    model: String,
    client: Client,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()?;

        Ok(Self {
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            client,
        })
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Single-turn generation with a system instruction. HTTP 429 surfaces
    /// as [`QuizGenError::RateLimited`] so callers can retry it in a typed
    /// way.
    pub async fn generate(
        &self,
        system: &str,
        user: &str,
        temperature: f64,
    ) -> Result<GeminiOutcome> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint, self.model
        );

        let body = json!({
            "systemInstruction": { "parts": [{ "text": system }] },
            "contents": [{ "role": "user", "parts": [{ "text": user }] }],
            "generationConfig": { "temperature": temperature },
        });

        debug!("Gemini request: model={}", self.model);
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(QuizGenError::from_status(SERVICE, status.as_u16(), message));
        }

        let parsed: GenerateContentResponse = response.json().await?;

        let text = parsed
            .candidates
            .into_iter()
            .next()
            .map(|candidate| {
                candidate
                    .content
                    .parts
                    .into_iter()
                    .map(|part| part.text)
                    .collect::<String>()
            })
            .ok_or_else(|| QuizGenError::Api {
                service: SERVICE.to_string(),
                status: status.as_u16(),
                message: "response contained no candidates".to_string(),
            })?;

        Ok(GeminiOutcome {
            text,
            usage: CompletionUsage {
                input_tokens: parsed.usage_metadata.prompt_token_count,
                output_tokens: parsed.usage_metadata.candidates_token_count,
            },
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: UsageMetadata,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}
