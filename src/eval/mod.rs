//! Client for the external RAG-quality scoring service.
//!
//! The service takes a batch of keyed samples and returns faithfulness and
//! answer-relevancy scores keyed the same way, so the caller can re-join
//! scores to questions without relying on positional order.

use reqwest::Client;
use serde::Deserialize;
use serde::Serialize;
use serde_json::json;
use tracing::debug;

use crate::config::EvaluationConfig;
use crate::llm::CompletionUsage;
use crate::QuizGenError;
use crate::Result;

const SERVICE: &str = "evaluation";

/// One question prepared for scoring. `key` is the question's index in the
/// original generated list and travels through the service untouched.
#[derive(Debug, Clone, Serialize)]
pub struct EvalSample {
    pub key: usize,
    pub user_input: String,
    pub response: String,
    pub retrieved_contexts: Vec<String>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct EvalScore {
    pub key: usize,
    pub faithfulness: f64,
    pub answer_relevancy: f64,
}

#[derive(Debug)]
pub struct EvalOutcome {
    pub scores: Vec<EvalScore>,
    pub usage: CompletionUsage,
}

pub struct EvalClient {
    endpoint: String,
    api_key: Option<String>,
    model: String,
    client: Client,
}

impl EvalClient {
    pub fn new(config: &EvaluationConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(300))
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

    /// Score a batch of samples in one call.
    pub async fn score(&self, samples: &[EvalSample]) -> Result<EvalOutcome> {
        let url = format!("{}/evaluate", self.endpoint);

        let body = json!({
            "model": self.model,
            "metrics": ["faithfulness", "answer_relevancy"],
            "items": samples,
        });

        debug!("Scoring {} samples", samples.len());
        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(QuizGenError::from_status(SERVICE, status.as_u16(), message));
        }

        let parsed: EvalResponse = response.json().await?;
        Ok(EvalOutcome {
            scores: parsed.results,
            usage: CompletionUsage {
                input_tokens: parsed.usage.input_tokens,
                output_tokens: parsed.usage.output_tokens,
            },
        })
    }
}

#[derive(Debug, Deserialize)]
struct EvalResponse {
    #[serde(default)]
    results: Vec<EvalScore>,
    #[serde(default)]
    usage: EvalUsage,
}

#[derive(Debug, Default, Deserialize)]
struct EvalUsage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eval_response_parsing_keeps_keys() {
        let raw = r#"{
            "results": [
                {"key": 3, "faithfulness": 0.95, "answer_relevancy": 0.8},
                {"key": 0, "faithfulness": 0.6, "answer_relevancy": 0.9}
            ],
            "usage": {"input_tokens": 5000, "output_tokens": 1200}
        }"#;
        let parsed: EvalResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.results.len(), 2);
        // Keys arrive out of order; the join never relies on position
        assert_eq!(parsed.results[0].key, 3);
        assert_eq!(parsed.results[1].key, 0);
        assert_eq!(parsed.usage.input_tokens, 5000);
    }

    #[test]
    fn test_sample_serialization() {
        let sample = EvalSample {
            key: 2,
            user_input: "What does TCP provide?".to_string(),
            response: "Reliable delivery.".to_string(),
            retrieved_contexts: vec!["TCP provides reliable delivery.".to_string()],
        };
        let value = serde_json::to_value(&sample).unwrap();
        assert_eq!(value["key"], 2);
        assert_eq!(value["retrieved_contexts"].as_array().unwrap().len(), 1);
    }
}
