//! Clova Studio client: chat completions (plain and structured), embedding
//! v2, and the reranker.

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::config::ClovaConfig;
use crate::llm::ChatMessage;
use crate::llm::CompletionUsage;
use crate::models::RetrievedChunk;
use crate::QuizGenError;
use crate::Result;

const SERVICE: &str = "clova";

/// Content and usage of one chat completion.
#[derive(Debug)]
pub struct ChatOutcome {
    pub content: String,
    pub usage: CompletionUsage,
}

/// Chunks the reranker actually cited, plus its token usage.
#[derive(Debug)]
pub struct RerankOutcome {
    pub cited: Vec<RetrievedChunk>,
    pub usage: CompletionUsage,
}

pub struct ClovaClient {
    endpoint: String,
    api_key: String,
    chat_model: String,
    temperature: f64,
    client: Client,
}

impl ClovaClient {
    pub fn new(config: &ClovaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()?;

        Ok(Self {
            endpoint: config.endpoint.clone(),
            api_key: config.api_key.clone(),
            chat_model: config.chat_model.clone(),
            temperature: config.temperature,
            client,
        })
    }

    #[must_use]
    pub fn chat_model(&self) -> &str {
        &self.chat_model
    }

    /// Plain chat completion.
    pub async fn chat(&self, messages: &[ChatMessage], max_tokens: u32) -> Result<ChatOutcome> {
        self.chat_request(messages, max_tokens, None).await
    }

    /// Chat completion constrained to a JSON schema (structured output).
    pub async fn chat_structured(
        &self,
        messages: &[ChatMessage],
        schema: serde_json::Value,
        max_tokens: u32,
    ) -> Result<ChatOutcome> {
        self.chat_request(messages, max_tokens, Some(schema)).await
    }

    async fn chat_request(
        &self,
        messages: &[ChatMessage],
        max_tokens: u32,
        schema: Option<serde_json::Value>,
    ) -> Result<ChatOutcome> {
        let url = format!("{}/v3/chat-completions/{}", self.endpoint, self.chat_model);

        let mut body = json!({
            "messages": messages,
            "topP": 0.8,
            "topK": 0,
            "maxCompletionTokens": max_tokens,
            "temperature": self.temperature,
            "repetitionPenalty": 1.1,
            "thinking": {"effort": "none"},
        });
        if let Some(schema) = schema {
            body["responseFormat"] = json!({
                "type": "json",
                "schema": schema,
            });
        }

        debug!("Clova chat request: model={}", self.chat_model);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(QuizGenError::from_status(SERVICE, status.as_u16(), message));
        }

        let parsed: ChatResponse = response.json().await?;
        Ok(ChatOutcome {
            content: parsed.result.message.content,
            usage: CompletionUsage {
                input_tokens: parsed.result.usage.prompt_tokens,
                output_tokens: parsed.result.usage.completion_tokens,
            },
        })
    }

    /// Embed a query with the embedding v2 endpoint.
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/v1/api-tools/embedding/v2", self.endpoint);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&json!({ "text": text }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(QuizGenError::from_status(SERVICE, status.as_u16(), message));
        }

        let parsed: EmbeddingResponse = response.json().await?;
        Ok(parsed.result.embedding)
    }

    /// Rerank candidate chunks against a query. Returns only the chunks the
    /// reranker cited, not the raw candidate set.
    pub async fn rerank(
        &self,
        query: &str,
        chunks: &[RetrievedChunk],
        max_tokens: u32,
    ) -> Result<RerankOutcome> {
        let url = format!("{}/v1/api-tools/reranker", self.endpoint);

        let documents: Vec<serde_json::Value> = chunks
            .iter()
            .map(|chunk| json!({ "id": chunk.id.to_string(), "doc": chunk.content }))
            .collect();

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "documents": documents,
                "query": query,
                "maxTokens": max_tokens,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(QuizGenError::from_status(SERVICE, status.as_u16(), message));
        }

        let parsed: RerankResponse = response.json().await?;

        let cited = parsed
            .result
            .cited_documents
            .into_iter()
            .filter_map(|doc| {
                // The API round-trips ids as strings
                doc.id.parse::<i64>().ok().map(|id| RetrievedChunk {
                    id,
                    content: doc.doc,
                    similarity: 0.0,
                })
            })
            .collect();

        Ok(RerankOutcome {
            cited,
            usage: CompletionUsage {
                input_tokens: parsed.result.usage.prompt_tokens,
                output_tokens: parsed.result.usage.completion_tokens,
            },
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    result: ChatResult,
}

#[derive(Debug, Deserialize)]
struct ChatResult {
    message: ChatResponseMessage,
    #[serde(default)]
    usage: UsageBlock,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageBlock {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    result: EmbeddingResult,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResult {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct RerankResponse {
    result: RerankResult,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RerankResult {
    #[serde(default)]
    cited_documents: Vec<CitedDocument>,
    #[serde(default)]
    usage: UsageBlock,
}

#[derive(Debug, Deserialize)]
struct CitedDocument {
    id: String,
    doc: String,
}
