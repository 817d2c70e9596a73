//! Chunk retrieval: HyDE query, embedding, vector search, reranking.

use std::sync::Arc;

use tracing::debug;

use crate::config::ModelPricing;
use crate::cost::calculate_cost;
use crate::cost::TokenUsage;
use crate::database::Database;
use crate::llm::prompts;
use crate::llm::ChatMessage;
use crate::llm::ClovaClient;
use crate::models::CategoryInfo;
use crate::models::RetrievedChunk;
use crate::Result;

const HYDE_MAX_TOKENS: u32 = 512;
const RERANK_MAX_TOKENS: u32 = 1024;

/// How many questions a cited chunk set supports. Zero means the category
/// has no usable material this round.
#[must_use]
pub const fn question_count_for(cited_chunks: usize) -> usize {
    match cited_chunks {
        n if n >= 5 => 10,
        n if n >= 3 => 7,
        n if n >= 1 => 5,
        _ => 0,
    }
}

#[derive(Debug)]
pub struct RetrievalOutcome {
    /// Chunks the reranker actually cited, not the raw similarity results.
    pub chunks: Vec<RetrievedChunk>,
    pub target_question_count: usize,
    pub hyde_usage: TokenUsage,
    pub reranker_usage: TokenUsage,
}

pub struct ChunkRetriever {
    database: Arc<Database>,
    clova: Arc<ClovaClient>,
    pricing: ModelPricing,
}

impl ChunkRetriever {
    #[must_use]
    pub fn new(database: Arc<Database>, clova: Arc<ClovaClient>, pricing: ModelPricing) -> Self {
        Self {
            database,
            clova,
            pricing,
        }
    }

    /// Retrieve reranked chunks for a category. Errors propagate; the
    /// controller treats them as a skipped round.
    pub async fn retrieve(
        &self,
        category: &CategoryInfo,
        top_k: i64,
    ) -> Result<RetrievalOutcome> {
        // HyDE: generate a hypothetical-document search query
        let hyde_messages = [
            ChatMessage::system(prompts::HYDE_SYSTEM_PROMPT),
            ChatMessage::user(prompts::build_hyde_prompt(&category.name, &category.path)),
        ];
        let hyde = self.clova.chat(&hyde_messages, HYDE_MAX_TOKENS).await?;
        let hyde_usage = calculate_cost(
            hyde.usage.input_tokens,
            hyde.usage.output_tokens,
            self.pricing,
        );
        debug!("HyDE query ({} words)", hyde.content.split_whitespace().count());

        let query_embedding = self.clova.embed(&hyde.content).await?;
        let candidates = self.database.similar_chunks(query_embedding, top_k).await?;
        debug!("Similarity search returned {} candidates", candidates.len());

        if candidates.is_empty() {
            return Ok(RetrievalOutcome {
                chunks: Vec::new(),
                target_question_count: 0,
                hyde_usage,
                reranker_usage: TokenUsage::default(),
            });
        }

        let rerank = self
            .clova
            .rerank(&hyde.content, &candidates, RERANK_MAX_TOKENS)
            .await?;
        let reranker_usage = calculate_cost(
            rerank.usage.input_tokens,
            rerank.usage.output_tokens,
            self.pricing,
        );

        let target_question_count = question_count_for(rerank.cited.len());
        debug!(
            "Reranker cited {} chunks, target {} questions",
            rerank.cited.len(),
            target_question_count
        );

        Ok(RetrievalOutcome {
            chunks: rerank.cited,
            target_question_count,
            hyde_usage,
            reranker_usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_count_step_function() {
        assert_eq!(question_count_for(0), 0);
        assert_eq!(question_count_for(1), 5);
        assert_eq!(question_count_for(2), 5);
        assert_eq!(question_count_for(3), 7);
        assert_eq!(question_count_for(4), 7);
        assert_eq!(question_count_for(5), 10);
        assert_eq!(question_count_for(12), 10);
    }
}
