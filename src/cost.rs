//! Token accounting and per-stage cost tracking.
//!
//! Costs are reporting-only; they never influence control flow. Pricing is
//! always passed in explicitly (see [`crate::config::PricingConfig`]).

use std::ops::AddAssign;

use serde::Deserialize;
use serde::Serialize;

use crate::config::ModelPricing;

/// Token counts and their cost in KRW for one or more API calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub input_cost: f64,
    pub output_cost: f64,
}

impl TokenUsage {
    #[must_use]
    pub fn total_cost(&self) -> f64 {
        self.input_cost + self.output_cost
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, other: Self) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
        self.input_cost += other.input_cost;
        self.output_cost += other.output_cost;
    }
}

/// Compute cost for a call from token counts and a per-1000-token price.
#[must_use]
pub fn calculate_cost(input_tokens: u64, output_tokens: u64, pricing: ModelPricing) -> TokenUsage {
    TokenUsage {
        input_tokens,
        output_tokens,
        input_cost: (input_tokens as f64 / 1000.0) * pricing.input,
        output_cost: (output_tokens as f64 / 1000.0) * pricing.output,
    }
}

/// Cumulative cost per pipeline stage for the run summary.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CostTracker {
    pub hyde: TokenUsage,
    pub reranker: TokenUsage,
    pub generation: TokenUsage,
    pub postprocess: TokenUsage,
    pub evaluation: TokenUsage,
}

impl CostTracker {
    #[must_use]
    pub fn total(&self) -> f64 {
        self.hyde.total_cost()
            + self.reranker.total_cost()
            + self.generation.total_cost()
            + self.postprocess.total_cost()
            + self.evaluation.total_cost()
    }

    /// Fold another tracker (typically one round's costs) into this one.
    pub fn absorb(&mut self, other: &Self) {
        self.hyde += other.hyde;
        self.reranker += other.reranker;
        self.generation += other.generation;
        self.postprocess += other.postprocess;
        self.evaluation += other.evaluation;
    }

    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "HyDE {:.1} + rerank {:.1} + generation {:.1} + postprocess {:.1} + evaluation {:.1} = {:.1} KRW",
            self.hyde.total_cost(),
            self.reranker.total_cost(),
            self.generation.total_cost(),
            self.postprocess.total_cost(),
            self.evaluation.total_cost(),
            self.total()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRICING: ModelPricing = ModelPricing {
        input: 1.5,
        output: 5.0,
    };

    #[test]
    fn test_calculate_cost_per_thousand_tokens() {
        let usage = calculate_cost(500, 1000, PRICING);
        assert!((usage.input_cost - 0.75).abs() < 1e-9);
        assert!((usage.output_cost - 5.0).abs() < 1e-9);
        assert!((usage.total_cost() - 5.75).abs() < 1e-9);
    }

    #[test]
    fn test_injected_pricing_changes_cost() {
        let cheap = ModelPricing {
            input: 0.5,
            output: 2.0,
        };
        let usage = calculate_cost(1000, 1000, cheap);
        assert!((usage.total_cost() - 2.5).abs() < 1e-9);
    }

    #[test]
    fn test_usage_accumulation() {
        let mut total = TokenUsage::default();
        total += calculate_cost(100, 200, PRICING);
        total += calculate_cost(300, 400, PRICING);
        assert_eq!(total.input_tokens, 400);
        assert_eq!(total.output_tokens, 600);
        assert!((total.total_cost() - (0.6 + 3.0)).abs() < 1e-9);
    }

    #[test]
    fn test_tracker_absorb_and_summary() {
        let mut run = CostTracker::default();
        let round = CostTracker {
            hyde: calculate_cost(300, 100, PRICING),
            generation: calculate_cost(2000, 3000, PRICING),
            ..Default::default()
        };
        run.absorb(&round);
        run.absorb(&round);
        assert_eq!(run.hyde.input_tokens, 600);
        assert!((run.total() - 2.0 * round.total()).abs() < 1e-9);
        assert!(run.summary().contains("KRW"));
    }
}
