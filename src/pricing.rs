//! Model pricing and cost estimation.

use serde::{Deserialize, Serialize};

/// Flat per-1K rate applied when a model has no pricing entry.
const DEFAULT_RATE_PER_1K: f64 = 0.0005;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPricing {
    pub model: String,
    pub input_cost_per_1k: f64,
    pub output_cost_per_1k: f64,
    pub currency: String,
}

impl ModelPricing {
    pub fn new(model: &str, input: f64, output: f64) -> Self {
        Self {
            model: model.into(),
            input_cost_per_1k: input,
            output_cost_per_1k: output,
            currency: "USD".into(),
        }
    }

    pub fn mini() -> Self {
        Self::new("gpt-4-mini", 0.00015, 0.0006)
    }

    pub fn turbo() -> Self {
        Self::new("gpt-4-turbo", 0.0005, 0.0015)
    }

    pub fn for_model(model: &str) -> Option<Self> {
        let m = model.to_lowercase();
        if m.contains("gpt-4-mini") {
            Some(Self::mini())
        } else if m.contains("gpt-4-turbo") {
            Some(Self::turbo())
        } else {
            None
        }
    }

    pub fn calculate_cost(&self, tokens_in: u32, tokens_out: u32) -> f64 {
        let cost = (tokens_in as f64 / 1000.0) * self.input_cost_per_1k
            + (tokens_out as f64 / 1000.0) * self.output_cost_per_1k;
        round6(cost)
    }
}

/// Cost of a call against a possibly unknown model.
pub fn cost_for(model: &str, tokens_in: u32, tokens_out: u32) -> f64 {
    match ModelPricing::for_model(model) {
        Some(pricing) => pricing.calculate_cost(tokens_in, tokens_out),
        None => round6((tokens_in + tokens_out) as f64 / 1000.0 * DEFAULT_RATE_PER_1K),
    }
}

/// Pre-call token estimate used for budget reservation.
///
/// Mirrors the heuristic the upstream usage report replaces: prompt tokens are
/// approximated from whitespace words, output tokens assume the call uses a
/// majority of its token allowance.
pub fn estimate_tokens(prompt: &str, max_tokens: u32) -> (u32, u32) {
    let words = prompt.split_whitespace().count() as f64;
    let tokens_in = ((words * 1.2) as u32).max(1);
    let tokens_out = ((max_tokens as f64 * 0.6) as u32).min(max_tokens).max(20);
    (tokens_in, tokens_out)
}

/// Estimated USD cost of a call before it is made.
pub fn estimate_cost(model: &str, prompt: &str, max_tokens: u32) -> f64 {
    let (tokens_in, tokens_out) = estimate_tokens(prompt, max_tokens);
    cost_for(model, tokens_in, tokens_out)
}

fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_model_rates() {
        let mini = ModelPricing::mini();
        assert_eq!(mini.calculate_cost(1000, 1000), 0.00075);
        let turbo = ModelPricing::turbo();
        assert_eq!(turbo.calculate_cost(1000, 1000), 0.002);
    }

    #[test]
    fn unknown_model_uses_flat_rate() {
        assert_eq!(cost_for("mystery-model", 500, 500), 0.0005);
    }

    #[test]
    fn estimate_has_floors() {
        let (tin, tout) = estimate_tokens("", 120);
        assert_eq!(tin, 1);
        assert_eq!(tout, 72);
        let (_, tout) = estimate_tokens("hi", 10);
        // The 20-token output floor applies even above max_tokens.
        assert_eq!(tout, 20);
    }

    #[test]
    fn estimated_cost_is_positive_for_paid_models() {
        let est = estimate_cost("gpt-4-turbo", "how do I settle before sleep", 400);
        assert!(est > 0.0);
        assert!(est < 0.01);
    }
}
