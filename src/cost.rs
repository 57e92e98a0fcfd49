use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::providers::Usage;

const TOKENS_PER_UNIT: f64 = 1_000_000.0;
const CLAUDE_PREFIX: &str = "claude-";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPrice {
    pub input_per_million: f64,
    pub output_per_million: f64,
}

impl ModelPrice {
    pub const fn new(input_per_million: f64, output_per_million: f64) -> Self {
        Self {
            input_per_million,
            output_per_million,
        }
    }

    pub fn cost(&self, usage: Usage) -> f64 {
        usage.input_tokens as f64 / TOKENS_PER_UNIT * self.input_per_million
            + usage.output_tokens as f64 / TOKENS_PER_UNIT * self.output_per_million
    }
}

pub const SONNET_PRICE: ModelPrice = ModelPrice::new(3.0, 15.0);
pub const HAIKU_PRICE: ModelPrice = ModelPrice::new(1.0, 5.0);

const DEFAULT_PRICES: &[(&str, ModelPrice)] = &[
    ("claude-sonnet-4-20250514", SONNET_PRICE),
    ("claude-3-haiku-20240307", HAIKU_PRICE),
];

#[derive(Debug, Clone)]
pub struct PriceTable {
    prices: HashMap<String, ModelPrice>,
}

impl Default for PriceTable {
    fn default() -> Self {
        Self {
            prices: DEFAULT_PRICES
                .iter()
                .map(|(model, price)| (model.to_string(), *price))
                .collect(),
        }
    }
}

impl PriceTable {
    pub fn empty() -> Self {
        Self {
            prices: HashMap::new(),
        }
    }

    pub fn with_prices(mut self, extra: &HashMap<String, ModelPrice>) -> Self {
        self.prices
            .extend(extra.iter().map(|(model, price)| (model.clone(), *price)));
        self
    }

    pub fn insert(&mut self, model: impl Into<String>, price: ModelPrice) {
        self.prices.insert(model.into(), price);
    }

    // Unlisted Claude models are billed at the larger model's rate.
    pub fn price_for(&self, model: &str) -> Option<ModelPrice> {
        if let Some(price) = self.prices.get(model) {
            return Some(*price);
        }
        model.starts_with(CLAUDE_PREFIX).then_some(SONNET_PRICE)
    }

    pub fn cost(&self, model: &str, usage: Usage) -> f64 {
        self.price_for(model)
            .map(|price| price.cost(usage))
            .unwrap_or(0.0)
    }
}
