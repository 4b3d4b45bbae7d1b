//! Built-in pricing table for the chat models the pipeline calls.
//!
//! Prices are in USD per 1 million tokens. Each model has an input, an
//! output, and a cached-input price. Custom pricing can be added at
//! runtime from configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::RwLock;

/// The number of decimal places a computed price is rounded to.
const PRICE_PRECISION: i32 = 7;

/// Round a USD amount to the fixed price precision.
pub fn round_price(value: f64) -> f64 {
    let factor = 10f64.powi(PRICE_PRECISION);
    (value * factor).round() / factor
}

/// Per-million-token pricing for a model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelRates {
    /// Price per 1M input tokens in USD.
    pub input_per_m: f64,
    /// Price per 1M output tokens in USD.
    pub output_per_m: f64,
    /// Price per 1M cached input tokens in USD.
    pub cached_input_per_m: f64,
}

impl ModelRates {
    pub fn new(input_per_m: f64, output_per_m: f64, cached_input_per_m: f64) -> Self {
        Self {
            input_per_m,
            output_per_m,
            cached_input_per_m,
        }
    }

    /// Compute the rounded cost for the given token counts.
    pub fn cost(&self, input_tokens: u32, output_tokens: u32, cached_tokens: u32) -> f64 {
        let raw = (input_tokens as f64 * self.input_per_m
            + output_tokens as f64 * self.output_per_m
            + cached_tokens as f64 * self.cached_input_per_m)
            / 1_000_000.0;
        round_price(raw)
    }
}

/// Thread-safe pricing table with built-in defaults and custom overrides.
pub struct PricingTable {
    rates: RwLock<HashMap<String, ModelRates>>,
}

impl PricingTable {
    /// Create a pricing table with built-in model prices.
    pub fn with_defaults() -> Self {
        let mut rates = HashMap::new();

        rates.insert("gpt-4o".into(), ModelRates::new(2.5, 10.0, 1.25));
        rates.insert("gpt-4o-mini".into(), ModelRates::new(0.15, 0.6, 0.075));
        rates.insert("gpt-4.1".into(), ModelRates::new(2.0, 8.0, 0.5));
        rates.insert("gpt-4.1-mini".into(), ModelRates::new(0.4, 1.6, 0.1));
        rates.insert("gpt-4.1-nano".into(), ModelRates::new(0.1, 0.4, 0.025));
        rates.insert("o4-mini".into(), ModelRates::new(1.1, 4.4, 0.275));

        Self {
            rates: RwLock::new(rates),
        }
    }

    /// Create an empty pricing table.
    pub fn empty() -> Self {
        Self {
            rates: RwLock::new(HashMap::new()),
        }
    }

    /// Look up rates for a model. Returns None if not found.
    pub fn get(&self, model: &str) -> Option<ModelRates> {
        let rates = self.rates.read().unwrap();
        rates.get(model).copied()
    }

    /// Add or update rates for a model.
    pub fn set(&self, model: impl Into<String>, rates: ModelRates) {
        let mut table = self.rates.write().unwrap();
        table.insert(model.into(), rates);
    }

    /// Compute the rounded cost of a model call. Unknown models price at
    /// 0.0 rather than failing.
    ///
    /// Matching tries the exact name first, then falls back to the
    /// longest table key that prefixes the model name (API responses
    /// often carry a version suffix, e.g. `gpt-4o-mini-2024-07-18`).
    pub fn price(
        &self,
        model: &str,
        input_tokens: u32,
        output_tokens: u32,
        cached_tokens: u32,
    ) -> f64 {
        let rates = self.rates.read().unwrap();

        if let Some(r) = rates.get(model) {
            return r.cost(input_tokens, output_tokens, cached_tokens);
        }

        let model_lower = model.to_lowercase();
        let mut best: Option<(&str, &ModelRates)> = None;
        for (key, r) in rates.iter() {
            if model_lower.starts_with(&key.to_lowercase())
                && best.is_none_or(|(k, _)| key.len() > k.len())
            {
                best = Some((key.as_str(), r));
            }
        }

        match best {
            Some((_, r)) => r.cost(input_tokens, output_tokens, cached_tokens),
            None => 0.0,
        }
    }

    /// List all known model names, sorted.
    pub fn models(&self) -> Vec<String> {
        let rates = self.rates.read().unwrap();
        let mut names: Vec<String> = rates.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of models in the pricing table.
    pub fn len(&self) -> usize {
        self.rates.read().unwrap().len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}
