//! The usage accountant — reduces a turn's per-call usage records to one
//! billable total.
//!
//! Attribution rule: the stored model name is the one that produced the
//! final answer, regardless of which cheaper models handled title, intent
//! or summarization along the way.

use crate::pricing::PricingTable;
use shelftalk_core::{MessageUsage, ScopedUsage, UsageRecord, UsageScope};
use std::sync::Arc;

pub struct UsageAccountant {
    pricing: Arc<PricingTable>,
}

impl UsageAccountant {
    pub fn new(pricing: Arc<PricingTable>) -> Self {
        Self { pricing }
    }

    /// Sum a turn's breakdown into the usage tuple stored on the
    /// assistant message. Token fields sum across every scope; the model
    /// attribution comes from the last `FinalAnswer` record, falling back
    /// to plain call-order attribution when none exists.
    pub fn settle(&self, breakdown: &[ScopedUsage]) -> MessageUsage {
        let mut total = UsageRecord::aggregate(breakdown.iter().map(|s| &s.usage));

        if let Some(attributed) = breakdown
            .iter()
            .rev()
            .find(|s| s.scope == UsageScope::FinalAnswer && !s.usage.model.is_empty())
        {
            total.model = attributed.usage.model.clone();
        }

        let price = self.pricing.price(
            &total.model,
            total.input_tokens,
            total.output_tokens,
            total.cached_tokens,
        );

        MessageUsage {
            input_tokens: total.input_tokens,
            output_tokens: total.output_tokens,
            cached_tokens: total.cached_tokens,
            model: total.model,
            price,
        }
    }

    /// Price a single per-scope line for the detailed breakdown.
    pub fn price_detail(&self, detail: &ScopedUsage) -> f64 {
        self.pricing.price(
            &detail.usage.model,
            detail.usage.input_tokens,
            detail.usage.output_tokens,
            detail.usage.cached_tokens,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scoped(scope: UsageScope, input: u32, output: u32, cached: u32, model: &str) -> ScopedUsage {
        ScopedUsage::new(
            scope,
            UsageRecord {
                input_tokens: input,
                output_tokens: output,
                cached_tokens: cached,
                model: model.into(),
            },
        )
    }

    #[test]
    fn settle_sums_every_scope() {
        let accountant = UsageAccountant::new(Arc::new(PricingTable::with_defaults()));
        let breakdown = vec![
            scoped(UsageScope::Title, 20, 8, 0, "gpt-4.1-mini"),
            scoped(UsageScope::Intent, 40, 4, 0, "gpt-4.1-mini"),
            scoped(UsageScope::ToolSelection, 300, 30, 0, "gpt-4.1"),
            scoped(UsageScope::FinalAnswer, 500, 120, 100, "gpt-4.1"),
            scoped(UsageScope::Summary, 150, 40, 0, "gpt-4.1-mini"),
        ];

        let settled = accountant.settle(&breakdown);
        assert_eq!(settled.input_tokens, 1010);
        assert_eq!(settled.output_tokens, 202);
        assert_eq!(settled.cached_tokens, 100);
        assert_eq!(settled.model, "gpt-4.1");
        assert!(settled.price > 0.0);
    }

    #[test]
    fn attribution_is_final_answer_even_when_summary_comes_later() {
        let accountant = UsageAccountant::new(Arc::new(PricingTable::with_defaults()));
        let breakdown = vec![
            scoped(UsageScope::FinalAnswer, 100, 50, 0, "gpt-4.1"),
            scoped(UsageScope::Summary, 10, 5, 0, "gpt-4.1-mini"),
        ];
        let settled = accountant.settle(&breakdown);
        assert_eq!(settled.model, "gpt-4.1");
    }

    #[test]
    fn unknown_model_settles_at_zero_price() {
        let accountant = UsageAccountant::new(Arc::new(PricingTable::empty()));
        let settled = accountant.settle(&[scoped(
            UsageScope::FinalAnswer,
            1000,
            500,
            0,
            "mystery-model",
        )]);
        assert_eq!(settled.input_tokens, 1000);
        assert!((settled.price - 0.0).abs() < 1e-12);
    }

    #[test]
    fn empty_breakdown_settles_to_zero() {
        let accountant = UsageAccountant::new(Arc::new(PricingTable::with_defaults()));
        let settled = accountant.settle(&[]);
        assert_eq!(settled.input_tokens, 0);
        assert_eq!(settled.output_tokens, 0);
        assert!((settled.price - 0.0).abs() < 1e-12);
    }

    #[test]
    fn detail_pricing_uses_detail_model() {
        let accountant = UsageAccountant::new(Arc::new(PricingTable::with_defaults()));
        let detail = scoped(UsageScope::Title, 1_000_000, 0, 0, "gpt-4.1-mini");
        let price = accountant.price_detail(&detail);
        assert!((price - 0.4).abs() < 1e-12);
    }
}
