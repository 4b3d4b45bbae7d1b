//! Usage accounting and cost attribution for shelftalk.
//!
//! One chat exchange makes several model calls (title, intent, summaries,
//! tool selection, final answer). This crate turns the per-call usage
//! records into one billable total and a priced per-scope breakdown.

pub mod accountant;
pub mod logging;
pub mod pricing;

pub use accountant::UsageAccountant;
pub use logging::init_tracing;
pub use pricing::{ModelRates, PricingTable, round_price};
