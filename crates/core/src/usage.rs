//! Token usage value types.
//!
//! Every model-call site produces exactly one [`UsageRecord`] at its
//! boundary. Records are aggregated per user-visible answer; the per-scope
//! breakdown is kept so callers can see which step cost what.

use serde::{Deserialize, Serialize};

/// Token counts for a single model call, with the model that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cached_tokens: u32,
    pub model: String,
}

impl UsageRecord {
    /// The explicit zero value for a call that did not happen or whose
    /// usage was not reported.
    pub fn zero(model: impl Into<String>) -> Self {
        Self {
            input_tokens: 0,
            output_tokens: 0,
            cached_tokens: 0,
            model: model.into(),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.input_tokens == 0 && self.output_tokens == 0 && self.cached_tokens == 0
    }

    /// Sum records field-by-field. Model attribution follows the last
    /// record with a non-empty model name (the final generation call when
    /// records are pushed in call order).
    pub fn aggregate<'a>(records: impl IntoIterator<Item = &'a UsageRecord>) -> UsageRecord {
        let mut total = UsageRecord::zero("");
        for r in records {
            total.input_tokens += r.input_tokens;
            total.output_tokens += r.output_tokens;
            total.cached_tokens += r.cached_tokens;
            if !r.model.is_empty() {
                total.model = r.model.clone();
            }
        }
        total
    }
}

/// Which pipeline step produced a usage record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UsageScope {
    /// Conversation title generation.
    Title,
    /// Intent / context-need classification.
    Intent,
    /// Any summarization call (per-message or context cascade).
    Summary,
    /// The tool-selection model call.
    ToolSelection,
    /// The final answer generation.
    FinalAnswer,
}

impl std::fmt::Display for UsageScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Title => write!(f, "title"),
            Self::Intent => write!(f, "intent"),
            Self::Summary => write!(f, "summary"),
            Self::ToolSelection => write!(f, "tool_selection"),
            Self::FinalAnswer => write!(f, "final_answer"),
        }
    }
}

/// A usage record labeled with the call site that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopedUsage {
    pub scope: UsageScope,
    pub usage: UsageRecord,
}

impl ScopedUsage {
    pub fn new(scope: UsageScope, usage: UsageRecord) -> Self {
        Self { scope, usage }
    }
}
