//! Intent classification types.
//!
//! The classifier answers exactly one question per incoming user message:
//! how much prior conversation does the model need to answer it correctly?
//! The answer is a closed enumeration — no free-form strategy strings flow
//! between layers.

use serde::{Deserialize, Serialize};

/// How much prior context an incoming message requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextNeed {
    /// The message stands alone; no history is needed.
    None,
    /// Only the latest user/assistant exchange is needed.
    LastMessage,
    /// The message depends on the broader conversation.
    Full,
}

impl ContextNeed {
    /// Total mapping from need to the number of compact entries to serve.
    ///
    /// `cap` is the configured ceiling for a full-context read.
    pub fn entry_limit(&self, cap: usize) -> usize {
        match self {
            Self::None => 0,
            Self::LastMessage => 2,
            Self::Full => cap,
        }
    }
}

impl std::fmt::Display for ContextNeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::LastMessage => write!(f, "last_message"),
            Self::Full => write!(f, "full"),
        }
    }
}

/// The classifier's verdict for one incoming user message. Transient —
/// consumed by context assembly, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentEnvelope {
    pub context_need: ContextNeed,
}

impl IntentEnvelope {
    pub fn new(context_need: ContextNeed) -> Self {
        Self { context_need }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entry_limit_is_total() {
        assert_eq!(ContextNeed::None.entry_limit(50), 0);
        assert_eq!(ContextNeed::LastMessage.entry_limit(50), 2);
        assert_eq!(ContextNeed::Full.entry_limit(50), 50);
    }

    #[test]
    fn wire_names_are_snake_case() {
        let e: IntentEnvelope =
            serde_json::from_str(r#"{"context_need":"last_message"}"#).unwrap();
        assert_eq!(e.context_need, ContextNeed::LastMessage);

        let json = serde_json::to_string(&IntentEnvelope::new(ContextNeed::None)).unwrap();
        assert!(json.contains("\"none\""));
    }

    #[test]
    fn unknown_need_is_rejected_not_defaulted() {
        let parsed: Result<IntentEnvelope, _> =
            serde_json::from_str(r#"{"context_need":"everything"}"#);
        assert!(parsed.is_err());
    }
}
