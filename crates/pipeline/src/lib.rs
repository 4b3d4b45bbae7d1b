//! Context assembly, tool dispatch and orchestration for shelftalk.
//!
//! This crate is the stateful heart of the system:
//!
//! 1. **[`ContextCache`]** — a TTL cache of assembled compact context,
//!    invalidated on every message write
//! 2. **[`ContextAssembler`]** — turns persisted history into model-ready
//!    `{role, content}` entries, preferring stored summaries
//! 3. **[`IntentClassifier`]** — decides how much history a message needs
//! 4. **[`Summarizer`]** — per-message summaries and the context cascade
//!    that bounds context growth
//! 5. **[`ToolDispatchLoop`]** — the two-call protocol interleaving a model
//!    call with catalog retrieval
//! 6. **[`ChatPipeline`]** — the linear state machine tying it all together
//!
//! One pipeline run handles one user message; independent runs proceed
//! concurrently and share nothing but the cache. Concurrent runs on the
//! *same* conversation are not serialized: the cache is last-write-wins
//! and storage orders messages by id, which is an accepted limitation of
//! this core rather than something the pipeline locks around.

pub mod assembler;
pub mod cache;
pub mod chat;
pub mod classifier;
pub mod dispatch;
pub mod summarizer;

#[cfg(test)]
pub(crate) mod test_support;

pub use assembler::{AssembledContext, ContextAssembler};
pub use cache::ContextCache;
pub use chat::{ChatOutcome, ChatPipeline};
pub use classifier::IntentClassifier;
pub use dispatch::{DispatchOutcome, ToolDispatchLoop};
pub use summarizer::Summarizer;
