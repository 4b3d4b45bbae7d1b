//! Generative model gateway implementations for shelftalk.
//!
//! The pipeline talks to the model through the [`shelftalk_core::ModelGateway`]
//! trait; this crate provides the OpenAI-compatible HTTP implementation
//! covering all five call shapes (title, intent, summarize, tool
//! selection, final answer).

pub mod openai;

pub use openai::{GatewayModels, OpenAiGateway};
