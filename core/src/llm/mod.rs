//! Hosted model clients.
//!
//! The orchestrator only sees [`ModelService`]; each provider keeps its wire
//! types private and converts to and from [`Turn`].

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::config::{ModelConfig, ModelProvider};
use crate::conversation::{FunctionCall, Part, Turn};
use crate::registry::ToolRecord;

pub mod gemini;
pub mod openai;

pub use gemini::GeminiBrain;
pub use openai::OpenAiBrain;

#[async_trait]
pub trait ModelService: Send + Sync {
    fn model_name(&self) -> &str;

    /// Cheap round-trip used at start-up to confirm the key and model work.
    async fn probe(&self) -> Result<String>;

    /// Given the catalog and the whole conversation so far, produce the
    /// model's next turn.
    async fn generate(&self, tools: &[ToolRecord], contents: &[Turn]) -> Result<ModelReply>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelReply {
    pub content: Turn,
}

impl ModelReply {
    pub fn new(content: Turn) -> Self {
        Self { content }
    }

    // Only the first part is inspected for a call
    pub fn function_call(&self) -> Option<&FunctionCall> {
        match self.content.parts.first() {
            Some(Part::FunctionCall(call)) => Some(call),
            _ => None,
        }
    }

    pub fn text(&self) -> Option<String> {
        let text: String = self
            .content
            .parts
            .iter()
            .filter_map(|part| match part {
                Part::Text(t) => Some(t.as_str()),
                _ => None,
            })
            .collect();
        (!text.is_empty()).then_some(text)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("model request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("model service returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("model returned no candidates ({reason})")]
    NoCandidates { reason: String },
}

pub fn build_model(config: &ModelConfig) -> Result<Arc<dyn ModelService>> {
    Ok(match config.provider {
        ModelProvider::Gemini => Arc::new(GeminiBrain::new(config)?),
        ModelProvider::OpenAi => Arc::new(OpenAiBrain::new(config)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::ROLE_MODEL;
    use serde_json::Map;

    #[test]
    fn call_only_counts_in_first_part() {
        let call = FunctionCall { name: "get_pan".into(), args: Map::new() };

        let first = ModelReply::new(Turn::new(ROLE_MODEL, vec![Part::FunctionCall(call.clone())]));
        assert_eq!(first.function_call(), Some(&call));

        let second = ModelReply::new(Turn::new(
            ROLE_MODEL,
            vec![Part::Text("thinking".into()), Part::FunctionCall(call)],
        ));
        assert!(second.function_call().is_none());
        assert_eq!(second.text().as_deref(), Some("thinking"));
    }

    #[test]
    fn reply_without_text_has_none() {
        let reply = ModelReply::new(Turn::new(ROLE_MODEL, vec![]));
        assert_eq!(reply.text(), None);
    }
}
