//! Completion backend abstraction and Ollama client.
//!
//! The reply pipeline only needs "submit messages, receive text chunks as they are generated";
//! [`CompletionBackend`] is that seam, [`OllamaClient`] the bundled implementation.

mod ollama;

pub use ollama::{ChatMessage, OllamaClient};

use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("llm request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("llm api error: {0}")]
    Api(String),
}

/// Streaming text completion.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Run one completion, calling `on_chunk` with each raw text fragment as it arrives.
    /// Fragments carry no alignment guarantee; they may split tokens or UTF-8 sequences
    /// only at the backend's own boundaries. Returns once the stream has ended.
    async fn complete_stream(
        &self,
        messages: Vec<ChatMessage>,
        on_chunk: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<(), LlmError>;
}
