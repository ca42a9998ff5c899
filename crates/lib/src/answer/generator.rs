//! Answer generator: builds the grounded prompt and drives a streaming completion through the extractor.

use crate::answer::extractor::AnswerExtractor;
use crate::config::ExtractStrategy;
use crate::error::PipelineError;
use crate::llm::{ChatMessage, CompletionBackend};
use std::sync::Arc;

/// One question against one tenant's knowledge context. Built per event, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerRequest {
    pub context: String,
    pub question: String,
}

/// Fully recovered answer text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnswerResult {
    pub answer: String,
}

/// Build the system + user messages for a request.
/// The model is told to use only the business context and to reply as `{"answer": string}`.
pub fn build_messages(request: &AnswerRequest) -> Vec<ChatMessage> {
    let system = format!(
        "You are a helpful customer support assistant for a business. Answer the customer's \
         question using ONLY the business context below. Do not use any external knowledge. \
         If the answer is not in the context, politely say that you don't have that information.\n\n\
         Reply with a single JSON object of the form {{\"answer\": \"<your reply>\"}} and nothing else.\n\n\
         Business context:\n\"\"\"\n{}\n\"\"\"",
        request.context.trim()
    );
    vec![
        ChatMessage::system(system),
        ChatMessage::user(request.question.trim()),
    ]
}

/// Wraps a [`CompletionBackend`] and decodes its output with an [`AnswerExtractor`].
#[derive(Clone)]
pub struct AnswerGenerator {
    backend: Arc<dyn CompletionBackend>,
    strategy: ExtractStrategy,
}

impl AnswerGenerator {
    pub fn new(backend: Arc<dyn CompletionBackend>, strategy: ExtractStrategy) -> Self {
        Self { backend, strategy }
    }

    /// Generate an answer. `on_delta` receives newly revealed answer text as soon as it can be decoded.
    ///
    /// Fails with [`PipelineError::GenerationFailed`] when the backend errors or when no
    /// non-empty `answer` was ever recovered; partial or raw output is never returned.
    pub async fn generate(
        &self,
        request: &AnswerRequest,
        on_delta: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<AnswerResult, PipelineError> {
        let mut extractor = AnswerExtractor::new(self.strategy);
        let mut fragments = 0usize;
        let mut on_chunk = |fragment: &str| {
            fragments += 1;
            if let Some(delta) = extractor.push(fragment) {
                on_delta(&delta);
            }
        };
        self.backend
            .complete_stream(build_messages(request), &mut on_chunk)
            .await
            .map_err(|e| PipelineError::GenerationFailed(e.to_string()))?;

        log::debug!(
            "generator: stream ended after {} fragment(s), {} byte(s)",
            fragments,
            extractor.buffered_len()
        );
        match extractor.finish() {
            Some(answer) if !answer.trim().is_empty() => Ok(AnswerResult { answer }),
            Some(_) => Err(PipelineError::GenerationFailed(
                "model returned an empty answer".to_string(),
            )),
            None => Err(PipelineError::GenerationFailed(
                "no answer object recovered from model output".to_string(),
            )),
        }
    }
}
