//! Reply pipeline for one inbound event: resolve tenant, generate answer, send reply.
//!
//! Stages run strictly in order and every event gets at most one outbound send.
//! Failures before the send turn into a fixed user-facing reply; a failed send is only logged.

use crate::answer::{AnswerGenerator, AnswerRequest, AnswerResult};
use crate::config::{self, Config};
use crate::error::{PipelineError, GENERIC_FAILURE_REPLY};
use crate::interactions::{Interaction, InteractionLog, JsonlInteractionLog};
use crate::llm::OllamaClient;
use crate::messenger::{GraphSender, InboundEvent, MessageSender, OutboundMessage};
use crate::tenants::{ResolvedTenant, TenantDirectory, TenantResolver};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// What happened to one event.
#[derive(Debug)]
pub enum Outcome {
    /// Echo or non-text event; nothing was resolved or sent.
    Skipped,
    /// A generated answer was delivered.
    Answered { tenant_id: String },
    /// A fixed reply was delivered in place of an answer.
    FellBack(PipelineError),
    /// The reply (answer or fallback) could not be delivered.
    Undelivered(PipelineError),
}

/// Composes resolver, generator and sender. Shared read-only across events.
pub struct ReplyPipeline {
    resolver: TenantResolver,
    generator: AnswerGenerator,
    sender: Arc<dyn MessageSender>,
    interactions: Option<Arc<dyn InteractionLog>>,
}

impl ReplyPipeline {
    pub fn new(
        resolver: TenantResolver,
        generator: AnswerGenerator,
        sender: Arc<dyn MessageSender>,
    ) -> Self {
        Self {
            resolver,
            generator,
            sender,
            interactions: None,
        }
    }

    pub fn with_interactions(mut self, log: Arc<dyn InteractionLog>) -> Self {
        self.interactions = Some(log);
        self
    }

    /// Wire the bundled collaborators from config: JSON-file tenants, Ollama, Graph Send API,
    /// and the JSON-lines interaction log.
    pub fn from_config(config: &Config, config_path: &Path) -> Self {
        let tenants_path = config::resolve_tenants_path(config, config_path);
        if !tenants_path.exists() {
            log::warn!(
                "tenants file {} not found; lookups will fail until it exists",
                tenants_path.display()
            );
        }
        let resolver = TenantResolver::new(
            Arc::new(TenantDirectory::from_file(tenants_path)),
            config.tenants.resolve_retries,
            Duration::from_millis(config.tenants.retry_backoff_ms),
        );
        let backend = OllamaClient::new(config.llm.base_url.clone(), config.llm.model_name());
        let generator = AnswerGenerator::new(Arc::new(backend), config.answer.extract_strategy);
        let access_token = config::resolve_page_access_token(config);
        if access_token.is_none() {
            log::warn!("no page access token configured; replies will not be delivered");
        }
        let sender = GraphSender::new(
            config.messenger.graph_api_base.clone(),
            config.messenger.graph_api_version.clone(),
            access_token,
        );
        let interactions = config::resolve_interactions_path(config, config_path);
        log::debug!("recording interactions to {}", interactions.display());
        Self::new(resolver, generator, Arc::new(sender))
            .with_interactions(Arc::new(JsonlInteractionLog::new(interactions)))
    }

    /// Resolve the tenant for `recipient_id` and answer `question` from its context.
    /// No completion is requested unless the tenant has a knowledge context.
    pub async fn answer(
        &self,
        recipient_id: &str,
        question: &str,
        on_delta: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<(ResolvedTenant, AnswerResult), PipelineError> {
        let tenant = self.resolver.resolve(recipient_id).await?;
        let request = AnswerRequest {
            context: tenant.context.clone(),
            question: question.to_string(),
        };
        let result = self.generator.generate(&request, on_delta).await?;
        Ok((tenant, result))
    }

    /// Run the whole pipeline for one event.
    pub async fn run(&self, event: InboundEvent) -> Outcome {
        let Some(question) = event.actionable_text() else {
            log::debug!(
                "pipeline: skipping event from {} (echo: {}, text: {})",
                event.sender_id,
                event.is_echo,
                event.text.is_some()
            );
            return Outcome::Skipped;
        };

        let mut revealed = 0usize;
        let mut on_delta = |d: &str| revealed += d.len();
        let answered = self
            .answer(&event.recipient_id, question, &mut on_delta)
            .await;
        let (reply, outcome) = match answered {
            Ok((tenant, result)) => {
                log::info!(
                    "pipeline: answered {} for tenant {} ({} bytes)",
                    event.sender_id,
                    tenant.tenant_id,
                    revealed
                );
                self.record(&tenant, &event, question, &result).await;
                (
                    result.answer,
                    Outcome::Answered {
                        tenant_id: tenant.tenant_id,
                    },
                )
            }
            Err(e) => {
                log::warn!("pipeline: recipient {}: {}", event.recipient_id, e);
                let reply = e.fallback_reply().unwrap_or(GENERIC_FAILURE_REPLY);
                (reply.to_string(), Outcome::FellBack(e))
            }
        };

        let message = OutboundMessage {
            recipient_id: event.sender_id.clone(),
            page_id: event.recipient_id.clone(),
            text: reply,
        };
        match self.sender.send(&message).await {
            Ok(()) => outcome,
            Err(e) => {
                log::warn!(
                    "pipeline: reply to {} via {} not delivered: {}",
                    message.recipient_id,
                    message.page_id,
                    e
                );
                Outcome::Undelivered(PipelineError::DeliveryFailed(e.to_string()))
            }
        }
    }

    async fn record(
        &self,
        tenant: &ResolvedTenant,
        event: &InboundEvent,
        question: &str,
        result: &AnswerResult,
    ) {
        let Some(ref sink) = self.interactions else {
            return;
        };
        let interaction = Interaction {
            tenant_id: tenant.tenant_id.clone(),
            customer_id: event.sender_id.clone(),
            question: question.to_string(),
            answer: result.answer.clone(),
            at: chrono::Utc::now(),
        };
        if let Err(e) = sink.record(interaction).await {
            log::warn!("pipeline: recording interaction failed: {}", e);
        }
    }
}
