//! Tenant context resolver: recipient id -> (tenant id, knowledge context).

use crate::error::PipelineError;
use crate::tenants::store::TenantStore;
use std::sync::Arc;
use std::time::Duration;

/// A tenant that is ready to answer: id plus non-empty knowledge context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTenant {
    pub tenant_id: String,
    pub context: String,
}

/// Resolves inbound recipients against a [`TenantStore`], retrying transient backend failures.
#[derive(Clone)]
pub struct TenantResolver {
    store: Arc<dyn TenantStore>,
    retries: u32,
    backoff: Duration,
}

impl TenantResolver {
    pub fn new(store: Arc<dyn TenantStore>, retries: u32, backoff: Duration) -> Self {
        Self {
            store,
            retries,
            backoff,
        }
    }

    /// Look up the single tenant registered for `recipient_id`.
    ///
    /// Zero matches is [`PipelineError::TenantNotFound`], several is
    /// [`PipelineError::AmbiguousTenant`], blank context is
    /// [`PipelineError::ContextNotConfigured`]. An unavailable backend is retried up to
    /// `retries` times before [`PipelineError::ResolutionFailed`]; unreadable tenant data
    /// fails at once as [`PipelineError::TenantDataCorrupt`].
    pub async fn resolve(&self, recipient_id: &str) -> Result<ResolvedTenant, PipelineError> {
        let mut attempt = 0;
        let matches = loop {
            match self.store.find_by_platform_id(recipient_id).await {
                Ok(m) => break m,
                Err(e) => {
                    let err = PipelineError::from(e);
                    if !err.is_retryable() || attempt >= self.retries {
                        return Err(err);
                    }
                    attempt += 1;
                    log::warn!(
                        "resolver: lookup for {} failed ({}), retry {}/{}",
                        recipient_id,
                        err,
                        attempt,
                        self.retries
                    );
                    tokio::time::sleep(self.backoff).await;
                }
            }
        };

        let mut matches = matches.into_iter();
        let tenant = match (matches.next(), matches.next()) {
            (None, _) => return Err(PipelineError::TenantNotFound(recipient_id.to_string())),
            (Some(t), None) => t,
            (Some(_), Some(_)) => {
                return Err(PipelineError::AmbiguousTenant(recipient_id.to_string()))
            }
        };
        match tenant.knowledge_context() {
            Some(ctx) => Ok(ResolvedTenant {
                tenant_id: tenant.id.clone(),
                context: ctx.to_string(),
            }),
            None => Err(PipelineError::ContextNotConfigured(tenant.id.clone())),
        }
    }
}
