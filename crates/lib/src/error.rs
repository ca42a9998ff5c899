//! Failure taxonomy for the webhook pipeline.
//!
//! Only [`PipelineError::VerificationFailed`] ever reaches the platform (as a 403).
//! Everything downstream of the ingestion ack is terminal and logged.

use crate::tenants::StoreError;

/// Why an inbound event did not produce a generated reply.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("webhook verification failed")]
    VerificationFailed,
    #[error("malformed webhook event: {0}")]
    MalformedEvent(String),
    #[error("no tenant registered for recipient {0}")]
    TenantNotFound(String),
    #[error("recipient {0} maps to more than one tenant")]
    AmbiguousTenant(String),
    #[error("tenant {0} has no knowledge context configured")]
    ContextNotConfigured(String),
    #[error("tenant resolution failed: {0}")]
    ResolutionFailed(String),
    #[error("tenant data corrupt: {0}")]
    TenantDataCorrupt(String),
    #[error("answer generation failed: {0}")]
    GenerationFailed(String),
    #[error("delivery failed: {0}")]
    DeliveryFailed(String),
}

/// Reply when the recipient maps to no single tenant.
pub const TENANT_NOT_FOUND_REPLY: &str =
    "Sorry, this business has not configured their assistant yet.";

/// Reply when the tenant exists but has no knowledge context.
pub const CONTEXT_NOT_CONFIGURED_REPLY: &str =
    "Sorry, the assistant has not been configured yet. Please check back later.";

/// Reply for transient and generation failures.
pub const GENERIC_FAILURE_REPLY: &str =
    "Sorry, something went wrong with the AI service. Please try again later.";

impl PipelineError {
    /// Only transient backend lookups are worth repeating.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::ResolutionFailed(_))
    }

    /// User-facing text sent in place of a generated answer, if this failure warrants one.
    pub fn fallback_reply(&self) -> Option<&'static str> {
        match self {
            PipelineError::TenantNotFound(_) | PipelineError::AmbiguousTenant(_) => {
                Some(TENANT_NOT_FOUND_REPLY)
            }
            PipelineError::ContextNotConfigured(_) => Some(CONTEXT_NOT_CONFIGURED_REPLY),
            PipelineError::ResolutionFailed(_)
            | PipelineError::TenantDataCorrupt(_)
            | PipelineError::GenerationFailed(_) => Some(GENERIC_FAILURE_REPLY),
            PipelineError::VerificationFailed
            | PipelineError::MalformedEvent(_)
            | PipelineError::DeliveryFailed(_) => None,
        }
    }
}

impl From<StoreError> for PipelineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable(m) => PipelineError::ResolutionFailed(m),
            StoreError::Corrupt(m) => PipelineError::TenantDataCorrupt(m),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_resolution_failures_retry() {
        assert!(PipelineError::ResolutionFailed("timeout".into()).is_retryable());
        assert!(!PipelineError::TenantNotFound("P1".into()).is_retryable());
        assert!(!PipelineError::GenerationFailed("empty".into()).is_retryable());
    }

    #[test]
    fn store_errors_map_by_permanence() {
        let outage = PipelineError::from(StoreError::Unavailable("reset".into()));
        assert!(outage.is_retryable());
        let corrupt = PipelineError::from(StoreError::Corrupt("bad json".into()));
        assert!(matches!(corrupt, PipelineError::TenantDataCorrupt(_)));
        assert!(!corrupt.is_retryable());
        assert_eq!(corrupt.fallback_reply(), Some(GENERIC_FAILURE_REPLY));
    }

    #[test]
    fn fallback_replies() {
        assert_eq!(
            PipelineError::AmbiguousTenant("P1".into()).fallback_reply(),
            Some(TENANT_NOT_FOUND_REPLY)
        );
        assert_eq!(
            PipelineError::ContextNotConfigured("t1".into()).fallback_reply(),
            Some(CONTEXT_NOT_CONFIGURED_REPLY)
        );
        assert_eq!(PipelineError::DeliveryFailed("503".into()).fallback_reply(), None);
    }
}
