//! Tenant backend: trait for lookup by platform id, plus a directory backed by memory or a JSON file.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// A business served by this deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub id: String,
    /// External platform identifiers (page/channel ids) routed to this tenant.
    #[serde(default)]
    pub platform_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    /// Knowledge context given to the model. Empty or unset means not configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl Tenant {
    /// Trimmed knowledge context, or None when empty/unset.
    pub fn knowledge_context(&self) -> Option<&str> {
        self.context
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }
}

/// On-disk shape of the tenants file: `{ "tenants": [...] }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TenantsFile {
    #[serde(default)]
    pub tenants: Vec<Tenant>,
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("tenant backend unavailable: {0}")]
    Unavailable(String),
    #[error("tenant data unreadable: {0}")]
    Corrupt(String),
}

/// Query side of the tenant datastore.
#[async_trait]
pub trait TenantStore: Send + Sync {
    /// Every tenant that registered `platform_id`. The caller decides what zero or several matches mean.
    async fn find_by_platform_id(&self, platform_id: &str) -> Result<Vec<Tenant>, StoreError>;
}

enum Source {
    Memory(Arc<RwLock<Vec<Tenant>>>),
    /// Re-read on every lookup so edits made by the settings UI apply without restart.
    File(PathBuf),
}

/// Tenant directory: in-memory list or a JSON file.
pub struct TenantDirectory {
    source: Source,
}

impl TenantDirectory {
    pub fn in_memory(tenants: Vec<Tenant>) -> Self {
        Self {
            source: Source::Memory(Arc::new(RwLock::new(tenants))),
        }
    }

    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            source: Source::File(path.into()),
        }
    }

    async fn snapshot(&self) -> Result<Vec<Tenant>, StoreError> {
        match &self.source {
            Source::Memory(inner) => Ok(inner.read().await.clone()),
            Source::File(path) => {
                let s = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| StoreError::Unavailable(format!("{}: {}", path.display(), e)))?;
                let file: TenantsFile = serde_json::from_str(&s)
                    .map_err(|e| StoreError::Corrupt(format!("{}: {}", path.display(), e)))?;
                Ok(file.tenants)
            }
        }
    }
}

#[async_trait]
impl TenantStore for TenantDirectory {
    async fn find_by_platform_id(&self, platform_id: &str) -> Result<Vec<Tenant>, StoreError> {
        let tenants = self.snapshot().await?;
        Ok(tenants
            .into_iter()
            .filter(|t| t.platform_ids.iter().any(|p| p == platform_id))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant(id: &str, pages: &[&str], context: Option<&str>) -> Tenant {
        Tenant {
            id: id.to_string(),
            platform_ids: pages.iter().map(|p| p.to_string()).collect(),
            business_name: None,
            context: context.map(str::to_string),
        }
    }

    #[test]
    fn blank_context_is_not_configured() {
        assert_eq!(tenant("t1", &[], Some("  \n")).knowledge_context(), None);
        assert_eq!(tenant("t1", &[], None).knowledge_context(), None);
        assert_eq!(
            tenant("t1", &[], Some(" Returns in 30 days. ")).knowledge_context(),
            Some("Returns in 30 days.")
        );
    }

    #[tokio::test]
    async fn memory_lookup_matches_any_registered_page() {
        let dir = TenantDirectory::in_memory(vec![
            tenant("t1", &["P1", "P2"], Some("a")),
            tenant("t2", &["P3"], Some("b")),
        ]);
        let found = dir.find_by_platform_id("P2").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "t1");
        assert!(dir.find_by_platform_id("P9").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn file_source_reads_and_reports_errors() {
        let dir = std::env::temp_dir().join(format!("assist-tenants-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("tenants.json");

        let missing = TenantDirectory::from_file(&path);
        assert!(matches!(
            missing.find_by_platform_id("P1").await,
            Err(StoreError::Unavailable(_))
        ));

        std::fs::write(
            &path,
            r#"{"tenants":[{"id":"t1","platformIds":["P1"],"context":"Open 9-5."}]}"#,
        )
        .unwrap();
        let store = TenantDirectory::from_file(&path);
        let found = store.find_by_platform_id("P1").await.unwrap();
        assert_eq!(found[0].id, "t1");

        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            store.find_by_platform_id("P1").await,
            Err(StoreError::Corrupt(_))
        ));
        let _ = std::fs::remove_dir_all(&dir);
    }
}
