//! Tenants: the businesses served by this deployment and how inbound events find them.
//!
//! A tenant registers one or more platform identifiers (e.g. Messenger page ids) and a
//! free-text knowledge context. The resolver maps a recipient id to exactly one tenant.

mod resolver;
mod store;

pub use resolver::{ResolvedTenant, TenantResolver};
pub use store::{StoreError, Tenant, TenantDirectory, TenantStore, TenantsFile};
