//! Data-access ports. The sync manager and handlers talk to storage through
//! these traits so tests can substitute in-memory fakes.

use crate::config::profiles::MpesaEnvironment;
use crate::domain::CredentialRecord;
use async_trait::async_trait;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("tenant profile not found: {0}")]
    TenantNotFound(Uuid),
    #[error("{0}")]
    Other(String),
}

/// How the active-environment credentials row reports its enablement flag.
/// `NotConfigured` (no row at all) and `Disabled` both count as "off" for
/// consistency purposes, but callers get to see the difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialsState {
    NotConfigured,
    Disabled,
    Enabled,
}

impl CredentialsState {
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled)
    }

    pub fn from_flag(flag: Option<bool>) -> Self {
        match flag {
            None => Self::NotConfigured,
            Some(false) => Self::Disabled,
            Some(true) => Self::Enabled,
        }
    }
}

/// The two denormalized enablement flags the sync manager keeps honest:
/// one on the credentials row, one on the tenant (bar) profile.
#[async_trait]
pub trait EnablementStore: Send + Sync {
    /// Flag on the active-environment credentials row; `None` when the
    /// tenant has no such row.
    async fn credentials_flag(&self, tenant_id: Uuid) -> Result<Option<bool>, StoreError>;

    /// Flag on the tenant profile row.
    async fn profile_flag(&self, tenant_id: Uuid) -> Result<bool, StoreError>;

    async fn set_credentials_flag(&self, tenant_id: Uuid, active: bool) -> Result<(), StoreError>;

    async fn set_profile_flag(&self, tenant_id: Uuid, enabled: bool) -> Result<(), StoreError>;
}

/// Credential persistence: one active row per (tenant, environment).
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn active_credentials(
        &self,
        tenant_id: Uuid,
        environment: MpesaEnvironment,
    ) -> Result<Option<CredentialRecord>, StoreError>;

    /// Deactivates any existing active row for the same (tenant,
    /// environment) and inserts the replacement.
    async fn save_credentials(&self, record: &CredentialRecord) -> Result<(), StoreError>;
}
