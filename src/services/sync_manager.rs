//! Enablement-flag sync manager.
//!
//! The "M-Pesa enabled" boolean is denormalized into two tables that are
//! updated independently, so they can drift when one write fails. Every
//! check here is a fresh read-compute-act cycle; there is no persistent
//! session and no lock. Concurrent writers to the same tenant race with
//! last-write-wins semantics, which is acceptable because consistency is
//! repair-driven rather than enforced at write time.

use crate::ports::{CredentialsState, EnablementStore};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

/// Which table wins when the two flags disagree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepairStrategy {
    /// The credentials row is the source of truth; the profile flag is
    /// overwritten to match.
    #[default]
    CredentialsAreAuthoritative,
    /// Inverse direction, available if the policy ever flips.
    ProfileIsAuthoritative,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncValidation {
    pub tenant_id: Uuid,
    pub credentials_active: bool,
    /// Distinguishes a tenant that never configured credentials from one
    /// whose credentials are switched off.
    pub credentials_configured: bool,
    pub bar_enabled: bool,
    pub is_consistent: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RepairOutcome {
    pub tenant_id: Uuid,
    pub repaired: bool,
    pub previous_bar_status: Option<bool>,
    pub new_bar_status: Option<bool>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusChangeOutcome {
    pub tenant_id: Uuid,
    pub success: bool,
    pub credentials_updated: bool,
    pub bar_status_updated: bool,
    pub error: Option<String>,
}

/// Detects and repairs divergence between the two enablement flags.
/// Methods never return `Err`; store failures land in the result's `error`
/// field so batch callers can branch without exception handling.
pub struct SyncManager<S> {
    store: S,
    strategy: RepairStrategy,
}

impl<S: EnablementStore> SyncManager<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            strategy: RepairStrategy::default(),
        }
    }

    pub fn with_strategy(store: S, strategy: RepairStrategy) -> Self {
        Self { store, strategy }
    }

    /// Reads both flags and reports whether they agree. A missing
    /// credentials row reads as disabled, never as an error.
    pub async fn validate_sync(&self, tenant_id: Uuid) -> SyncValidation {
        let credentials = match self.store.credentials_flag(tenant_id).await {
            Ok(flag) => CredentialsState::from_flag(flag),
            Err(e) => return SyncValidation::failed(tenant_id, e.to_string()),
        };

        let bar_enabled = match self.store.profile_flag(tenant_id).await {
            Ok(flag) => flag,
            Err(e) => return SyncValidation::failed(tenant_id, e.to_string()),
        };

        let credentials_active = credentials.is_enabled();
        let is_consistent = credentials_active == bar_enabled;

        if !is_consistent {
            warn!(
                %tenant_id,
                credentials_active, bar_enabled, "enablement flags diverged"
            );
        }

        SyncValidation {
            tenant_id,
            credentials_active,
            credentials_configured: credentials != CredentialsState::NotConfigured,
            bar_enabled,
            is_consistent,
            error: None,
        }
    }

    /// Re-validates and, if the flags disagree, overwrites the
    /// non-authoritative one. Idempotent: a consistent tenant is a no-op
    /// with `repaired = false`.
    pub async fn repair_inconsistency(&self, tenant_id: Uuid) -> RepairOutcome {
        let validation = self.validate_sync(tenant_id).await;

        if let Some(error) = validation.error {
            return RepairOutcome {
                tenant_id,
                repaired: false,
                previous_bar_status: None,
                new_bar_status: None,
                error: Some(error),
            };
        }

        if validation.is_consistent {
            return RepairOutcome {
                tenant_id,
                repaired: false,
                previous_bar_status: Some(validation.bar_enabled),
                new_bar_status: Some(validation.bar_enabled),
                error: None,
            };
        }

        match self.strategy {
            RepairStrategy::CredentialsAreAuthoritative => {
                let target = validation.credentials_active;
                if let Err(e) = self.store.set_profile_flag(tenant_id, target).await {
                    return RepairOutcome {
                        tenant_id,
                        repaired: false,
                        previous_bar_status: Some(validation.bar_enabled),
                        new_bar_status: None,
                        error: Some(e.to_string()),
                    };
                }
                info!(%tenant_id, target, "repaired profile flag from credentials");
                RepairOutcome {
                    tenant_id,
                    repaired: true,
                    previous_bar_status: Some(validation.bar_enabled),
                    new_bar_status: Some(target),
                    error: None,
                }
            }
            RepairStrategy::ProfileIsAuthoritative => {
                let target = validation.bar_enabled;
                if let Err(e) = self.store.set_credentials_flag(tenant_id, target).await {
                    return RepairOutcome {
                        tenant_id,
                        repaired: false,
                        previous_bar_status: Some(validation.bar_enabled),
                        new_bar_status: Some(validation.bar_enabled),
                        error: Some(e.to_string()),
                    };
                }
                info!(%tenant_id, target, "repaired credentials flag from profile");
                RepairOutcome {
                    tenant_id,
                    repaired: true,
                    previous_bar_status: Some(validation.bar_enabled),
                    new_bar_status: Some(validation.bar_enabled),
                    error: None,
                }
            }
        }
    }

    /// The only entry point that changes both flags together. Credentials
    /// first; if that write fails nothing else is attempted. A failure on
    /// the second write leaves a detectable inconsistency that a later
    /// [`repair_inconsistency`](Self::repair_inconsistency) fixes.
    pub async fn sync_mpesa_status(&self, tenant_id: Uuid, desired_active: bool) -> StatusChangeOutcome {
        if let Err(e) = self.store.set_credentials_flag(tenant_id, desired_active).await {
            return StatusChangeOutcome {
                tenant_id,
                success: false,
                credentials_updated: false,
                bar_status_updated: false,
                error: Some(e.to_string()),
            };
        }

        if let Err(e) = self.store.set_profile_flag(tenant_id, desired_active).await {
            // Credentials flag is already committed; report the partial
            // success so callers know a repair is due.
            warn!(
                %tenant_id,
                desired_active, "profile flag write failed after credentials commit"
            );
            return StatusChangeOutcome {
                tenant_id,
                success: false,
                credentials_updated: true,
                bar_status_updated: false,
                error: Some(e.to_string()),
            };
        }

        info!(%tenant_id, desired_active, "both enablement flags updated");
        StatusChangeOutcome {
            tenant_id,
            success: true,
            credentials_updated: true,
            bar_status_updated: true,
            error: None,
        }
    }
}

impl SyncValidation {
    fn failed(tenant_id: Uuid, error: String) -> Self {
        Self {
            tenant_id,
            credentials_active: false,
            credentials_configured: false,
            bar_enabled: false,
            is_consistent: false,
            error: Some(error),
        }
    }
}
