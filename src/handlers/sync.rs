//! Admin endpoints over the enablement-flag sync manager. Thin wrappers:
//! the manager already reports failures as data, so these never 500 on a
//! detected inconsistency.

use crate::services::SyncManager;
use crate::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::services::sync_manager::{RepairOutcome, StatusChangeOutcome, SyncValidation};

pub async fn validate_sync(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> Json<SyncValidation> {
    let manager = SyncManager::new(state.store());
    Json(manager.validate_sync(tenant_id).await)
}

pub async fn repair_inconsistency(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
) -> Json<RepairOutcome> {
    let manager = SyncManager::new(state.store());
    Json(manager.repair_inconsistency(tenant_id).await)
}

#[derive(Debug, Deserialize)]
pub struct StatusChangeRequest {
    pub active: bool,
}

pub async fn change_status(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    Json(payload): Json<StatusChangeRequest>,
) -> Json<StatusChangeOutcome> {
    let manager = SyncManager::new(state.store());
    Json(manager.sync_mpesa_status(tenant_id, payload.active).await)
}
