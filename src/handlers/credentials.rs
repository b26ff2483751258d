//! Credential setup and rotation endpoint.
//!
//! Saving encrypts the three secrets and replaces the tenant's active row
//! for the process environment; the previous row is deactivated, not
//! deleted. Secrets never appear in responses or logs.

use crate::domain::NewCredentials;
use crate::error::AppError;
use crate::ports::CredentialStore;
use crate::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct SaveCredentialsRequest {
    pub business_short_code: String,
    pub consumer_key: String,
    pub consumer_secret: String,
    pub passkey: String,
    /// Optional override; defaults to this service's own callback endpoint.
    pub callback_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SaveCredentialsResponse {
    pub credential_id: Uuid,
    pub environment: String,
    pub key_version: i16,
}

pub async fn save_credentials(
    State(state): State<AppState>,
    Path(tenant_id): Path<Uuid>,
    Json(payload): Json<SaveCredentialsRequest>,
) -> Result<Json<SaveCredentialsResponse>, AppError> {
    if payload.business_short_code.is_empty()
        || !payload.business_short_code.chars().all(|c| c.is_ascii_digit())
    {
        return Err(AppError::Validation(
            "business short code must be numeric".to_string(),
        ));
    }
    if payload.consumer_key.is_empty()
        || payload.consumer_secret.is_empty()
        || payload.passkey.is_empty()
    {
        return Err(AppError::Validation(
            "consumer key, consumer secret and passkey are all required".to_string(),
        ));
    }

    let callback_url = payload.callback_url.unwrap_or_else(|| {
        format!(
            "{}/mpesa/callback",
            state.callback_base_url.trim_end_matches('/')
        )
    });

    let record = NewCredentials {
        tenant_id,
        environment: state.environment,
        business_short_code: payload.business_short_code,
        consumer_key: payload.consumer_key,
        consumer_secret: payload.consumer_secret,
        passkey: payload.passkey,
        callback_url,
    }
    .seal(&state.codec)?;

    state
        .store()
        .save_credentials(&record)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;

    tracing::info!(
        %tenant_id,
        environment = state.environment.as_str(),
        "credentials saved"
    );

    Ok(Json(SaveCredentialsResponse {
        credential_id: record.id,
        environment: record.environment.as_str().to_string(),
        key_version: record.key_version,
    }))
}
