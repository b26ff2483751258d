//! STK push initiation endpoint.

use crate::db::queries;
use crate::domain::credentials::DecryptedCredentials;
use crate::domain::PaymentTransaction;
use crate::error::AppError;
use crate::mpesa::client::{DarajaError, StkPushResponse};
use crate::mpesa::request::StkPushRequest;
use crate::ports::CredentialStore;
use crate::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use bigdecimal::BigDecimal;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct InitiatePaymentRequest {
    pub tenant_id: Uuid,
    pub order_id: Uuid,
    /// Raw customer input; normalized here, not by the request builder.
    pub phone: String,
    /// Decimal string, KES.
    pub amount: String,
}

#[derive(Debug, Serialize)]
pub struct InitiatePaymentResponse {
    pub transaction_id: Uuid,
    pub checkout_request_id: String,
    pub customer_message: String,
}

pub async fn initiate_payment(
    State(state): State<AppState>,
    Json(payload): Json<InitiatePaymentRequest>,
) -> Result<Json<InitiatePaymentResponse>, AppError> {
    let phone = crate::phone::validate(&payload.phone)?;

    let amount = BigDecimal::from_str(&payload.amount)
        .map_err(|_| AppError::Validation(format!("invalid amount: {}", payload.amount)))?;

    let record = state
        .store()
        .active_credentials(payload.tenant_id, state.environment)
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
        .ok_or_else(|| {
            AppError::Validation(format!(
                "tenant {} has no active {} M-Pesa credentials",
                payload.tenant_id,
                state.environment.as_str()
            ))
        })?;

    let credentials = record.decrypt(&state.codec)?;

    let request = StkPushRequest::build(
        &credentials,
        &amount,
        &phone.canonical,
        payload.tenant_id,
        payload.order_id,
        Utc::now(),
    )?;

    let tx = PaymentTransaction::new(
        payload.tenant_id,
        payload.order_id,
        phone.canonical.clone(),
        amount,
    );
    queries::insert_transaction(&state.db, &tx).await?;

    let response = match request_push(&state, &credentials, &request).await {
        Ok(response) => response,
        Err(e) => {
            // The customer never saw a prompt and no callback will come;
            // the row must not stay pending.
            if let Err(db_err) = queries::mark_transaction_failed(&state.db, tx.id).await {
                tracing::error!(
                    transaction_id = %tx.id,
                    error = %db_err,
                    "could not mark transaction failed after upstream error"
                );
            }
            return Err(e.into());
        }
    };

    queries::mark_transaction_sent(
        &state.db,
        tx.id,
        &response.merchant_request_id,
        &response.checkout_request_id,
    )
    .await?;

    tracing::info!(
        transaction_id = %tx.id,
        checkout_request_id = %response.checkout_request_id,
        "STK push sent"
    );

    Ok(Json(InitiatePaymentResponse {
        transaction_id: tx.id,
        checkout_request_id: response.checkout_request_id,
        customer_message: response.customer_message,
    }))
}

async fn request_push(
    state: &AppState,
    credentials: &DecryptedCredentials,
    request: &StkPushRequest,
) -> Result<StkPushResponse, DarajaError> {
    let token = state
        .daraja
        .get_access_token(&credentials.consumer_key, &credentials.consumer_secret)
        .await?;
    state
        .daraja
        .initiate_stk_push(&token.access_token, request)
        .await
}

#[derive(Debug, Serialize)]
pub struct TransactionView {
    pub id: Uuid,
    pub order_id: Uuid,
    pub status: String,
    pub amount: String,
    pub currency: String,
    pub phone_display: String,
    pub receipt_number: Option<String>,
}

/// Status polling endpoint for the ordering UI after a push is sent.
pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TransactionView>, AppError> {
    let row = queries::get_transaction(&state.db, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("transaction {}", id)))?;

    let tx = row
        .into_domain()
        .map_err(AppError::Internal)?;

    Ok(Json(TransactionView {
        id: tx.id,
        order_id: tx.order_id,
        status: tx.status.as_str().to_string(),
        amount: tx.amount.to_string(),
        currency: tx.currency,
        phone_display: tx.phone.display(),
        receipt_number: tx.receipt_number,
    }))
}
