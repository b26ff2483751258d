//! Daraja asynchronous callback endpoint.
//!
//! Correlates the notification back to a payment transaction by
//! CheckoutRequestID and performs the single terminal-status write. Once a
//! payload is structurally valid we always acknowledge with ResultCode 0:
//! Daraja retries on anything else, and a replayed callback is already a
//! no-op against a terminal row.

use crate::db::queries;
use crate::validation::schemas::SCHEMAS;
use crate::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct CallbackEnvelope {
    #[serde(rename = "Body")]
    pub body: CallbackBody,
}

#[derive(Debug, Deserialize)]
pub struct CallbackBody {
    #[serde(rename = "stkCallback")]
    pub stk_callback: StkCallback,
}

#[derive(Debug, Deserialize)]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResultCode")]
    pub result_code: i32,
    #[serde(rename = "ResultDesc")]
    pub result_desc: String,
    #[serde(rename = "CallbackMetadata", default)]
    pub callback_metadata: Option<CallbackMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackMetadata {
    #[serde(rename = "Item", default)]
    pub items: Vec<MetadataItem>,
}

#[derive(Debug, Deserialize)]
pub struct MetadataItem {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value", default)]
    pub value: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct CallbackAck {
    #[serde(rename = "ResultCode")]
    pub result_code: i32,
    #[serde(rename = "ResultDesc")]
    pub result_desc: String,
}

impl StkCallback {
    fn receipt_number(&self) -> Option<String> {
        self.callback_metadata.as_ref()?.items.iter().find_map(|item| {
            if item.name == "MpesaReceiptNumber" {
                item.value.as_ref()?.as_str().map(String::from)
            } else {
                None
            }
        })
    }
}

pub async fn handle_callback(
    State(state): State<AppState>,
    Json(raw): Json<Value>,
) -> impl IntoResponse {
    if SCHEMAS.stk_callback_v1.validate(&raw).is_err() {
        tracing::warn!("rejected malformed STK callback payload");
        return (
            StatusCode::BAD_REQUEST,
            Json(CallbackAck {
                result_code: 1,
                result_desc: "Malformed payload".to_string(),
            }),
        );
    }

    let envelope: CallbackEnvelope = match serde_json::from_value(raw.clone()) {
        Ok(e) => e,
        Err(e) => {
            tracing::warn!("failed to deserialize STK callback: {}", e);
            return (
                StatusCode::BAD_REQUEST,
                Json(CallbackAck {
                    result_code: 1,
                    result_desc: "Malformed payload".to_string(),
                }),
            );
        }
    };

    let callback = envelope.body.stk_callback;
    tracing::info!(
        checkout_request_id = %callback.checkout_request_id,
        result_code = callback.result_code,
        "processing STK callback"
    );

    let accepted = (
        StatusCode::OK,
        Json(CallbackAck {
            result_code: 0,
            result_desc: "Accepted".to_string(),
        }),
    );

    let row = match queries::find_by_checkout_request(&state.db, &callback.checkout_request_id)
        .await
    {
        Ok(Some(row)) => row,
        Ok(None) => {
            tracing::warn!(
                checkout_request_id = %callback.checkout_request_id,
                "callback for unknown checkout request"
            );
            return accepted;
        }
        Err(e) => {
            tracing::error!("callback lookup failed: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(CallbackAck {
                    result_code: 1,
                    result_desc: "Internal error".to_string(),
                }),
            );
        }
    };

    let mut tx = match row.into_domain() {
        Ok(tx) => tx,
        Err(e) => {
            tracing::error!("stored transaction failed domain conversion: {}", e);
            return accepted;
        }
    };

    let receipt = callback.receipt_number();
    if !tx.apply_callback(callback.result_code, receipt.clone(), raw.clone()) {
        tracing::warn!(
            transaction_id = %tx.id,
            status = tx.status.as_str(),
            "replayed callback against terminal transaction ignored"
        );
        return accepted;
    }

    match queries::apply_terminal_status(
        &state.db,
        tx.id,
        tx.status,
        callback.result_code,
        receipt.as_deref(),
        &raw,
    )
    .await
    {
        Ok(true) => {
            tracing::info!(
                transaction_id = %tx.id,
                status = tx.status.as_str(),
                "transaction reached terminal status"
            );
        }
        Ok(false) => {
            tracing::warn!(
                transaction_id = %tx.id,
                "terminal write raced with another callback; keeping first result"
            );
        }
        Err(e) => {
            tracing::error!("terminal status write failed: {}", e);
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(CallbackAck {
                    result_code: 1,
                    result_desc: "Internal error".to_string(),
                }),
            );
        }
    }

    accepted
}
