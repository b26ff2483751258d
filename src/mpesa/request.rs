//! STK push request construction.
//!
//! Pure functions only: the same credentials, amount, phone and clock input
//! always produce the same request. All validation happens here, before any
//! network call is attempted.

use crate::domain::credentials::DecryptedCredentials;
use crate::phone::CanonicalPhone;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Separator between tenant and order id inside the account reference.
/// Chosen because it cannot appear in a UUID.
pub const REFERENCE_SEPARATOR: char = '#';

/// Upstream bound on the AccountReference field length.
pub const MAX_REFERENCE_LEN: usize = 24;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("amount must be strictly positive, got {0}")]
    NonPositiveAmount(String),
    #[error("account reference: {0}")]
    Reference(#[from] ReferenceError),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReferenceError {
    #[error("identifier contains the reference separator")]
    SeparatorInIdentifier,
    #[error("account reference exceeds {MAX_REFERENCE_LEN} characters ({0})")]
    TooLong(usize),
    #[error("malformed account reference: separator must appear exactly once")]
    Malformed,
}

/// Renders the Daraja signature timestamp, `YYYYMMDDHHMMSS` in East Africa
/// Time. EAT has no daylight saving, so the fixed +03:00 offset matches the
/// clock Daraja verifies passwords against year-round.
pub fn daraja_timestamp(now: DateTime<Utc>) -> String {
    let eat = FixedOffset::east_opt(3 * 3600).expect("valid fixed offset");
    now.with_timezone(&eat).format("%Y%m%d%H%M%S").to_string()
}

/// Daraja STK password: base64 of `shortcode + passkey + timestamp`.
pub fn stk_password(shortcode: &str, passkey: &str, timestamp: &str) -> String {
    BASE64.encode(format!("{}{}{}", shortcode, passkey, timestamp))
}

/// Joins tenant and order ids into the single AccountReference field the
/// upstream API carries through to the callback.
pub fn generate_account_reference(
    tenant_id: &str,
    order_id: &str,
) -> Result<String, ReferenceError> {
    if tenant_id.contains(REFERENCE_SEPARATOR) || order_id.contains(REFERENCE_SEPARATOR) {
        return Err(ReferenceError::SeparatorInIdentifier);
    }

    let reference = format!("{}{}{}", tenant_id, REFERENCE_SEPARATOR, order_id);
    if reference.len() > MAX_REFERENCE_LEN {
        return Err(ReferenceError::TooLong(reference.len()));
    }
    Ok(reference)
}

/// Exact inverse of [`generate_account_reference`].
pub fn parse_account_reference(reference: &str) -> Result<(String, String), ReferenceError> {
    let mut parts = reference.split(REFERENCE_SEPARATOR);
    match (parts.next(), parts.next(), parts.next()) {
        (Some(tenant), Some(order), None) => Ok((tenant.to_string(), order.to_string())),
        _ => Err(ReferenceError::Malformed),
    }
}

/// A fully-formed STK push payload, field names per the Daraja schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StkPushRequest {
    #[serde(rename = "BusinessShortCode")]
    pub business_short_code: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "TransactionType")]
    pub transaction_type: String,
    #[serde(rename = "Amount")]
    pub amount: String,
    #[serde(rename = "PartyA")]
    pub party_a: String,
    #[serde(rename = "PartyB")]
    pub party_b: String,
    #[serde(rename = "PhoneNumber")]
    pub phone_number: String,
    #[serde(rename = "CallBackURL")]
    pub callback_url: String,
    #[serde(rename = "AccountReference")]
    pub account_reference: String,
    #[serde(rename = "TransactionDesc")]
    pub transaction_desc: String,
}

impl StkPushRequest {
    /// Builds a push request. The phone must already be canonical; callers
    /// holding raw input normalize through [`crate::phone::validate`] first.
    pub fn build(
        credentials: &DecryptedCredentials,
        amount: &BigDecimal,
        phone: &CanonicalPhone,
        tenant_id: Uuid,
        order_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Self, RequestError> {
        if amount <= &BigDecimal::zero() {
            return Err(RequestError::NonPositiveAmount(amount.to_string()));
        }

        let timestamp = daraja_timestamp(now);
        let password = stk_password(
            &credentials.business_short_code,
            &credentials.passkey,
            &timestamp,
        );
        let account_reference = generate_account_reference(
            &short_id(tenant_id),
            &short_id(order_id),
        )?;

        Ok(Self {
            business_short_code: credentials.business_short_code.clone(),
            password,
            timestamp,
            transaction_type: "CustomerPayBillOnline".to_string(),
            amount: amount.normalized().to_string(),
            party_a: phone.as_str().to_string(),
            party_b: credentials.business_short_code.clone(),
            phone_number: phone.as_str().to_string(),
            callback_url: credentials.callback_url.clone(),
            account_reference,
            transaction_desc: "Tab payment".to_string(),
        })
    }
}

/// Compact id form used inside the bounded AccountReference field: the first
/// UUID group (8 hex chars) is enough to correlate within a tenant's recent
/// orders, and keeps `8 + 1 + 8` well under the upstream bound.
pub fn short_id(id: Uuid) -> String {
    id.simple().to_string()[..8].to_string()
}
