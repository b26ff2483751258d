//! Row types for the three core tables. Status and environment columns are
//! stored as text and converted at the domain boundary.

use crate::config::profiles::MpesaEnvironment;
use crate::domain::credentials::CredentialRecord;
use crate::domain::transaction::{PaymentTransaction, TransactionStatus};
use crate::phone::CanonicalPhone;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct CredentialRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub environment: String,
    pub business_short_code: String,
    pub consumer_key_enc: String,
    pub consumer_secret_enc: String,
    pub passkey_enc: String,
    pub callback_url: String,
    pub key_version: i16,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CredentialRow {
    pub fn into_domain(self) -> Result<CredentialRecord, String> {
        let environment: MpesaEnvironment = self.environment.parse()?;
        Ok(CredentialRecord {
            id: self.id,
            tenant_id: self.tenant_id,
            environment,
            business_short_code: self.business_short_code,
            consumer_key_enc: self.consumer_key_enc,
            consumer_secret_enc: self.consumer_secret_enc,
            passkey_enc: self.passkey_enc,
            callback_url: self.callback_url,
            key_version: self.key_version,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct TransactionRow {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub order_id: Uuid,
    pub phone: String,
    pub amount: BigDecimal,
    pub currency: String,
    pub status: String,
    pub merchant_request_id: Option<String>,
    pub checkout_request_id: Option<String>,
    pub receipt_number: Option<String>,
    pub result_code: Option<i32>,
    pub raw_callback: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TransactionRow {
    pub fn into_domain(self) -> Result<PaymentTransaction, String> {
        let status: TransactionStatus = self.status.parse()?;
        let phone = CanonicalPhone::parse(&self.phone)
            .map_err(|e| format!("stored phone is not canonical: {}", e))?;
        Ok(PaymentTransaction {
            id: self.id,
            tenant_id: self.tenant_id,
            order_id: self.order_id,
            phone,
            amount: self.amount,
            currency: self.currency,
            status,
            merchant_request_id: self.merchant_request_id,
            checkout_request_id: self.checkout_request_id,
            receipt_number: self.receipt_number,
            result_code: self.result_code,
            raw_callback: self.raw_callback,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}
