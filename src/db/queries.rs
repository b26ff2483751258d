//! Postgres implementations of the data-access ports plus transaction
//! queries used by the payment and callback handlers.

use crate::config::profiles::MpesaEnvironment;
use crate::db::models::{CredentialRow, TransactionRow};
use crate::domain::credentials::CredentialRecord;
use crate::domain::transaction::{PaymentTransaction, TransactionStatus};
use crate::ports::{CredentialStore, EnablementStore, StoreError};
use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

/// Store backed by the `mpesa_credentials` and `bar_profiles` tables.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    environment: MpesaEnvironment,
}

impl PgStore {
    pub fn new(pool: PgPool, environment: MpesaEnvironment) -> Self {
        Self { pool, environment }
    }
}

#[async_trait]
impl EnablementStore for PgStore {
    async fn credentials_flag(&self, tenant_id: Uuid) -> Result<Option<bool>, StoreError> {
        let flag: Option<bool> = sqlx::query_scalar(
            "SELECT is_active FROM mpesa_credentials
             WHERE tenant_id = $1 AND environment = $2
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(tenant_id)
        .bind(self.environment.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(flag)
    }

    async fn profile_flag(&self, tenant_id: Uuid) -> Result<bool, StoreError> {
        let flag: Option<bool> =
            sqlx::query_scalar("SELECT mpesa_enabled FROM bar_profiles WHERE tenant_id = $1")
                .bind(tenant_id)
                .fetch_optional(&self.pool)
                .await?;
        flag.ok_or(StoreError::TenantNotFound(tenant_id))
    }

    async fn set_credentials_flag(&self, tenant_id: Uuid, active: bool) -> Result<(), StoreError> {
        // Only the most recent row carries the flag; rows deactivated by
        // rotation must never be reactivated, and touching them would
        // collide with the partial unique index on active rows.
        let result = sqlx::query(
            "UPDATE mpesa_credentials SET is_active = $1, updated_at = NOW()
             WHERE id = (SELECT id FROM mpesa_credentials
                         WHERE tenant_id = $2 AND environment = $3
                         ORDER BY created_at DESC LIMIT 1)",
        )
        .bind(active)
        .bind(tenant_id)
        .bind(self.environment.as_str())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Other(format!(
                "no {} credentials row for tenant {}",
                self.environment.as_str(),
                tenant_id
            )));
        }
        Ok(())
    }

    async fn set_profile_flag(&self, tenant_id: Uuid, enabled: bool) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE bar_profiles SET mpesa_enabled = $1, updated_at = NOW()
             WHERE tenant_id = $2",
        )
        .bind(enabled)
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::TenantNotFound(tenant_id));
        }
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn active_credentials(
        &self,
        tenant_id: Uuid,
        environment: MpesaEnvironment,
    ) -> Result<Option<CredentialRecord>, StoreError> {
        let row: Option<CredentialRow> = sqlx::query_as(
            "SELECT * FROM mpesa_credentials
             WHERE tenant_id = $1 AND environment = $2 AND is_active = TRUE
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(tenant_id)
        .bind(environment.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_domain().map_err(StoreError::Other))
            .transpose()
    }

    async fn save_credentials(&self, record: &CredentialRecord) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        // Rotation deactivates rather than deletes; the old row stays for
        // audit.
        sqlx::query(
            "UPDATE mpesa_credentials SET is_active = FALSE, updated_at = NOW()
             WHERE tenant_id = $1 AND environment = $2 AND is_active = TRUE",
        )
        .bind(record.tenant_id)
        .bind(record.environment.as_str())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO mpesa_credentials
             (id, tenant_id, environment, business_short_code, consumer_key_enc,
              consumer_secret_enc, passkey_enc, callback_url, key_version,
              is_active, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(record.id)
        .bind(record.tenant_id)
        .bind(record.environment.as_str())
        .bind(&record.business_short_code)
        .bind(&record.consumer_key_enc)
        .bind(&record.consumer_secret_enc)
        .bind(&record.passkey_enc)
        .bind(&record.callback_url)
        .bind(record.key_version)
        .bind(record.is_active)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

pub async fn insert_transaction(
    pool: &PgPool,
    tx: &PaymentTransaction,
) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO payment_transactions
         (id, tenant_id, order_id, phone, amount, currency, status,
          merchant_request_id, checkout_request_id, receipt_number,
          result_code, raw_callback, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
    )
    .bind(tx.id)
    .bind(tx.tenant_id)
    .bind(tx.order_id)
    .bind(tx.phone.as_str())
    .bind(&tx.amount)
    .bind(&tx.currency)
    .bind(tx.status.as_str())
    .bind(&tx.merchant_request_id)
    .bind(&tx.checkout_request_id)
    .bind(&tx.receipt_number)
    .bind(tx.result_code)
    .bind(&tx.raw_callback)
    .bind(tx.created_at)
    .bind(tx.updated_at)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_transaction(pool: &PgPool, id: Uuid) -> sqlx::Result<Option<TransactionRow>> {
    sqlx::query_as("SELECT * FROM payment_transactions WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_checkout_request(
    pool: &PgPool,
    checkout_request_id: &str,
) -> sqlx::Result<Option<TransactionRow>> {
    sqlx::query_as("SELECT * FROM payment_transactions WHERE checkout_request_id = $1")
        .bind(checkout_request_id)
        .fetch_optional(pool)
        .await
}

/// The single terminal write. The status guard in the WHERE clause makes a
/// replayed callback a no-op at the database level as well.
pub async fn apply_terminal_status(
    pool: &PgPool,
    id: Uuid,
    status: TransactionStatus,
    result_code: i32,
    receipt_number: Option<&str>,
    raw_callback: &serde_json::Value,
) -> sqlx::Result<bool> {
    let result = sqlx::query(
        "UPDATE payment_transactions
         SET status = $1, result_code = $2, receipt_number = $3,
             raw_callback = $4, updated_at = NOW()
         WHERE id = $5 AND status IN ('pending', 'sent')",
    )
    .bind(status.as_str())
    .bind(result_code)
    .bind(receipt_number)
    .bind(raw_callback)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Terminal write for a push that never reached Daraja. The row has no
/// `checkout_request_id`, so no callback can ever resolve it.
pub async fn mark_transaction_failed(pool: &PgPool, id: Uuid) -> sqlx::Result<bool> {
    let result = sqlx::query(
        "UPDATE payment_transactions
         SET status = 'failed', updated_at = NOW()
         WHERE id = $1 AND status = 'pending'",
    )
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

pub async fn mark_transaction_sent(
    pool: &PgPool,
    id: Uuid,
    merchant_request_id: &str,
    checkout_request_id: &str,
) -> sqlx::Result<bool> {
    let result = sqlx::query(
        "UPDATE payment_transactions
         SET status = 'sent', merchant_request_id = $1, checkout_request_id = $2,
             updated_at = NOW()
         WHERE id = $3 AND status = 'pending'",
    )
    .bind(merchant_request_id)
    .bind(checkout_request_id)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}
