use bigdecimal::BigDecimal;
use chrono::{Duration, Utc};
use sqlx::PgPool;
use tabpay_core::config::profiles::MpesaEnvironment;
use tabpay_core::crypto::CredentialCodec;
use tabpay_core::db::queries::{self, PgStore};
use tabpay_core::domain::credentials::{CredentialRecord, NewCredentials};
use tabpay_core::domain::PaymentTransaction;
use tabpay_core::phone::CanonicalPhone;
use tabpay_core::ports::{CredentialStore, EnablementStore};
use uuid::Uuid;

async fn insert_tenant(pool: &PgPool) -> sqlx::Result<Uuid> {
    let tenant_id = Uuid::new_v4();
    sqlx::query("INSERT INTO bar_profiles (tenant_id, name) VALUES ($1, $2)")
        .bind(tenant_id)
        .bind("Test Bar")
        .execute(pool)
        .await?;
    Ok(tenant_id)
}

fn sealed_credentials(tenant_id: Uuid, codec: &CredentialCodec) -> CredentialRecord {
    NewCredentials {
        tenant_id,
        environment: MpesaEnvironment::Sandbox,
        business_short_code: "174379".to_string(),
        consumer_key: "key".to_string(),
        consumer_secret: "secret".to_string(),
        passkey: "passkey".to_string(),
        callback_url: "https://example.com/cb".to_string(),
    }
    .seal(codec)
    .expect("seal credentials")
}

#[sqlx::test]
async fn test_enable_after_rotation_targets_only_latest_row(pool: PgPool) -> sqlx::Result<()> {
    let tenant_id = insert_tenant(&pool).await?;
    let codec = CredentialCodec::new([7u8; 32]);
    let store = PgStore::new(pool.clone(), MpesaEnvironment::Sandbox);

    let mut first = sealed_credentials(tenant_id, &codec);
    first.created_at = Utc::now() - Duration::seconds(60);
    store.save_credentials(&first).await.expect("save first");

    // Rotation deactivates the first row and inserts a second one.
    let second = sealed_credentials(tenant_id, &codec);
    store.save_credentials(&second).await.expect("rotate");

    // Enabling after a rotation must not touch the deactivated row; doing
    // so would collide with mpesa_credentials_active_uniq.
    store
        .set_credentials_flag(tenant_id, true)
        .await
        .expect("enable after rotation");

    let active_count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM mpesa_credentials WHERE tenant_id = $1 AND is_active",
    )
    .bind(tenant_id)
    .fetch_one(&pool)
    .await?;
    assert_eq!(active_count, 1);

    let active = store
        .active_credentials(tenant_id, MpesaEnvironment::Sandbox)
        .await
        .expect("fetch active")
        .expect("an active row");
    assert_eq!(active.id, second.id);

    Ok(())
}

#[sqlx::test]
async fn test_disable_then_reenable_round_trips(pool: PgPool) -> sqlx::Result<()> {
    let tenant_id = insert_tenant(&pool).await?;
    let codec = CredentialCodec::new([7u8; 32]);
    let store = PgStore::new(pool.clone(), MpesaEnvironment::Sandbox);

    let mut first = sealed_credentials(tenant_id, &codec);
    first.created_at = Utc::now() - Duration::seconds(60);
    store.save_credentials(&first).await.expect("save first");
    let second = sealed_credentials(tenant_id, &codec);
    store.save_credentials(&second).await.expect("rotate");

    store
        .set_credentials_flag(tenant_id, false)
        .await
        .expect("disable");
    assert_eq!(
        store.credentials_flag(tenant_id).await.expect("flag"),
        Some(false)
    );

    store
        .set_credentials_flag(tenant_id, true)
        .await
        .expect("re-enable");
    assert_eq!(
        store.credentials_flag(tenant_id).await.expect("flag"),
        Some(true)
    );

    // The rotated-away row stays inactive through the round trip.
    let first_active: bool =
        sqlx::query_scalar("SELECT is_active FROM mpesa_credentials WHERE id = $1")
            .bind(first.id)
            .fetch_one(&pool)
            .await?;
    assert!(!first_active);

    Ok(())
}

#[sqlx::test]
async fn test_mark_transaction_failed_closes_pending_row(pool: PgPool) -> sqlx::Result<()> {
    let tenant_id = insert_tenant(&pool).await?;
    let phone = CanonicalPhone::parse("254712345678").expect("canonical phone");
    let tx = PaymentTransaction::new(tenant_id, Uuid::new_v4(), phone, BigDecimal::from(150));
    queries::insert_transaction(&pool, &tx).await?;

    assert!(queries::mark_transaction_failed(&pool, tx.id).await?);

    let row = queries::get_transaction(&pool, tx.id)
        .await?
        .expect("transaction row");
    let stored = row.into_domain().expect("domain transaction");
    assert_eq!(stored.status.as_str(), "failed");

    // Already terminal; a second attempt is a no-op.
    assert!(!queries::mark_transaction_failed(&pool, tx.id).await?);

    Ok(())
}

#[sqlx::test]
async fn test_mark_transaction_failed_leaves_sent_rows_alone(pool: PgPool) -> sqlx::Result<()> {
    let tenant_id = insert_tenant(&pool).await?;
    let phone = CanonicalPhone::parse("254712345678").expect("canonical phone");
    let tx = PaymentTransaction::new(tenant_id, Uuid::new_v4(), phone, BigDecimal::from(150));
    queries::insert_transaction(&pool, &tx).await?;
    assert!(queries::mark_transaction_sent(&pool, tx.id, "mri-1", "cri-1").await?);

    // Once the push reached Daraja the callback owns the terminal write.
    assert!(!queries::mark_transaction_failed(&pool, tx.id).await?);

    let row = queries::get_transaction(&pool, tx.id)
        .await?
        .expect("transaction row");
    assert_eq!(row.into_domain().expect("domain transaction").status.as_str(), "sent");

    Ok(())
}
