//! Sync-manager scenarios against an in-memory store, including write
//! ordering and call-count guarantees for the dual-flag update path.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tabpay_core::ports::{EnablementStore, StoreError};
use tabpay_core::services::sync_manager::RepairStrategy;
use tabpay_core::services::SyncManager;
use uuid::Uuid;

#[derive(Default)]
struct MockStore {
    credentials_flag: Mutex<Option<bool>>,
    profile_flag: Mutex<bool>,
    fail_credentials_write: bool,
    fail_profile_write: bool,
    credentials_writes: AtomicUsize,
    profile_writes: AtomicUsize,
}

impl MockStore {
    fn with_flags(credentials: Option<bool>, profile: bool) -> Self {
        Self {
            credentials_flag: Mutex::new(credentials),
            profile_flag: Mutex::new(profile),
            ..Default::default()
        }
    }
}

#[async_trait]
impl EnablementStore for &MockStore {
    async fn credentials_flag(&self, _tenant_id: Uuid) -> Result<Option<bool>, StoreError> {
        Ok(*self.credentials_flag.lock().unwrap())
    }

    async fn profile_flag(&self, _tenant_id: Uuid) -> Result<bool, StoreError> {
        Ok(*self.profile_flag.lock().unwrap())
    }

    async fn set_credentials_flag(&self, _tenant_id: Uuid, active: bool) -> Result<(), StoreError> {
        self.credentials_writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_credentials_write {
            return Err(StoreError::Other("credentials write refused".to_string()));
        }
        *self.credentials_flag.lock().unwrap() = Some(active);
        Ok(())
    }

    async fn set_profile_flag(&self, _tenant_id: Uuid, enabled: bool) -> Result<(), StoreError> {
        self.profile_writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_profile_write {
            return Err(StoreError::Other("profile write refused".to_string()));
        }
        *self.profile_flag.lock().unwrap() = enabled;
        Ok(())
    }
}

#[tokio::test]
async fn validate_reports_consistent_flags() {
    let store = MockStore::with_flags(Some(true), true);
    let manager = SyncManager::new(&store);

    let validation = manager.validate_sync(Uuid::new_v4()).await;
    assert!(validation.is_consistent);
    assert!(validation.credentials_active);
    assert!(validation.credentials_configured);
    assert!(validation.bar_enabled);
    assert!(validation.error.is_none());
}

#[tokio::test]
async fn validate_treats_missing_credentials_as_disabled() {
    let store = MockStore::with_flags(None, false);
    let manager = SyncManager::new(&store);

    let validation = manager.validate_sync(Uuid::new_v4()).await;
    assert!(validation.is_consistent);
    assert!(!validation.credentials_active);
    assert!(!validation.credentials_configured);
    assert!(validation.error.is_none());
}

#[tokio::test]
async fn validate_detects_divergence() {
    let store = MockStore::with_flags(Some(true), false);
    let manager = SyncManager::new(&store);

    let validation = manager.validate_sync(Uuid::new_v4()).await;
    assert!(!validation.is_consistent);
    assert!(validation.credentials_active);
    assert!(!validation.bar_enabled);
}

#[tokio::test]
async fn repair_overwrites_profile_from_credentials() {
    let store = MockStore::with_flags(Some(true), false);
    let manager = SyncManager::new(&store);

    let outcome = manager.repair_inconsistency(Uuid::new_v4()).await;
    assert!(outcome.repaired);
    assert_eq!(outcome.previous_bar_status, Some(false));
    assert_eq!(outcome.new_bar_status, Some(true));
    assert!(outcome.error.is_none());

    assert_eq!(*store.profile_flag.lock().unwrap(), true);
    // Credentials are authoritative; the credentials flag is never touched.
    assert_eq!(store.credentials_writes.load(Ordering::SeqCst), 0);
    assert_eq!(store.profile_writes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn repair_is_idempotent_on_consistent_tenant() {
    let store = MockStore::with_flags(Some(false), false);
    let manager = SyncManager::new(&store);
    let tenant = Uuid::new_v4();

    let first = manager.repair_inconsistency(tenant).await;
    let second = manager.repair_inconsistency(tenant).await;

    assert!(!first.repaired);
    assert!(!second.repaired);
    assert!(first.error.is_none());
    assert!(second.error.is_none());
    assert_eq!(store.profile_writes.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn repair_with_profile_authoritative_writes_credentials() {
    let store = MockStore::with_flags(Some(true), false);
    let manager = SyncManager::with_strategy(&store, RepairStrategy::ProfileIsAuthoritative);

    let outcome = manager.repair_inconsistency(Uuid::new_v4()).await;
    assert!(outcome.repaired);
    assert_eq!(*store.credentials_flag.lock().unwrap(), Some(false));
    assert_eq!(store.profile_writes.load(Ordering::SeqCst), 0);
    assert_eq!(store.credentials_writes.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn status_change_updates_both_flags_in_order() {
    let store = MockStore::with_flags(Some(false), false);
    let manager = SyncManager::new(&store);

    let outcome = manager.sync_mpesa_status(Uuid::new_v4(), true).await;
    assert!(outcome.success);
    assert!(outcome.credentials_updated);
    assert!(outcome.bar_status_updated);
    assert!(outcome.error.is_none());

    assert_eq!(*store.credentials_flag.lock().unwrap(), Some(true));
    assert_eq!(*store.profile_flag.lock().unwrap(), true);
}

#[tokio::test]
async fn status_change_aborts_when_credentials_write_fails() {
    let store = MockStore {
        fail_credentials_write: true,
        ..MockStore::with_flags(Some(false), false)
    };
    let manager = SyncManager::new(&store);

    let outcome = manager.sync_mpesa_status(Uuid::new_v4(), true).await;
    assert!(!outcome.success);
    assert!(!outcome.credentials_updated);
    assert!(!outcome.bar_status_updated);
    assert!(outcome.error.is_some());

    // The profile write must never be attempted after the first failure.
    assert_eq!(store.credentials_writes.load(Ordering::SeqCst), 1);
    assert_eq!(store.profile_writes.load(Ordering::SeqCst), 0);
    assert_eq!(*store.profile_flag.lock().unwrap(), false);
}

#[tokio::test]
async fn status_change_reports_partial_success_when_profile_write_fails() {
    let store = MockStore {
        fail_profile_write: true,
        ..MockStore::with_flags(Some(false), false)
    };
    let manager = SyncManager::new(&store);
    let tenant = Uuid::new_v4();

    let outcome = manager.sync_mpesa_status(tenant, true).await;
    assert!(!outcome.success);
    assert!(outcome.credentials_updated);
    assert!(!outcome.bar_status_updated);
    assert!(outcome.error.is_some());

    // The credentials flag is committed, leaving a detectable divergence.
    let validation = manager.validate_sync(tenant).await;
    assert!(!validation.is_consistent);
}

#[tokio::test]
async fn partial_failure_is_fixed_by_subsequent_repair() {
    let store = MockStore::with_flags(Some(true), false);
    let manager = SyncManager::new(&store);
    let tenant = Uuid::new_v4();

    let outcome = manager.repair_inconsistency(tenant).await;
    assert!(outcome.repaired);

    let validation = manager.validate_sync(tenant).await;
    assert!(validation.is_consistent);
}
