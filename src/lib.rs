pub mod config;
pub mod crypto;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod mpesa;
pub mod phone;
pub mod ports;
pub mod services;
pub mod validation;

use crate::config::profiles::MpesaEnvironment;
use crate::crypto::CredentialCodec;
use crate::db::queries::PgStore;
use crate::mpesa::DarajaClient;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
    pub daraja: DarajaClient,
    pub codec: Arc<CredentialCodec>,
    pub environment: MpesaEnvironment,
    pub callback_base_url: String,
}

impl AppState {
    /// Postgres-backed store scoped to the process's Daraja environment.
    pub fn store(&self) -> PgStore {
        PgStore::new(self.db.clone(), self.environment)
    }
}

pub fn create_app(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/payments/stk", post(handlers::payment::initiate_payment))
        .route("/transactions/:id", get(handlers::payment::get_transaction))
        .route("/mpesa/callback", post(handlers::callback::handle_callback))
        .route(
            "/admin/tenants/:tenant_id/mpesa/credentials",
            post(handlers::credentials::save_credentials),
        )
        .route(
            "/admin/tenants/:tenant_id/mpesa/sync",
            get(handlers::sync::validate_sync),
        )
        .route(
            "/admin/tenants/:tenant_id/mpesa/repair",
            post(handlers::sync::repair_inconsistency),
        )
        .route(
            "/admin/tenants/:tenant_id/mpesa/status",
            post(handlers::sync::change_status),
        )
        .with_state(app_state)
}
