use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;

use crate::billing::engine::InvoiceEngine;
use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use crate::repository::postgres::{
    PgInvoiceStore, PgLeaseRepository, PgOrganizationRegistry,
};
use crate::services::notifier::QueueNotificationDispatcher;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub db_pool: Option<PgPool>,
    pub http_client: reqwest::Client,
}

impl AppState {
    pub fn build(config: AppConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let db_pool = crate::db::build_pool(&config);
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self {
            config,
            db_pool,
            http_client,
        })
    }
}

pub fn db_pool(state: &AppState) -> AppResult<&PgPool> {
    state.db_pool.as_ref().ok_or_else(|| {
        AppError::Dependency("Database is not configured. Set DATABASE_URL.".to_string())
    })
}

/// Composition root for the billing engine: Postgres adapters for the
/// collaborator traits, plus the queue-backed dispatcher. Adapters only hold
/// pool clones, so building one per call is cheap.
pub fn billing_engine(state: &AppState) -> AppResult<InvoiceEngine> {
    let pool = db_pool(state)?.clone();
    Ok(InvoiceEngine::new(
        Arc::new(PgLeaseRepository::new(pool.clone())),
        Arc::new(PgInvoiceStore::new(pool.clone())),
        Arc::new(PgOrganizationRegistry::new(pool.clone())),
        Arc::new(QueueNotificationDispatcher::new(
            pool,
            state.http_client.clone(),
            state.config.invoice_webhook_url.clone(),
            state.config.app_public_url.clone(),
        )),
        state.config.billing_tax_rate,
    ))
}
