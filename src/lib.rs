pub mod adapters;
pub mod cli;
pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod handlers;
pub mod ports;
pub mod services;
pub mod validation;
pub mod workflow;

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::adapters::{
    InMemoryAccountStore, InMemoryTransactionLedger, PostgresAccountStore, PostgresTransactionLedger,
};
use crate::config::StoreBackend;
use crate::services::AccountService;
use crate::workflow::{EventPublisher, TransferDelegate};

#[derive(Clone)]
pub struct AppState {
    pub service: AccountService,
    pub delegate: TransferDelegate,
    pub store_backend: StoreBackend,
}

impl AppState {
    pub fn new(service: AccountService, events: EventPublisher, store_backend: StoreBackend) -> Self {
        Self {
            delegate: TransferDelegate::new(service.clone(), events),
            service,
            store_backend,
        }
    }

    /// State over process-local storage. Balances do not survive a restart.
    pub fn in_memory(events: EventPublisher) -> Self {
        let service = AccountService::new(
            Arc::new(InMemoryAccountStore::new()),
            Arc::new(InMemoryTransactionLedger::new()),
        );
        Self::new(service, events, StoreBackend::Memory)
    }

    pub fn postgres(pool: sqlx::PgPool, events: EventPublisher) -> Self {
        let service = AccountService::new(
            Arc::new(PostgresAccountStore::new(pool.clone())),
            Arc::new(PostgresTransactionLedger::new(pool)),
        );
        Self::new(service, events, StoreBackend::Postgres)
    }
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/delegates/:action", post(handlers::delegates::invoke))
        .route("/transactions/:transaction_id", get(handlers::transactions::get_transaction))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
