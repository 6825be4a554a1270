//! # neon_pay_backend
//!
//! JSON API behind the Neon Pay checkout: bKash tokenized checkout
//! (grant, create, execute), a Nagad placeholder, and an append-only
//! ledger of reported payment outcomes.
//!
//! | Route                      | Handler                                      |
//! |----------------------------|----------------------------------------------|
//! | `POST /api/bkash/token`    | [`bkash_handler::token_handler`]             |
//! | `POST /api/bkash/create`   | [`bkash_handler::create_handler`]            |
//! | `POST /api/bkash/execute`  | [`bkash_handler::execute_handler`]           |
//! | `POST /api/nagad/:action`  | [`nagad_handler::nagad_placeholder_handler`] |
//! | `POST /api/payment/record` | [`ledger::record_payment_handler`]           |
//! | `GET  /api/health`         | [`health_handler`]                           |
//!
//! [`intent`] and [`invoice`] hold the client-side half of the flow: the
//! form validation, invoice id generation and saved intent.

pub mod bkash_client;
pub mod bkash_handler;
pub mod config;
pub mod error;
pub mod intent;
pub mod invoice;
pub mod ledger;
pub mod nagad_handler;
pub mod token_cache;

use axum::{
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::bkash_client::{BkashClient, GatewayError};
use crate::config::{AppConfig, BkashConfig};
use crate::ledger::{Ledger, LedgerError};
use crate::token_cache::TokenCache;

/// Shared handler state. Cloning is cheap; the token cache and ledger lock
/// are behind `Arc`s.
#[derive(Clone)]
pub struct AppState {
    pub bkash: BkashClient,
    pub ledger: Ledger,
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("could not build bKash client: {0}")]
    Gateway(#[from] GatewayError),
    #[error("could not open ledger: {0}")]
    Ledger(#[from] LedgerError),
}

impl AppState {
    pub async fn from_config(config: &AppConfig) -> Result<Self, StartupError> {
        Self::build(config.bkash.clone(), TokenCache::new(), &config.payments_file).await
    }

    /// Assemble state from parts. Tests use this to inject a pre-seeded
    /// token cache and a temporary ledger.
    pub async fn build(
        bkash: BkashConfig,
        tokens: TokenCache,
        payments_file: impl Into<std::path::PathBuf>,
    ) -> Result<Self, StartupError> {
        Ok(Self {
            bkash: BkashClient::new(bkash, tokens)?,
            ledger: Ledger::open(payments_file).await?,
        })
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
}

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK",
        timestamp: Utc::now(),
    })
}

pub fn app(state: AppState) -> Router {
    let bkash_router = Router::new()
        .route("/token", post(bkash_handler::token_handler))
        .route("/create", post(bkash_handler::create_handler))
        .route("/execute", post(bkash_handler::execute_handler));

    let nagad_router =
        Router::new().route("/:action", post(nagad_handler::nagad_placeholder_handler));

    let api = Router::new()
        .nest("/bkash", bkash_router)
        .nest("/nagad", nagad_router)
        .route("/payment/record", post(ledger::record_payment_handler))
        .route("/health", get(health_handler));

    Router::new()
        .nest("/api", api)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
