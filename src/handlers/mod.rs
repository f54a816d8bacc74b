pub mod chains;
pub mod health;
pub mod transaction;

pub use chains::*;
pub use health::*;
pub use transaction::*;

use crate::config::Environment;
use crate::error::ApiError;
use crate::models::NetworkTable;
use crate::services::{CacheService, PriceService, VerificationService};
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Instant;

#[derive(Clone)]
pub struct AppState {
    pub verifier: Arc<VerificationService>,
    pub prices: Arc<PriceService>,
    pub cache: Arc<CacheService>,
    pub networks: Arc<NetworkTable>,
    pub environment: Environment,
    pub redis_configured: bool,
    pub started_at: Instant,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        .route("/api/chains", get(list_chains))
        .route("/api/chains/:network_id", get(get_chain))
        .route(
            "/api/chains/:network_id/transaction-url/:tx_hash",
            get(transaction_url),
        )
        .route("/api/verify", post(verify_transaction))
        .route("/api/verify-batch", post(verify_batch))
        .route("/api/timestamp", post(transaction_timestamp))
        .route("/api/price", post(token_price))
        .fallback(route_not_found)
        .with_state(state)
}

async fn route_not_found() -> ApiError {
    ApiError::RouteNotFound
}
