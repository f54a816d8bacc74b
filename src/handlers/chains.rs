use crate::error::ApiError;
use crate::handlers::AppState;
use crate::models::{ApiResponse, ChainInfo, ChainList, TransactionUrl};
use axum::{
    extract::{rejection::PathRejection, Path, State},
    Json,
};

pub async fn list_chains(State(state): State<AppState>) -> Json<ApiResponse<ChainList>> {
    let chains = state.networks.iter().map(ChainInfo::from).collect();
    Json(ApiResponse::new(ChainList { chains }))
}

pub async fn get_chain(
    State(state): State<AppState>,
    network_id: Result<Path<u64>, PathRejection>,
) -> Result<Json<ApiResponse<ChainInfo>>, ApiError> {
    let Path(network_id) = network_id.map_err(|e| ApiError::Validation(e.body_text()))?;

    let network = state
        .networks
        .get(network_id)
        .ok_or(ApiError::ChainNotFound(network_id))?;

    Ok(Json(ApiResponse::new(ChainInfo::from(network))))
}

pub async fn transaction_url(
    State(state): State<AppState>,
    params: Result<Path<(u64, String)>, PathRejection>,
) -> Result<Json<ApiResponse<TransactionUrl>>, ApiError> {
    let Path((network_id, tx_hash)) = params.map_err(|e| ApiError::Validation(e.body_text()))?;

    let network = state
        .networks
        .get(network_id)
        .ok_or(ApiError::ChainNotFound(network_id))?;
    let explorer = network.block_explorer_url.as_deref().ok_or_else(|| {
        ApiError::Validation(format!("No block explorer for network {}", network_id))
    })?;

    Ok(Json(ApiResponse::new(TransactionUrl {
        url: format!("{}/tx/{}", explorer.trim_end_matches('/'), tx_hash),
    })))
}
