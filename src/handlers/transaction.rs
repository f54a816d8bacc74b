use crate::error::ApiError;
use crate::handlers::AppState;
use crate::models::{
    ApiResponse, BatchVerificationResponse, BatchVerifyRequest, PriceRequest, PriceResponse,
    TimestampRequest, TimestampResponse, TransactionExpectation, VerificationResponse,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use chrono::DateTime;

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(value)| value)
        .map_err(|e| ApiError::Validation(e.body_text()))
}

/// Rejects requests that could never be verified before any chain is queried.
pub fn validate_expectation(expectation: &TransactionExpectation) -> Result<(), ApiError> {
    if expectation.direct_hash().is_none() && expectation.proposal_hash().is_none() {
        return Err(ApiError::Validation(
            "Either txHash or safeTxHash is required".to_string(),
        ));
    }
    if expectation.symbol.trim().is_empty() {
        return Err(ApiError::Validation("symbol is required".to_string()));
    }
    if expectation.from_address.trim().is_empty() {
        return Err(ApiError::Validation("fromAddress is required".to_string()));
    }
    if expectation.to_address.trim().is_empty() {
        return Err(ApiError::Validation("toAddress is required".to_string()));
    }
    if !expectation.amount.is_finite() {
        return Err(ApiError::Validation("amount must be a number".to_string()));
    }
    Ok(())
}

pub async fn verify_transaction(
    State(state): State<AppState>,
    payload: Result<Json<TransactionExpectation>, JsonRejection>,
) -> Result<Json<ApiResponse<VerificationResponse>>, ApiError> {
    let expectation = body(payload)?;
    validate_expectation(&expectation)?;

    let result = state.verifier.verify(&expectation).await;
    Ok(Json(ApiResponse::new(VerificationResponse::from(&result))))
}

pub async fn verify_batch(
    State(state): State<AppState>,
    payload: Result<Json<BatchVerifyRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<BatchVerificationResponse>>, ApiError> {
    let request = body(payload)?;
    for (index, expectation) in request.transactions.iter().enumerate() {
        validate_expectation(expectation).map_err(|e| match e {
            ApiError::Validation(msg) => {
                ApiError::Validation(format!("transactions[{}]: {}", index, msg))
            }
            other => other,
        })?;
    }

    let results = state.verifier.verify_batch(&request.transactions).await?;
    Ok(Json(ApiResponse::new(BatchVerificationResponse::from_results(&results))))
}

pub async fn transaction_timestamp(
    State(state): State<AppState>,
    payload: Result<Json<TimestampRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<TimestampResponse>>, ApiError> {
    let request = body(payload)?;
    let tx_hash = request.tx_hash.trim();
    if tx_hash.is_empty() {
        return Err(ApiError::Validation("txHash is required".to_string()));
    }

    let timestamp = state.verifier.timestamp(tx_hash, request.network_id).await?;

    Ok(Json(ApiResponse::new(TimestampResponse {
        tx_hash: tx_hash.to_string(),
        network_id: request.network_id,
        timestamp,
        date: DateTime::from_timestamp(timestamp, 0),
    })))
}

pub async fn token_price(
    State(state): State<AppState>,
    payload: Result<Json<PriceRequest>, JsonRejection>,
) -> Result<Json<ApiResponse<PriceResponse>>, ApiError> {
    let request = body(payload)?;
    if request.symbol.trim().is_empty() {
        return Err(ApiError::Validation("symbol is required".to_string()));
    }

    let price_usd = state.prices.usd_price(&request).await;

    Ok(Json(ApiResponse::new(PriceResponse {
        network_id: request.network_id,
        token_address: request.token_address().map(str::to_string),
        symbol: request.symbol,
        price_usd,
    })))
}
