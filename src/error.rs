use crate::models::ChainFamily;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Closed set of failure kinds reported to callers.
///
/// Wire names stay compatible with the codes existing clients already switch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    #[serde(rename = "TRANSACTION_NOT_FOUND")]
    TransactionNotFound,
    #[serde(rename = "TRANSACTION_FAILED")]
    TransactionFailed,
    #[serde(rename = "INVALID_TRANSACTION_HASH")]
    InvalidTransactionHash,
    #[serde(rename = "INVALID_NETWORK_ID")]
    InvalidNetworkId,
    #[serde(rename = "UNSUPPORTED_CHAIN")]
    UnsupportedChain,
    #[serde(rename = "TO_ADDRESS_MISMATCH")]
    RecipientMismatch,
    #[serde(rename = "FROM_ADDRESS_MISMATCH")]
    SenderMismatch,
    #[serde(rename = "AMOUNT_MISMATCH")]
    AmountMismatch,
    #[serde(rename = "TIMESTAMP_TOO_OLD")]
    TimestampTooOld,
    #[serde(rename = "TOKEN_MISMATCH")]
    TokenMismatch,
    #[serde(rename = "SWAP_VALIDATION_FAILED")]
    SwapValidationFailed,
    #[serde(rename = "SAFE_TRANSACTION_NOT_FOUND")]
    ProposalNotExecuted,
    #[serde(rename = "NETWORK_ERROR")]
    NetworkError,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::TransactionNotFound => "TRANSACTION_NOT_FOUND",
            ErrorCode::TransactionFailed => "TRANSACTION_FAILED",
            ErrorCode::InvalidTransactionHash => "INVALID_TRANSACTION_HASH",
            ErrorCode::InvalidNetworkId => "INVALID_NETWORK_ID",
            ErrorCode::UnsupportedChain => "UNSUPPORTED_CHAIN",
            ErrorCode::RecipientMismatch => "TO_ADDRESS_MISMATCH",
            ErrorCode::SenderMismatch => "FROM_ADDRESS_MISMATCH",
            ErrorCode::AmountMismatch => "AMOUNT_MISMATCH",
            ErrorCode::TimestampTooOld => "TIMESTAMP_TOO_OLD",
            ErrorCode::TokenMismatch => "TOKEN_MISMATCH",
            ErrorCode::SwapValidationFailed => "SWAP_VALIDATION_FAILED",
            ErrorCode::ProposalNotExecuted => "SAFE_TRANSACTION_NOT_FOUND",
            ErrorCode::NetworkError => "NETWORK_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum VerifierError {
    #[error("Transaction not found: {hash}")]
    TransactionNotFound { hash: String, network_id: u64 },

    #[error("Transaction failed on chain: {hash}")]
    TransactionFailed { hash: String, network_id: u64 },

    #[error("Invalid transaction hash format: {0}")]
    InvalidTransactionHash(String),

    #[error("Unsupported network ID: {0}")]
    InvalidNetworkId(u64),

    #[error("No RPC endpoint configured for network {0}")]
    MissingEndpoint(u64),

    #[error("No reader registered for chain family {0}")]
    UnsupportedChain(ChainFamily),

    #[error("Transaction recipient {actual} does not match expected address {expected}")]
    RecipientMismatch {
        hash: String,
        expected: String,
        actual: String,
    },

    #[error("No {asset_kind} transfer to {recipient} found in transaction {hash}")]
    NoMatchingTransfer {
        hash: String,
        recipient: String,
        asset_kind: &'static str,
    },

    #[error("Transaction sender {actual} does not match expected address {expected}")]
    SenderMismatch {
        hash: String,
        expected: String,
        actual: String,
    },

    #[error("Transaction amount {actual} does not match expected amount {expected}")]
    AmountMismatch {
        hash: String,
        expected: f64,
        actual: f64,
        delta: f64,
    },

    #[error("Transaction timestamp {actual} is too old compared to expected timestamp {expected}")]
    TimestampTooOld {
        hash: String,
        expected: i64,
        actual: i64,
        threshold: i64,
    },

    #[error("Token mismatch: {reason}")]
    TokenMismatch { hash: String, reason: String },

    #[error("Swap transaction {hash} does not transfer to {recipient}")]
    SwapValidationFailed { hash: String, recipient: String },

    #[error("Safe transaction {proposal_hash} has not been executed yet")]
    ProposalNotExecuted {
        proposal_hash: String,
        network_id: u64,
    },

    #[error("RPC error: {0}")]
    Rpc(#[from] ethers::providers::ProviderError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl VerifierError {
    pub fn code(&self) -> ErrorCode {
        match self {
            VerifierError::TransactionNotFound { .. } => ErrorCode::TransactionNotFound,
            VerifierError::TransactionFailed { .. } => ErrorCode::TransactionFailed,
            VerifierError::InvalidTransactionHash(_) => ErrorCode::InvalidTransactionHash,
            VerifierError::InvalidNetworkId(_) | VerifierError::MissingEndpoint(_) => {
                ErrorCode::InvalidNetworkId
            }
            VerifierError::UnsupportedChain(_) => ErrorCode::UnsupportedChain,
            VerifierError::RecipientMismatch { .. } | VerifierError::NoMatchingTransfer { .. } => {
                ErrorCode::RecipientMismatch
            }
            VerifierError::SenderMismatch { .. } => ErrorCode::SenderMismatch,
            VerifierError::AmountMismatch { .. } => ErrorCode::AmountMismatch,
            VerifierError::TimestampTooOld { .. } => ErrorCode::TimestampTooOld,
            VerifierError::TokenMismatch { .. } => ErrorCode::TokenMismatch,
            VerifierError::SwapValidationFailed { .. } => ErrorCode::SwapValidationFailed,
            VerifierError::ProposalNotExecuted { .. } => ErrorCode::ProposalNotExecuted,
            VerifierError::Rpc(_)
            | VerifierError::Http(_)
            | VerifierError::Network(_)
            | VerifierError::Config(_) => ErrorCode::NetworkError,
        }
    }

    /// Structured diagnostics attached to a rejected verification.
    pub fn details(&self) -> Option<serde_json::Value> {
        let details = match self {
            VerifierError::TransactionNotFound { hash, network_id }
            | VerifierError::TransactionFailed { hash, network_id } => {
                json!({ "txHash": hash, "networkId": network_id })
            }
            VerifierError::InvalidTransactionHash(hash) => json!({ "txHash": hash }),
            VerifierError::InvalidNetworkId(network_id)
            | VerifierError::MissingEndpoint(network_id) => json!({ "networkId": network_id }),
            VerifierError::UnsupportedChain(family) => json!({ "chainType": family }),
            VerifierError::RecipientMismatch { hash, expected, actual }
            | VerifierError::SenderMismatch { hash, expected, actual } => {
                json!({ "txHash": hash, "expected": expected, "actual": actual })
            }
            VerifierError::NoMatchingTransfer { hash, recipient, asset_kind } => {
                json!({ "txHash": hash, "expectedTo": recipient, "expectedTokenType": asset_kind })
            }
            VerifierError::AmountMismatch { hash, expected, actual, delta } => {
                json!({ "txHash": hash, "expected": expected, "actual": actual, "delta": delta })
            }
            VerifierError::TimestampTooOld { hash, expected, actual, threshold } => json!({
                "txHash": hash,
                "transactionTimestamp": actual,
                "donationTimestamp": expected,
                "threshold": threshold,
            }),
            VerifierError::TokenMismatch { hash, .. } => json!({ "txHash": hash }),
            VerifierError::SwapValidationFailed { hash, recipient } => {
                json!({ "txHash": hash, "expectedTo": recipient })
            }
            VerifierError::ProposalNotExecuted { proposal_hash, network_id } => {
                json!({ "safeTxHash": proposal_hash, "networkId": network_id })
            }
            VerifierError::Rpc(_)
            | VerifierError::Http(_)
            | VerifierError::Network(_)
            | VerifierError::Config(_) => return None,
        };
        Some(details)
    }
}

pub type Result<T> = std::result::Result<T, VerifierError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BatchError {
    #[error("Batch must contain at least one transaction")]
    Empty,

    #[error("Batch of {size} transactions exceeds the limit of {max}")]
    TooLarge { size: usize, max: usize },
}

/// Errors surfaced by the HTTP layer.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Chain not found: {0}")]
    ChainNotFound(u64),

    #[error("Endpoint not found")]
    RouteNotFound,

    #[error(transparent)]
    Batch(#[from] BatchError),

    #[error(transparent)]
    Verifier(#[from] VerifierError),
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub error_code: String,
    pub timestamp: chrono::DateTime<Utc>,
    pub request_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let request_id = Uuid::new_v4().to_string();

        let (status, error_code, details) = match &self {
            ApiError::Validation(_) | ApiError::Batch(_) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", None)
            }
            ApiError::ChainNotFound(_) => (StatusCode::NOT_FOUND, "CHAIN_NOT_FOUND", None),
            ApiError::RouteNotFound => (StatusCode::NOT_FOUND, "NOT_FOUND", None),
            ApiError::Verifier(err) if err.code() == ErrorCode::NetworkError => {
                (StatusCode::BAD_GATEWAY, ErrorCode::NetworkError.as_str(), None)
            }
            ApiError::Verifier(err) => {
                (StatusCode::BAD_REQUEST, err.code().as_str(), err.details())
            }
        };

        let body = ErrorResponse {
            success: false,
            error: self.to_string(),
            error_code: error_code.to_string(),
            timestamp: Utc::now(),
            request_id,
            details,
        };

        tracing::error!(
            error = ?self,
            error_code = error_code,
            "Request failed"
        );

        (status, Json(body)).into_response()
    }
}
