use crate::error::ErrorCode;
use crate::models::{
    ChainFamily, NativeCurrency, NetworkConfig, TransactionExpectation, TransactionStatus,
    VerificationResult,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Serialize, Deserialize, Debug)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    pub timestamp: DateTime<Utc>,
    pub request_id: String,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
            timestamp: Utc::now(),
            request_id: Uuid::new_v4().to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct HealthStatus {
    pub status: String,
    pub version: String,
    pub environment: String,
    pub redis: bool,
    pub uptime_seconds: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChainInfo {
    pub id: u64,
    pub name: String,
    pub chain_type: ChainFamily,
    pub native_currency: NativeCurrency,
    pub block_explorer_url: String,
    pub is_active: bool,
}

impl From<&NetworkConfig> for ChainInfo {
    fn from(network: &NetworkConfig) -> Self {
        Self {
            id: network.id,
            name: network.name.clone(),
            chain_type: network.family,
            native_currency: network.native_currency.clone(),
            block_explorer_url: network.block_explorer_url.clone().unwrap_or_default(),
            is_active: true,
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ChainList {
    pub chains: Vec<ChainInfo>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct TransactionUrl {
    pub url: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionSummary {
    pub hash: String,
    pub from: String,
    pub to: String,
    pub amount: f64,
    pub timestamp: i64,
}

/// External shape of a single verification outcome.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResponse {
    pub status: TransactionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<TransactionSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&VerificationResult> for VerificationResponse {
    fn from(result: &VerificationResult) -> Self {
        match result {
            VerificationResult::Verified(facts) => Self {
                status: facts.status,
                transaction: Some(TransactionSummary {
                    hash: facts.hash.clone(),
                    from: facts.from.clone(),
                    to: facts.to.clone(),
                    amount: facts.amount,
                    timestamp: facts.timestamp,
                }),
                error: None,
                error_code: None,
                details: None,
            },
            VerificationResult::Rejected(failure) => Self {
                status: TransactionStatus::Failed,
                transaction: None,
                error: Some(failure.message.clone()),
                error_code: Some(failure.code),
                details: failure.details.clone(),
            },
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
pub struct BatchVerifyRequest {
    pub transactions: Vec<TransactionExpectation>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct BatchVerificationResponse {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<VerificationResponse>,
}

impl BatchVerificationResponse {
    pub fn from_results(results: &[VerificationResult]) -> Self {
        let results: Vec<VerificationResponse> =
            results.iter().map(VerificationResponse::from).collect();
        let successful = results
            .iter()
            .filter(|r| r.status == TransactionStatus::Success)
            .count();

        Self {
            total: results.len(),
            successful,
            failed: results.len() - successful,
            results,
        }
    }
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TimestampRequest {
    pub tx_hash: String,
    pub network_id: u64,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TimestampResponse {
    pub tx_hash: String,
    pub network_id: u64,
    pub timestamp: i64,
    pub date: Option<DateTime<Utc>>,
}

#[derive(Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct PriceResponse {
    pub network_id: u64,
    pub symbol: String,
    pub token_address: Option<String>,
    pub price_usd: f64,
}
