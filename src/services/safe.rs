use crate::error::{Result, VerifierError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

/// Resolves a Safe multisig proposal to the transaction that executed it.
#[async_trait]
pub trait SafeResolver: Send + Sync {
    /// `None` while the proposal has not been executed.
    async fn executed_transaction_hash(
        &self,
        proposal_hash: &str,
        network_id: u64,
    ) -> Result<Option<String>>;
}

fn service_slug(network_id: u64) -> Option<&'static str> {
    let slug = match network_id {
        1 => "mainnet",
        10 => "optimism",
        56 => "bsc",
        100 => "gnosis-chain",
        137 => "polygon",
        8453 => "base",
        42161 => "arbitrum",
        42220 => "celo",
        43114 => "avalanche",
        _ => return None,
    };
    Some(slug)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MultisigTransaction {
    transaction_hash: Option<String>,
    #[serde(default)]
    is_executed: bool,
}

/// Client for the public Safe Transaction Service.
pub struct SafeTransactionService {
    http: Client,
    base_url_override: Option<String>,
}

impl SafeTransactionService {
    pub fn new(http: Client, base_url_override: Option<String>) -> Self {
        Self {
            http,
            base_url_override: base_url_override.map(|url| url.trim_end_matches('/').to_string()),
        }
    }

    fn base_url(&self, network_id: u64) -> Result<String> {
        if let Some(url) = &self.base_url_override {
            return Ok(url.clone());
        }

        service_slug(network_id)
            .map(|slug| format!("https://safe-transaction-{}.safe.global", slug))
            .ok_or(VerifierError::InvalidNetworkId(network_id))
    }
}

#[async_trait]
impl SafeResolver for SafeTransactionService {
    async fn executed_transaction_hash(
        &self,
        proposal_hash: &str,
        network_id: u64,
    ) -> Result<Option<String>> {
        let url = format!(
            "{}/api/v1/multisig-transactions/{}/",
            self.base_url(network_id)?,
            proposal_hash
        );
        tracing::debug!(safe_tx_hash = %proposal_hash, network_id, "Fetching Safe transaction");

        let response = self.http.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            tracing::warn!(safe_tx_hash = %proposal_hash, "Safe transaction not found");
            return Ok(None);
        }

        let tx: MultisigTransaction = response.error_for_status()?.json().await?;
        let hash = tx
            .transaction_hash
            .filter(|hash| tx.is_executed && !hash.is_empty());

        match &hash {
            Some(hash) => tracing::info!(
                safe_tx_hash = %proposal_hash,
                tx_hash = %hash,
                "Safe transaction hash found"
            ),
            None => tracing::warn!(
                safe_tx_hash = %proposal_hash,
                "Safe transaction not executed yet"
            ),
        }

        Ok(hash)
    }
}
