//! Stellar reader over the Horizon REST API.

use crate::chains::{ChainReader, ClientPool};
use crate::error::{Result, VerifierError};
use crate::models::{
    ChainFamily, NetworkConfig, NetworkTable, TransactionExpectation, TransactionFacts,
    TransactionStatus,
};
use crate::validation::is_valid_hex_transaction_hash;
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::Arc;

const OPERATIONS_PAGE_LIMIT: u32 = 200;

#[derive(Debug, Deserialize)]
pub struct HorizonTransaction {
    pub hash: String,
    pub successful: bool,
    pub ledger: Option<u64>,
    pub created_at: String,
    pub source_account: Option<String>,
    pub fee_charged: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OperationsPage {
    #[serde(rename = "_embedded")]
    embedded: Embedded,
}

#[derive(Debug, Deserialize)]
struct Embedded {
    records: Vec<Operation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Operation {
    #[serde(rename = "type")]
    pub kind: String,
    pub from: Option<String>,
    pub to: Option<String>,
    pub asset_type: Option<String>,
    pub asset_code: Option<String>,
    pub amount: Option<String>,
    pub destination_amount: Option<String>,
}

impl Operation {
    fn is_payment(&self) -> bool {
        matches!(
            self.kind.as_str(),
            "payment" | "path_payment_strict_receive" | "path_payment_strict_send"
        )
    }

    fn is_native(&self) -> bool {
        self.asset_type.as_deref() == Some("native")
    }

    /// Amount credited to the destination account.
    fn received_amount(&self) -> Option<f64> {
        let amount = match self.kind.as_str() {
            "path_payment_strict_send" => self.destination_amount.as_ref().or(self.amount.as_ref()),
            _ => self.amount.as_ref(),
        };
        amount.and_then(|a| a.parse().ok())
    }
}

pub struct HorizonClient {
    http: Client,
    base_url: String,
}

impl HorizonClient {
    pub fn new(http: Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn transaction(&self, hash: &str) -> Result<Option<HorizonTransaction>> {
        let response = self
            .http
            .get(format!("{}/transactions/{}", self.base_url, hash))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        Ok(Some(response.error_for_status()?.json().await?))
    }

    pub async fn operations(&self, hash: &str) -> Result<Vec<Operation>> {
        let page: OperationsPage = self
            .http
            .get(format!("{}/transactions/{}/operations", self.base_url, hash))
            .query(&[("limit", OPERATIONS_PAGE_LIMIT)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(page.embedded.records)
    }
}

pub struct StellarReader {
    networks: Arc<NetworkTable>,
    http: Client,
    clients: ClientPool<HorizonClient>,
}

fn parse_timestamp(created_at: &str) -> Result<i64> {
    DateTime::parse_from_rfc3339(created_at)
        .map(|dt| dt.timestamp())
        .map_err(|e| {
            VerifierError::Network(format!("Invalid Horizon timestamp {}: {}", created_at, e))
        })
}

impl StellarReader {
    pub fn new(networks: Arc<NetworkTable>, http: Client) -> Self {
        Self {
            networks,
            http,
            clients: ClientPool::new(),
        }
    }

    fn client(&self, network: &NetworkConfig) -> Result<Arc<HorizonClient>> {
        self.clients.get_or_try_init(network.id, || {
            let url = network
                .rpc_url
                .as_deref()
                .ok_or(VerifierError::MissingEndpoint(network.id))?;
            Ok(Arc::new(HorizonClient::new(self.http.clone(), url)))
        })
    }

    async fn fetch(
        &self,
        hash: &str,
        network: &NetworkConfig,
    ) -> Result<(Arc<HorizonClient>, HorizonTransaction)> {
        if !is_valid_hex_transaction_hash(hash) {
            return Err(VerifierError::InvalidTransactionHash(hash.to_string()));
        }

        let client = self.client(network)?;
        let tx = client
            .transaction(hash)
            .await?
            .ok_or_else(|| VerifierError::TransactionNotFound {
                hash: hash.to_string(),
                network_id: network.id,
            })?;

        Ok((client, tx))
    }
}

#[async_trait]
impl ChainReader for StellarReader {
    fn family(&self) -> ChainFamily {
        ChainFamily::Stellar
    }

    async fn get_facts(&self, expectation: &TransactionExpectation) -> Result<TransactionFacts> {
        let hash = expectation.hash()?;
        let network = self.networks.require(expectation.network_id)?;
        let (client, tx) = self.fetch(hash, network).await?;

        if !tx.successful {
            return Err(VerifierError::TransactionFailed {
                hash: hash.to_string(),
                network_id: network.id,
            });
        }

        let operations = client.operations(hash).await?;
        tracing::debug!(hash = %hash, operations = operations.len(), "Fetched Stellar operations");

        let from = expectation.from_address.trim();
        let to = expectation.to_address.trim();
        let symbol = expectation.symbol.trim();
        let expects_native = network.is_native_symbol(&expectation.symbol);

        let payment = operations
            .iter()
            .filter(|op| op.is_payment())
            .filter(|op| op.from.as_deref() == Some(from) && op.to.as_deref() == Some(to))
            .find(|op| {
                if op.is_native() {
                    expects_native
                } else {
                    !expects_native
                        && op
                            .asset_code
                            .as_deref()
                            .map_or(false, |code| code.eq_ignore_ascii_case(symbol))
                }
            })
            .ok_or_else(|| VerifierError::NoMatchingTransfer {
                hash: hash.to_string(),
                recipient: to.to_string(),
                asset_kind: if expects_native { "native" } else { "asset" },
            })?;

        let facts = TransactionFacts {
            hash: tx.hash.clone(),
            amount: payment.received_amount().unwrap_or(0.0),
            from: from.to_string(),
            to: to.to_string(),
            currency: expectation.symbol.clone(),
            timestamp: parse_timestamp(&tx.created_at)?,
            status: TransactionStatus::Success,
            block_number: tx.ledger,
            nonce: None,
            gas_used: None,
            gas_price: tx.fee_charged.clone(),
        };

        tracing::debug!(
            hash = %facts.hash,
            kind = %payment.kind,
            amount = facts.amount,
            "Stellar transaction facts retrieved"
        );

        Ok(facts)
    }

    async fn get_timestamp(&self, hash: &str, network_id: u64) -> Result<i64> {
        let network = self.networks.require(network_id)?;
        let (_, tx) = self.fetch(hash, network).await?;
        parse_timestamp(&tx.created_at)
    }
}
