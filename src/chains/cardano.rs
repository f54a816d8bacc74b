//! Cardano reader over the Blockfrost API.

use crate::chains::{ChainReader, ClientPool};
use crate::error::{Result, VerifierError};
use crate::models::{
    ChainFamily, NetworkConfig, NetworkTable, TransactionExpectation, TransactionFacts,
    TransactionStatus,
};
use crate::validation::is_valid_hex_transaction_hash;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::sync::Arc;

const LOVELACE: &str = "lovelace";

#[derive(Debug, Deserialize)]
pub struct BlockfrostTransaction {
    pub hash: String,
    pub block_height: Option<u64>,
    pub block_time: i64,
    pub fees: Option<String>,
    #[serde(default = "default_valid")]
    pub valid_contract: bool,
}

fn default_valid() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct TransactionUtxos {
    pub inputs: Vec<Utxo>,
    pub outputs: Vec<Utxo>,
}

#[derive(Debug, Deserialize)]
pub struct Utxo {
    pub address: String,
    pub amount: Vec<AssetAmount>,
}

#[derive(Debug, Deserialize)]
pub struct AssetAmount {
    pub unit: String,
    pub quantity: String,
}

impl Utxo {
    fn quantity_of(&self, unit: &str) -> Option<f64> {
        self.amount
            .iter()
            .find(|asset| asset.unit == unit)
            .and_then(|asset| asset.quantity.parse().ok())
    }

    fn first_token_quantity(&self) -> Option<f64> {
        self.amount
            .iter()
            .find(|asset| asset.unit != LOVELACE)
            .and_then(|asset| asset.quantity.parse().ok())
    }
}

pub struct BlockfrostClient {
    http: Client,
    base_url: String,
    project_id: String,
}

impl BlockfrostClient {
    pub fn new(http: Client, base_url: &str, project_id: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            project_id: project_id.to_string(),
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .header("project_id", &self.project_id)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        Ok(Some(response.error_for_status()?.json().await?))
    }

    pub async fn transaction(&self, hash: &str) -> Result<Option<BlockfrostTransaction>> {
        self.get(&format!("/txs/{}", hash)).await
    }

    pub async fn utxos(&self, hash: &str) -> Result<Option<TransactionUtxos>> {
        self.get(&format!("/txs/{}/utxos", hash)).await
    }
}

pub struct CardanoReader {
    networks: Arc<NetworkTable>,
    http: Client,
    project_id: Option<String>,
    clients: ClientPool<BlockfrostClient>,
}

impl CardanoReader {
    pub fn new(networks: Arc<NetworkTable>, http: Client, project_id: Option<String>) -> Self {
        Self {
            networks,
            http,
            project_id,
            clients: ClientPool::new(),
        }
    }

    fn client(&self, network: &NetworkConfig) -> Result<Arc<BlockfrostClient>> {
        self.clients.get_or_try_init(network.id, || {
            let project_id = self.project_id.as_deref().ok_or_else(|| {
                VerifierError::Config("Blockfrost project ID not configured".into())
            })?;
            let url = network
                .rpc_url
                .as_deref()
                .ok_or(VerifierError::MissingEndpoint(network.id))?;
            Ok(Arc::new(BlockfrostClient::new(self.http.clone(), url, project_id)))
        })
    }

    fn check_hash(hash: &str) -> Result<()> {
        if is_valid_hex_transaction_hash(hash) {
            Ok(())
        } else {
            Err(VerifierError::InvalidTransactionHash(hash.to_string()))
        }
    }
}

#[async_trait]
impl ChainReader for CardanoReader {
    fn family(&self) -> ChainFamily {
        ChainFamily::Cardano
    }

    async fn get_facts(&self, expectation: &TransactionExpectation) -> Result<TransactionFacts> {
        let hash = expectation.hash()?;
        Self::check_hash(hash)?;
        let network = self.networks.require(expectation.network_id)?;
        let client = self.client(network)?;

        let (tx, utxos) = tokio::try_join!(client.transaction(hash), client.utxos(hash))?;
        let not_found = || VerifierError::TransactionNotFound {
            hash: hash.to_string(),
            network_id: network.id,
        };
        let tx = tx.ok_or_else(not_found)?;
        let utxos = utxos.ok_or_else(not_found)?;

        if !tx.valid_contract {
            return Err(VerifierError::TransactionFailed {
                hash: hash.to_string(),
                network_id: network.id,
            });
        }

        let to = expectation.to_address.trim();
        let output = utxos
            .outputs
            .iter()
            .find(|output| output.address == to)
            .ok_or_else(|| VerifierError::RecipientMismatch {
                hash: hash.to_string(),
                expected: to.to_string(),
                actual: utxos
                    .outputs
                    .first()
                    .map(|output| output.address.clone())
                    .unwrap_or_default(),
            })?;

        let amount = if network.is_native_symbol(&expectation.symbol) {
            let decimals = network.native_currency.decimals as i32;
            output.quantity_of(LOVELACE).unwrap_or(0.0) / 10f64.powi(decimals)
        } else {
            match expectation.token_address() {
                Some(unit) => output.quantity_of(unit),
                None => output.first_token_quantity(),
            }
            .unwrap_or(0.0)
        };

        let sender = expectation.from_address.trim();
        let from = utxos
            .inputs
            .iter()
            .find(|input| input.address == sender)
            .or_else(|| utxos.inputs.first())
            .map(|input| input.address.clone())
            .unwrap_or_default();

        let facts = TransactionFacts {
            hash: tx.hash.clone(),
            amount,
            from,
            to: output.address.clone(),
            currency: expectation.symbol.clone(),
            timestamp: tx.block_time,
            status: TransactionStatus::Success,
            block_number: tx.block_height,
            nonce: None,
            gas_used: tx.fees.clone(),
            gas_price: None,
        };

        tracing::debug!(
            hash = %facts.hash,
            from = %facts.from,
            to = %facts.to,
            amount = facts.amount,
            "Cardano transaction facts retrieved"
        );

        Ok(facts)
    }

    async fn get_timestamp(&self, hash: &str, network_id: u64) -> Result<i64> {
        Self::check_hash(hash)?;
        let network = self.networks.require(network_id)?;

        self.client(network)?
            .transaction(hash)
            .await?
            .map(|tx| tx.block_time)
            .ok_or_else(|| VerifierError::TransactionNotFound {
                hash: hash.to_string(),
                network_id,
            })
    }
}
