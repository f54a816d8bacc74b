pub mod logs;
pub mod rpc;

pub use logs::{DonationTransfer, LogDecodeError};
pub use rpc::{EthersRpc, EvmRpc};

use crate::chains::{ChainReader, ClientPool};
use crate::error::{Result, VerifierError};
use crate::models::{
    ChainFamily, NetworkConfig, NetworkTable, TransactionExpectation, TransactionFacts,
    TransactionStatus,
};
use crate::validation::is_valid_evm_transaction_hash;
use async_trait::async_trait;
use chrono::Utc;
use ethers::types::{Address, Transaction, TransactionReceipt, H256, U64};
use std::sync::Arc;

/// Reads transactions from EVM networks, one RPC client per network.
pub struct EvmReader {
    networks: Arc<NetworkTable>,
    clients: ClientPool<dyn EvmRpc>,
}

fn format_address(address: Address) -> String {
    format!("{:?}", address)
}

fn parse_hash(hash: &str) -> Result<H256> {
    let invalid = || VerifierError::InvalidTransactionHash(hash.to_string());

    if !is_valid_evm_transaction_hash(hash) {
        return Err(invalid());
    }
    let bytes = hex::decode(&hash[2..]).map_err(|_| invalid())?;
    Ok(H256::from_slice(&bytes))
}

fn parse_address(address: &str) -> Option<Address> {
    address.trim().parse::<Address>().ok()
}

fn amount_error(hash: &str, err: String) -> VerifierError {
    VerifierError::Network(format!("Could not convert amount of {}: {}", hash, err))
}

impl EvmReader {
    pub fn new(networks: Arc<NetworkTable>) -> Self {
        Self {
            networks,
            clients: ClientPool::new(),
        }
    }

    /// Pins the client used for `network_id` instead of connecting from the network table.
    pub fn with_client(self, network_id: u64, client: Arc<dyn EvmRpc>) -> Self {
        self.clients.insert(network_id, client);
        self
    }

    fn client(&self, network: &NetworkConfig) -> Result<Arc<dyn EvmRpc>> {
        self.clients.get_or_try_init(network.id, || {
            let url = network
                .rpc_url
                .as_deref()
                .ok_or(VerifierError::MissingEndpoint(network.id))?;

            tracing::info!("Creating RPC client for {} ({})", network.name, network.id);
            let client: Arc<dyn EvmRpc> = Arc::new(EthersRpc::connect(url)?);
            Ok(client)
        })
    }

    async fn block_time(&self, client: &dyn EvmRpc, block_number: Option<U64>) -> Result<i64> {
        let timestamp = match block_number {
            Some(number) => client.block_timestamp(number.as_u64()).await?,
            None => None,
        };
        Ok(timestamp.unwrap_or_else(|| Utc::now().timestamp()))
    }

    async fn simple_facts(
        &self,
        client: &dyn EvmRpc,
        network: &NetworkConfig,
        expectation: &TransactionExpectation,
        tx: Transaction,
        receipt: Option<TransactionReceipt>,
    ) -> Result<TransactionFacts> {
        let hash = format!("{:?}", tx.hash);

        let amount = if network.is_native_symbol(&expectation.symbol) {
            logs::units_to_decimal(tx.value, network.native_currency.decimals)
                .map_err(|e| amount_error(&hash, e))?
        } else {
            expectation.amount
        };

        let status = match &receipt {
            Some(receipt) if receipt.status == Some(U64::zero()) => TransactionStatus::Failed,
            Some(_) => TransactionStatus::Success,
            None => TransactionStatus::Pending,
        };

        let block_number = receipt.as_ref().and_then(|r| r.block_number);
        let timestamp = self.block_time(client, block_number).await?;

        let facts = TransactionFacts {
            hash,
            amount,
            from: format_address(tx.from),
            to: tx.to.map(format_address).unwrap_or_default(),
            currency: expectation.symbol.clone(),
            timestamp,
            status,
            block_number: block_number.or(tx.block_number).map(|n| n.as_u64()),
            nonce: Some(tx.nonce.low_u64()),
            gas_used: receipt.as_ref().and_then(|r| r.gas_used).map(|g| g.to_string()),
            gas_price: tx.gas_price.map(|p| p.to_string()),
        };

        tracing::debug!(
            hash = %facts.hash,
            from = %facts.from,
            to = %facts.to,
            amount = facts.amount,
            status = ?facts.status,
            "EVM transaction facts retrieved"
        );

        Ok(facts)
    }

    /// Finds the transfer to the expected recipient among the handler's event logs.
    async fn donation_facts(
        &self,
        client: &dyn EvmRpc,
        network: &NetworkConfig,
        expectation: &TransactionExpectation,
        tx: Transaction,
        receipt: Option<TransactionReceipt>,
    ) -> Result<TransactionFacts> {
        let hash = format!("{:?}", tx.hash);
        let receipt = receipt.ok_or_else(|| VerifierError::TransactionNotFound {
            hash: hash.clone(),
            network_id: network.id,
        })?;

        let recipient = parse_address(&expectation.to_address).ok_or_else(|| {
            VerifierError::RecipientMismatch {
                hash: hash.clone(),
                expected: expectation.to_address.clone(),
                actual: tx.to.map(format_address).unwrap_or_default(),
            }
        })?;

        let expects_native = network.is_native_symbol(&expectation.symbol);
        let expected_amount = Some(expectation.amount).filter(|amount| *amount > 0.0);

        tracing::debug!(
            hash = %hash,
            symbol = %expectation.symbol,
            expects_native,
            token_address = ?expectation.token_address(),
            "Matching donation handler transfer"
        );

        let donations = logs::parse_donation_made_events(&receipt.logs, tx.from);

        let (transfer, decimals) = if expects_native {
            let decimals = network.native_currency.decimals;
            let native: Vec<DonationTransfer> =
                donations.into_iter().filter(|d| d.is_native).collect();

            let transfer =
                logs::find_donation_transfer(&native, recipient, expected_amount, decimals)
                    .ok_or_else(|| VerifierError::NoMatchingTransfer {
                        hash: hash.clone(),
                        recipient: expectation.to_address.clone(),
                        asset_kind: "native",
                    })?;
            (transfer, decimals)
        } else {
            let token = match expectation.token_address() {
                Some(address) => Some(parse_address(address).ok_or_else(|| {
                    VerifierError::TokenMismatch {
                        hash: hash.clone(),
                        reason: format!("Invalid token address {}", address),
                    }
                })?),
                None => None,
            };

            if let Some(token) = token {
                self.check_token_symbol(client, &hash, token, &expectation.symbol)
                    .await?;
            }
            let decimals = match token {
                Some(token) => self.token_decimals(client, token).await,
                None => logs::DEFAULT_TOKEN_DECIMALS,
            };

            let of_token =
                |d: &DonationTransfer| !d.is_native && token.map_or(true, |t| d.token == t);

            let candidates: Vec<DonationTransfer> =
                donations.into_iter().filter(|d| of_token(d)).collect();
            let found =
                logs::find_donation_transfer(&candidates, recipient, expected_amount, decimals)
                    .or_else(|| {
                        let transfers: Vec<DonationTransfer> =
                            logs::parse_transfer_events(&receipt.logs)
                                .into_iter()
                                .filter(|d| of_token(d))
                                .collect();
                        tracing::debug!(
                            hash = %hash,
                            transfers = transfers.len(),
                            "Falling back to Transfer events"
                        );
                        logs::find_donation_transfer(
                            &transfers,
                            recipient,
                            expected_amount,
                            decimals,
                        )
                    });

            let transfer = found.ok_or_else(|| VerifierError::NoMatchingTransfer {
                hash: hash.clone(),
                recipient: expectation.to_address.clone(),
                asset_kind: "ERC-20",
            })?;
            (transfer, decimals)
        };

        let amount = logs::units_to_decimal(transfer.amount, decimals)
            .map_err(|e| amount_error(&hash, e))?;
        let currency = if transfer.is_native {
            network.native_currency.symbol.clone()
        } else {
            expectation.symbol.clone()
        };
        let timestamp = self.block_time(client, receipt.block_number).await?;

        tracing::debug!(
            hash = %hash,
            to = ?transfer.to,
            amount,
            token = ?transfer.token,
            is_native = transfer.is_native,
            "Donation handler transfer matched"
        );

        Ok(TransactionFacts {
            hash,
            amount,
            from: format_address(transfer.from),
            to: format_address(transfer.to),
            currency,
            timestamp,
            status: TransactionStatus::Success,
            block_number: receipt.block_number.or(tx.block_number).map(|n| n.as_u64()),
            nonce: Some(tx.nonce.low_u64()),
            gas_used: receipt.gas_used.map(|g| g.to_string()),
            gas_price: tx.gas_price.map(|p| p.to_string()),
        })
    }

    async fn check_token_symbol(
        &self,
        client: &dyn EvmRpc,
        hash: &str,
        token: Address,
        declared: &str,
    ) -> Result<()> {
        match client.token_symbol(token).await {
            Ok(actual) if actual.trim().eq_ignore_ascii_case(declared.trim()) => Ok(()),
            Ok(actual) => Err(VerifierError::TokenMismatch {
                hash: hash.to_string(),
                reason: format!(
                    "expected {}, but token contract {:?} has symbol {}",
                    declared, token, actual
                ),
            }),
            Err(e) => {
                tracing::warn!(
                    hash = %hash,
                    token = ?token,
                    "Could not fetch token symbol, skipping symbol check: {}",
                    e
                );
                Ok(())
            }
        }
    }

    async fn token_decimals(&self, client: &dyn EvmRpc, token: Address) -> u32 {
        match client.token_decimals(token).await {
            Ok(decimals) => u32::from(decimals),
            Err(e) => {
                tracing::debug!(
                    token = ?token,
                    "Could not fetch token decimals, assuming {}: {}",
                    logs::DEFAULT_TOKEN_DECIMALS,
                    e
                );
                logs::DEFAULT_TOKEN_DECIMALS
            }
        }
    }
}

#[async_trait]
impl ChainReader for EvmReader {
    fn family(&self) -> ChainFamily {
        ChainFamily::Evm
    }

    async fn get_facts(&self, expectation: &TransactionExpectation) -> Result<TransactionFacts> {
        let hash = expectation.hash()?;
        let tx_hash = parse_hash(hash)?;
        let network = self.networks.require(expectation.network_id)?;
        let client = self.client(network)?;

        tracing::debug!(hash = %hash, network_id = network.id, "Fetching EVM transaction");

        let (tx, receipt) = tokio::try_join!(client.transaction(tx_hash), client.receipt(tx_hash))?;

        let tx = tx.ok_or_else(|| VerifierError::TransactionNotFound {
            hash: hash.to_string(),
            network_id: network.id,
        })?;

        if receipt.as_ref().map_or(false, |r| r.status == Some(U64::zero())) {
            return Err(VerifierError::TransactionFailed {
                hash: hash.to_string(),
                network_id: network.id,
            });
        }

        match tx.to {
            Some(to) if network.is_donation_handler(&format_address(to)) => {
                tracing::debug!(
                    hash = %hash,
                    handler = ?to,
                    "Transaction sent to donation handler"
                );
                self.donation_facts(client.as_ref(), network, expectation, tx, receipt)
                    .await
            }
            _ => {
                self.simple_facts(client.as_ref(), network, expectation, tx, receipt)
                    .await
            }
        }
    }

    async fn get_timestamp(&self, hash: &str, network_id: u64) -> Result<i64> {
        let tx_hash = parse_hash(hash)?;
        let network = self.networks.require(network_id)?;
        let client = self.client(network)?;

        let receipt = client
            .receipt(tx_hash)
            .await?
            .ok_or_else(|| VerifierError::TransactionNotFound {
                hash: hash.to_string(),
                network_id,
            })?;

        self.block_time(client.as_ref(), receipt.block_number).await
    }

    async fn transfers_to(&self, hash: &str, network_id: u64, recipient: &str) -> Result<bool> {
        let Some(recipient) = parse_address(recipient) else {
            return Ok(false);
        };

        let receipt = async {
            let tx_hash = parse_hash(hash)?;
            let network = self.networks.require(network_id)?;
            self.client(network)?.receipt(tx_hash).await
        };

        match receipt.await {
            Ok(Some(receipt)) => {
                let found = logs::parse_transfer_events(&receipt.logs)
                    .iter()
                    .any(|transfer| transfer.to == recipient);
                tracing::debug!(hash = %hash, recipient = ?recipient, found, "Swap transfer check");
                Ok(found)
            }
            Ok(None) => {
                tracing::debug!(hash = %hash, network_id, "No receipt found for swap check");
                Ok(false)
            }
            Err(e) => {
                tracing::error!(hash = %hash, network_id, "Swap check failed: {}", e);
                Ok(false)
            }
        }
    }
}
