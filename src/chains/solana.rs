//! Solana reader over the JSON-RPC `getTransaction` method.

use crate::chains::{ChainReader, ClientPool};
use crate::error::{Result, VerifierError};
use crate::models::{
    ChainFamily, NetworkConfig, NetworkTable, TransactionExpectation, TransactionFacts,
    TransactionStatus,
};
use crate::validation::is_valid_solana_signature;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;

#[derive(Debug, Serialize)]
struct JsonRpcRequest {
    jsonrpc: &'static str,
    id: u64,
    method: &'static str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedTransaction {
    pub slot: u64,
    pub block_time: Option<i64>,
    pub meta: Option<TransactionMeta>,
    pub transaction: TransactionEnvelope,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMeta {
    pub err: Option<Value>,
    #[serde(default)]
    pub pre_balances: Vec<u64>,
    #[serde(default)]
    pub post_balances: Vec<u64>,
    pub pre_token_balances: Option<Vec<TokenBalance>>,
    pub post_token_balances: Option<Vec<TokenBalance>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenBalance {
    pub account_index: usize,
    pub mint: String,
    pub owner: Option<String>,
    pub ui_token_amount: UiTokenAmount,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UiTokenAmount {
    pub ui_amount: Option<f64>,
    pub ui_amount_string: Option<String>,
}

impl UiTokenAmount {
    fn value(&self) -> f64 {
        self.ui_amount_string
            .as_deref()
            .and_then(|s| s.parse().ok())
            .or(self.ui_amount)
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Deserialize)]
pub struct TransactionEnvelope {
    pub message: TransactionMessage,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionMessage {
    pub account_keys: Vec<AccountKey>,
}

/// `jsonParsed` encoding returns objects, legacy encodings return bare strings.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum AccountKey {
    Parsed {
        pubkey: String,
        #[serde(default)]
        signer: bool,
    },
    Plain(String),
}

impl AccountKey {
    fn pubkey(&self) -> &str {
        match self {
            AccountKey::Parsed { pubkey, .. } => pubkey,
            AccountKey::Plain(pubkey) => pubkey,
        }
    }

    /// Bare keys carry no flags; only the fee payer at index 0 is known to have signed.
    fn is_signer(&self, index: usize) -> bool {
        match self {
            AccountKey::Parsed { signer, .. } => *signer,
            AccountKey::Plain(_) => index == 0,
        }
    }
}

pub struct SolanaRpc {
    http: Client,
    rpc_url: String,
}

impl SolanaRpc {
    pub fn new(http: Client, rpc_url: &str) -> Self {
        Self {
            http,
            rpc_url: rpc_url.to_string(),
        }
    }

    pub async fn get_transaction(&self, signature: &str) -> Result<Option<ParsedTransaction>> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: 1,
            method: "getTransaction",
            params: json!([
                signature,
                {
                    "encoding": "jsonParsed",
                    "commitment": "confirmed",
                    "maxSupportedTransactionVersion": 0
                }
            ]),
        };

        let response: JsonRpcResponse<ParsedTransaction> = self
            .http
            .post(&self.rpc_url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(error) = response.error {
            return Err(VerifierError::Network(format!(
                "Solana RPC error {}: {}",
                error.code, error.message
            )));
        }

        Ok(response.result)
    }
}

pub struct SolanaReader {
    networks: Arc<NetworkTable>,
    http: Client,
    clients: ClientPool<SolanaRpc>,
}

impl SolanaReader {
    pub fn new(networks: Arc<NetworkTable>, http: Client) -> Self {
        Self {
            networks,
            http,
            clients: ClientPool::new(),
        }
    }

    fn client(&self, network: &NetworkConfig) -> Result<Arc<SolanaRpc>> {
        self.clients.get_or_try_init(network.id, || {
            let url = network
                .rpc_url
                .as_deref()
                .ok_or(VerifierError::MissingEndpoint(network.id))?;
            Ok(Arc::new(SolanaRpc::new(self.http.clone(), url)))
        })
    }

    async fn fetch(&self, signature: &str, network_id: u64) -> Result<ParsedTransaction> {
        if !is_valid_solana_signature(signature) {
            return Err(VerifierError::InvalidTransactionHash(signature.to_string()));
        }
        let network = self.networks.require(network_id)?;

        self.client(network)?
            .get_transaction(signature)
            .await?
            .ok_or_else(|| VerifierError::TransactionNotFound {
                hash: signature.to_string(),
                network_id,
            })
    }
}

/// Balance change of the recipient and whether the recipient took part at all.
fn native_delta(
    tx: &ParsedTransaction,
    meta: &TransactionMeta,
    recipient: &str,
    decimals: u32,
) -> Option<f64> {
    let index = tx
        .transaction
        .message
        .account_keys
        .iter()
        .position(|key| key.pubkey() == recipient)?;

    let pre = meta.pre_balances.get(index).copied().unwrap_or(0) as f64;
    let post = meta.post_balances.get(index).copied().unwrap_or(0) as f64;
    Some((post - pre) / 10f64.powi(decimals as i32))
}

fn token_delta(meta: &TransactionMeta, recipient: &str, mint: Option<&str>) -> Option<f64> {
    let pre_balances = meta.pre_token_balances.as_deref().unwrap_or_default();

    let post = meta
        .post_token_balances
        .as_deref()
        .unwrap_or_default()
        .iter()
        .find(|balance| {
            balance.owner.as_deref() == Some(recipient) && mint.map_or(true, |m| balance.mint == m)
        })?;

    let pre = pre_balances
        .iter()
        .find(|balance| balance.account_index == post.account_index)
        .map_or(0.0, |balance| balance.ui_token_amount.value());

    Some(post.ui_token_amount.value() - pre)
}

#[async_trait]
impl ChainReader for SolanaReader {
    fn family(&self) -> ChainFamily {
        ChainFamily::Solana
    }

    async fn get_facts(&self, expectation: &TransactionExpectation) -> Result<TransactionFacts> {
        let signature = expectation.hash()?;
        let network = self.networks.require(expectation.network_id)?;
        let tx = self.fetch(signature, network.id).await?;

        tracing::debug!(signature = %signature, slot = tx.slot, "Fetched Solana transaction");

        let meta = tx.meta.as_ref().ok_or_else(|| {
            VerifierError::Network(format!(
                "Solana transaction {} has no status metadata",
                signature
            ))
        })?;

        if let Some(err) = meta.err.as_ref().filter(|err| !err.is_null()) {
            tracing::debug!(signature = %signature, error = %err, "Solana transaction failed");
            return Err(VerifierError::TransactionFailed {
                hash: signature.to_string(),
                network_id: network.id,
            });
        }

        let recipient = expectation.to_address.trim();
        let delta = if network.is_native_symbol(&expectation.symbol) {
            native_delta(&tx, meta, recipient, network.native_currency.decimals)
        } else {
            token_delta(meta, recipient, expectation.token_address())
        };

        let keys = &tx.transaction.message.account_keys;
        let sender = expectation.from_address.trim();
        let signed_by_sender = keys
            .iter()
            .enumerate()
            .any(|(index, key)| key.pubkey() == sender && key.is_signer(index));
        let from = if signed_by_sender {
            sender.to_string()
        } else {
            keys.first().map(|key| key.pubkey().to_string()).unwrap_or_default()
        };

        let facts = TransactionFacts {
            hash: signature.to_string(),
            amount: delta.unwrap_or(0.0),
            from,
            to: if delta.is_some() { recipient.to_string() } else { String::new() },
            currency: expectation.symbol.clone(),
            timestamp: tx.block_time.unwrap_or_else(|| Utc::now().timestamp()),
            status: TransactionStatus::Success,
            block_number: Some(tx.slot),
            nonce: None,
            gas_used: None,
            gas_price: None,
        };

        tracing::debug!(
            hash = %facts.hash,
            from = %facts.from,
            to = %facts.to,
            amount = facts.amount,
            "Solana transaction facts retrieved"
        );

        Ok(facts)
    }

    async fn get_timestamp(&self, hash: &str, network_id: u64) -> Result<i64> {
        let tx = self.fetch(hash, network_id).await?;
        Ok(tx.block_time.unwrap_or_else(|| Utc::now().timestamp()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::network_ids::SOLANA_MAINNET;
    use std::collections::HashMap;

    const PAYER: &str = "4Nd1mBQtrMJVYVfKf2PJy9NZUZdTAsp7D4xWLs4gDB4T";
    const RECIPIENT: &str = "8dHEsm9gGzJdKeZz6aQ9HCZbUxhAyoMxjxoAt5FM8LVS";
    const MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

    fn signature() -> String {
        bs58::encode([9u8; 64]).into_string()
    }

    fn reader(url: String) -> SolanaReader {
        let urls = HashMap::from([(SOLANA_MAINNET, url)]);
        SolanaReader::new(
            Arc::new(NetworkTable::defaults().with_rpc_urls(&urls)),
            Client::new(),
        )
    }

    fn expectation(symbol: &str) -> TransactionExpectation {
        TransactionExpectation {
            tx_hash: Some(signature()),
            network_id: SOLANA_MAINNET,
            symbol: symbol.into(),
            from_address: PAYER.into(),
            to_address: RECIPIENT.into(),
            amount: 1.5,
            timestamp: 1_700_000_000,
            ..Default::default()
        }
    }

    fn transaction(err: Value) -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "result": {
                "slot": 250_000_000u64,
                "blockTime": 1_700_000_000,
                "meta": {
                    "err": err,
                    "preBalances": [5_000_000_000u64, 1_000_000_000u64],
                    "postBalances": [3_499_995_000u64, 2_500_000_000u64],
                    "preTokenBalances": [{
                        "accountIndex": 2,
                        "mint": MINT,
                        "owner": RECIPIENT,
                        "uiTokenAmount": { "uiAmount": 10.0, "uiAmountString": "10" }
                    }],
                    "postTokenBalances": [{
                        "accountIndex": 2,
                        "mint": MINT,
                        "owner": RECIPIENT,
                        "uiTokenAmount": { "uiAmount": 35.5, "uiAmountString": "35.5" }
                    }]
                },
                "transaction": {
                    "message": {
                        "accountKeys": [
                            { "pubkey": PAYER, "signer": true, "writable": true },
                            { "pubkey": RECIPIENT, "signer": false, "writable": true }
                        ]
                    }
                }
            }
        })
    }

    #[tokio::test]
    async fn test_native_transfer_from_balance_delta() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_body(mockito::Matcher::PartialJson(json!({ "method": "getTransaction" })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(transaction(Value::Null).to_string())
            .create_async()
            .await;

        let facts = reader(server.url()).get_facts(&expectation("SOL")).await.unwrap();

        mock.assert_async().await;
        assert_eq!(facts.amount, 1.5);
        assert_eq!(facts.from, PAYER);
        assert_eq!(facts.to, RECIPIENT);
        assert_eq!(facts.timestamp, 1_700_000_000);
        assert_eq!(facts.block_number, Some(250_000_000));
    }

    #[tokio::test]
    async fn test_spl_token_transfer_from_token_balances() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(200)
            .with_body(transaction(Value::Null).to_string())
            .create_async()
            .await;

        let mut request = expectation("USDC");
        request.token_address = Some(MINT.into());

        let facts = reader(server.url()).get_facts(&request).await.unwrap();
        assert_eq!(facts.amount, 25.5);
        assert_eq!(facts.to, RECIPIENT);
    }

    #[tokio::test]
    async fn test_failed_and_missing_transactions() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(200)
            .with_body(transaction(json!({ "InstructionError": [0, "Custom"] })).to_string())
            .create_async()
            .await;

        let err = reader(server.url()).get_facts(&expectation("SOL")).await.unwrap_err();
        assert!(matches!(err, VerifierError::TransactionFailed { .. }));

        let mut empty = mockito::Server::new_async().await;
        let _empty_mock = empty
            .mock("POST", "/")
            .with_status(200)
            .with_body(json!({ "jsonrpc": "2.0", "id": 1, "result": null }).to_string())
            .create_async()
            .await;

        let err = reader(empty.url()).get_facts(&expectation("SOL")).await.unwrap_err();
        assert!(matches!(err, VerifierError::TransactionNotFound { .. }));
    }

    #[tokio::test]
    async fn test_unknown_recipient_reports_empty_address() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(200)
            .with_body(transaction(Value::Null).to_string())
            .create_async()
            .await;

        let mut request = expectation("SOL");
        request.to_address = "11111111111111111111111111111111".into();
        request.from_address = "unknown".into();

        let facts = reader(server.url()).get_facts(&request).await.unwrap();
        assert_eq!(facts.to, "");
        assert_eq!(facts.amount, 0.0);
        assert_eq!(facts.from, PAYER);
    }

    #[tokio::test]
    async fn test_sender_must_have_signed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(200)
            .with_body(transaction(Value::Null).to_string())
            .create_async()
            .await;

        let mut request = expectation("SOL");
        request.from_address = RECIPIENT.into();

        let facts = reader(server.url()).get_facts(&request).await.unwrap();
        assert_eq!(facts.from, PAYER);
    }

    #[test]
    fn test_plain_keys_treat_fee_payer_as_signer() {
        let keys: Vec<AccountKey> = serde_json::from_value(json!([PAYER, RECIPIENT])).unwrap();
        assert!(keys[0].is_signer(0));
        assert!(!keys[1].is_signer(1));

        let parsed: AccountKey =
            serde_json::from_value(json!({ "pubkey": RECIPIENT, "writable": true })).unwrap();
        assert!(!parsed.is_signer(0));
    }

    #[tokio::test]
    async fn test_malformed_signature_skips_rpc() {
        let reader = reader("http://127.0.0.1:1".into());
        let mut request = expectation("SOL");
        request.tx_hash = Some("not-a-signature".into());

        let err = reader.get_facts(&request).await.unwrap_err();
        assert!(matches!(err, VerifierError::InvalidTransactionHash(_)));
    }

    #[tokio::test]
    async fn test_rpc_error_is_network_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(200)
            .with_body(
                json!({
                    "jsonrpc": "2.0",
                    "id": 1,
                    "error": { "code": -32005, "message": "rate limited" }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let err = reader(server.url())
            .get_timestamp(&signature(), SOLANA_MAINNET)
            .await
            .unwrap_err();
        assert!(matches!(err, VerifierError::Network(_)));
    }
}
