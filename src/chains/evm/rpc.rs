use crate::contracts::Erc20Metadata;
use crate::error::{Result, VerifierError};
use async_trait::async_trait;
use ethers::providers::{Http, Middleware, Provider};
use ethers::types::{Address, Transaction, TransactionReceipt, H256};
use std::sync::Arc;

/// The handful of node calls the EVM reader needs.
#[async_trait]
pub trait EvmRpc: Send + Sync {
    async fn transaction(&self, hash: H256) -> Result<Option<Transaction>>;

    async fn receipt(&self, hash: H256) -> Result<Option<TransactionReceipt>>;

    async fn block_timestamp(&self, block_number: u64) -> Result<Option<i64>>;

    async fn token_symbol(&self, token: Address) -> Result<String>;

    async fn token_decimals(&self, token: Address) -> Result<u8>;
}

pub struct EthersRpc {
    provider: Arc<Provider<Http>>,
}

impl EthersRpc {
    pub fn connect(rpc_url: &str) -> Result<Self> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| VerifierError::Config(format!("Invalid RPC URL {}: {}", rpc_url, e)))?;

        Ok(Self {
            provider: Arc::new(provider),
        })
    }
}

#[async_trait]
impl EvmRpc for EthersRpc {
    async fn transaction(&self, hash: H256) -> Result<Option<Transaction>> {
        Ok(self.provider.get_transaction(hash).await?)
    }

    async fn receipt(&self, hash: H256) -> Result<Option<TransactionReceipt>> {
        Ok(self.provider.get_transaction_receipt(hash).await?)
    }

    async fn block_timestamp(&self, block_number: u64) -> Result<Option<i64>> {
        let block = self.provider.get_block(block_number).await?;
        Ok(block.map(|b| b.timestamp.low_u64() as i64))
    }

    async fn token_symbol(&self, token: Address) -> Result<String> {
        Erc20Metadata::new(token, self.provider.clone())
            .symbol()
            .call()
            .await
            .map_err(|e| VerifierError::Network(format!("symbol() failed for {:?}: {}", token, e)))
    }

    async fn token_decimals(&self, token: Address) -> Result<u8> {
        Erc20Metadata::new(token, self.provider.clone())
            .decimals()
            .call()
            .await
            .map_err(|e| {
                VerifierError::Network(format!("decimals() failed for {:?}: {}", token, e))
            })
    }
}
