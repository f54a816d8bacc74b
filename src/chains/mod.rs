pub mod cardano;
pub mod evm;
pub mod pool;
pub mod solana;
pub mod stellar;

pub use cardano::CardanoReader;
pub use evm::EvmReader;
pub use pool::ClientPool;
pub use solana::SolanaReader;
pub use stellar::StellarReader;

use crate::error::{Result, VerifierError};
use crate::models::{ChainFamily, NetworkTable, TransactionExpectation, TransactionFacts};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Reads transaction facts from one family of chains.
#[async_trait]
pub trait ChainReader: Send + Sync {
    fn family(&self) -> ChainFamily;

    async fn get_facts(&self, expectation: &TransactionExpectation) -> Result<TransactionFacts>;

    async fn get_timestamp(&self, hash: &str, network_id: u64) -> Result<i64>;

    /// Whether any token transfer in `hash` credits `recipient`.
    async fn transfers_to(
        &self,
        _hash: &str,
        _network_id: u64,
        _recipient: &str,
    ) -> Result<bool> {
        Ok(false)
    }
}

/// Routes each request to the reader for its chain family.
pub struct ChainRegistry {
    networks: Arc<NetworkTable>,
    readers: HashMap<ChainFamily, Arc<dyn ChainReader>>,
}

impl ChainRegistry {
    pub fn new(networks: Arc<NetworkTable>) -> Self {
        Self {
            networks,
            readers: HashMap::new(),
        }
    }

    pub fn register_reader(&mut self, reader: Arc<dyn ChainReader>) {
        let family = reader.family();
        tracing::info!("Registered {} chain reader", family);
        self.readers.insert(family, reader);
    }

    pub fn with_reader(mut self, reader: Arc<dyn ChainReader>) -> Self {
        self.register_reader(reader);
        self
    }

    pub fn networks(&self) -> &Arc<NetworkTable> {
        &self.networks
    }

    /// An explicit chain type wins over the network table.
    pub fn resolve_family(
        &self,
        network_id: u64,
        chain_type: Option<ChainFamily>,
    ) -> Result<ChainFamily> {
        match chain_type {
            Some(family) => Ok(family),
            None => self.networks.family(network_id),
        }
    }

    fn reader(&self, family: ChainFamily) -> Result<&Arc<dyn ChainReader>> {
        self.readers
            .get(&family)
            .ok_or(VerifierError::UnsupportedChain(family))
    }

    fn reader_for(
        &self,
        network_id: u64,
        chain_type: Option<ChainFamily>,
    ) -> Result<&Arc<dyn ChainReader>> {
        let family = self.resolve_family(network_id, chain_type)?;
        self.reader(family)
    }

    pub async fn get_facts(
        &self,
        expectation: &TransactionExpectation,
    ) -> Result<TransactionFacts> {
        self.reader_for(expectation.network_id, expectation.chain_type)?
            .get_facts(expectation)
            .await
    }

    pub async fn get_timestamp(&self, hash: &str, network_id: u64) -> Result<i64> {
        self.reader_for(network_id, None)?
            .get_timestamp(hash, network_id)
            .await
    }

    pub async fn transfers_to(
        &self,
        hash: &str,
        network_id: u64,
        chain_type: Option<ChainFamily>,
        recipient: &str,
    ) -> Result<bool> {
        self.reader_for(network_id, chain_type)?
            .transfers_to(hash, network_id, recipient)
            .await
    }
}
