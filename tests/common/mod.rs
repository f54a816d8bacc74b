//! Shared fakes for integration tests.
//!
//! Readers and the Safe resolver answer from canned tables so the pipeline and
//! the HTTP layer can be driven without any network.

#![allow(dead_code)]

use async_trait::async_trait;
use donation_verifier::chains::{ChainReader, ChainRegistry};
use donation_verifier::error::{Result, VerifierError};
use donation_verifier::models::{
    ChainFamily, NetworkTable, TransactionExpectation, TransactionFacts, TransactionStatus,
};
use donation_verifier::services::{
    SafeResolver, VerificationService, VerificationSettings,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub const T: i64 = 1_700_000_000;
pub const SENDER: &str = "0x1111111111111111111111111111111111111111";
pub const RECIPIENT: &str = "0x2222222222222222222222222222222222222222";
pub const OTHER: &str = "0x3333333333333333333333333333333333333333";

pub fn tx_hash(n: u8) -> String {
    format!("0x{}", hex::encode([n; 32]))
}

pub fn facts(hash: &str) -> TransactionFacts {
    TransactionFacts {
        hash: hash.to_string(),
        amount: 1.0,
        from: SENDER.to_string(),
        to: RECIPIENT.to_string(),
        currency: "ETH".to_string(),
        timestamp: T,
        status: TransactionStatus::Success,
        block_number: Some(19_000_000),
        nonce: Some(7),
        gas_used: Some("21000".to_string()),
        gas_price: Some("30000000000".to_string()),
    }
}

pub fn expectation(hash: &str) -> TransactionExpectation {
    TransactionExpectation {
        tx_hash: Some(hash.to_string()),
        network_id: 1,
        symbol: "ETH".to_string(),
        from_address: SENDER.to_string(),
        to_address: RECIPIENT.to_string(),
        amount: 1.0,
        timestamp: T,
        ..Default::default()
    }
}

/// EVM reader answering from a fixed table of facts.
#[derive(Default)]
pub struct FakeReader {
    facts: HashMap<String, TransactionFacts>,
    swaps: HashSet<(String, String)>,
    unreachable: HashSet<String>,
    calls: AtomicUsize,
}

impl FakeReader {
    pub fn with_facts(mut self, facts: TransactionFacts) -> Self {
        self.facts.insert(facts.hash.clone(), facts);
        self
    }

    pub fn with_swap(mut self, hash: &str, recipient: &str) -> Self {
        self.swaps.insert((hash.to_string(), recipient.to_lowercase()));
        self
    }

    /// Lookups for `hash` fail as if the node timed out.
    pub fn with_network_error(mut self, hash: &str) -> Self {
        self.unreachable.insert(hash.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn lookup(&self, hash: &str, network_id: u64) -> Result<TransactionFacts> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.contains(hash) {
            return Err(VerifierError::Network(format!(
                "request for {} timed out",
                hash
            )));
        }
        self.facts
            .get(hash)
            .cloned()
            .ok_or_else(|| VerifierError::TransactionNotFound {
                hash: hash.to_string(),
                network_id,
            })
    }
}

#[async_trait]
impl ChainReader for FakeReader {
    fn family(&self) -> ChainFamily {
        ChainFamily::Evm
    }

    async fn get_facts(&self, expectation: &TransactionExpectation) -> Result<TransactionFacts> {
        self.lookup(expectation.hash()?, expectation.network_id)
    }

    async fn get_timestamp(&self, hash: &str, network_id: u64) -> Result<i64> {
        self.lookup(hash, network_id).map(|facts| facts.timestamp)
    }

    async fn transfers_to(&self, hash: &str, _network_id: u64, recipient: &str) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .swaps
            .contains(&(hash.to_string(), recipient.to_lowercase())))
    }
}

/// Safe resolver backed by a proposal → executed-hash table.
#[derive(Default)]
pub struct FakeSafe {
    executed: HashMap<String, String>,
}

impl FakeSafe {
    pub fn with_executed(mut self, proposal: &str, hash: &str) -> Self {
        self.executed.insert(proposal.to_string(), hash.to_string());
        self
    }
}

#[async_trait]
impl SafeResolver for FakeSafe {
    async fn executed_transaction_hash(
        &self,
        proposal_hash: &str,
        _network_id: u64,
    ) -> Result<Option<String>> {
        Ok(self.executed.get(proposal_hash).cloned())
    }
}

pub fn service(reader: Arc<FakeReader>, safe: FakeSafe) -> VerificationService {
    let networks = Arc::new(NetworkTable::defaults());
    let registry = ChainRegistry::new(networks).with_reader(reader);
    VerificationService::new(
        Arc::new(registry),
        Arc::new(safe),
        VerificationSettings::default(),
    )
}
