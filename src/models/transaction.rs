use crate::error::{ErrorCode, Result, VerifierError};
use crate::models::ChainFamily;
use serde::{Deserialize, Serialize};

/// A caller's claim about a payment, to be checked against the chain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionExpectation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_hash: Option<String>,
    /// Safe multisig proposal hash, resolved to `tx_hash` once executed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safe_tx_hash: Option<String>,
    pub network_id: u64,
    pub symbol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain_type: Option<ChainFamily>,
    pub from_address: String,
    pub to_address: String,
    pub amount: f64,
    pub timestamp: i64,
    #[serde(default)]
    pub is_swap: bool,
    #[serde(default, alias = "importedFromDraftOrBackupService")]
    pub skip_timestamp_check: bool,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

impl TransactionExpectation {
    /// The direct transaction hash, if one is present.
    pub fn direct_hash(&self) -> Option<&str> {
        non_empty(self.tx_hash.as_deref())
    }

    pub fn proposal_hash(&self) -> Option<&str> {
        non_empty(self.safe_tx_hash.as_deref())
    }

    pub fn hash(&self) -> Result<&str> {
        self.direct_hash()
            .ok_or_else(|| VerifierError::InvalidTransactionHash(String::new()))
    }

    pub fn token_address(&self) -> Option<&str> {
        non_empty(self.token_address.as_deref())
    }

    /// Whether the direct hash has to be looked up from a Safe proposal first.
    pub fn needs_resolution(&self) -> bool {
        self.direct_hash().is_none() && self.proposal_hash().is_some()
    }

    pub fn with_hash(&self, hash: impl Into<String>) -> Self {
        Self {
            tx_hash: Some(hash.into()),
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionStatus {
    Success,
    Failed,
    Pending,
}

/// What a chain reader observed on-chain for one transaction hash.
///
/// `amount` is always in display units, already scaled by the asset's decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionFacts {
    pub hash: String,
    pub amount: f64,
    pub from: String,
    pub to: String,
    pub currency: String,
    pub timestamp: i64,
    pub status: TransactionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nonce: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_used: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gas_price: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationFailure {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl From<&VerifierError> for VerificationFailure {
    fn from(err: &VerifierError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
            details: err.details(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum VerificationResult {
    Verified(TransactionFacts),
    Rejected(VerificationFailure),
}

impl VerificationResult {
    pub fn is_verified(&self) -> bool {
        matches!(self, VerificationResult::Verified(_))
    }

    pub fn facts(&self) -> Option<&TransactionFacts> {
        match self {
            VerificationResult::Verified(facts) => Some(facts),
            VerificationResult::Rejected(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&VerificationFailure> {
        match self {
            VerificationResult::Verified(_) => None,
            VerificationResult::Rejected(failure) => Some(failure),
        }
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        self.failure().map(|failure| failure.code)
    }
}

impl From<VerifierError> for VerificationResult {
    fn from(err: VerifierError) -> Self {
        VerificationResult::Rejected(VerificationFailure::from(&err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_expectation_wire_format() {
        let expectation: TransactionExpectation = serde_json::from_value(json!({
            "txHash": "0xabc",
            "networkId": 1,
            "symbol": "ETH",
            "fromAddress": "0x1",
            "toAddress": "0x2",
            "amount": 1.5,
            "timestamp": 1700000000,
            "chainType": "EVM",
            "importedFromDraftOrBackupService": true
        }))
        .unwrap();

        assert_eq!(expectation.direct_hash(), Some("0xabc"));
        assert_eq!(expectation.chain_type, Some(ChainFamily::Evm));
        assert!(expectation.skip_timestamp_check);
        assert!(!expectation.is_swap);
        assert!(!expectation.needs_resolution());
    }

    #[test]
    fn test_blank_hash_needs_resolution() {
        let expectation = TransactionExpectation {
            tx_hash: Some("  ".into()),
            safe_tx_hash: Some("0xsafe".into()),
            ..Default::default()
        };

        assert!(expectation.needs_resolution());
        assert!(matches!(
            expectation.hash(),
            Err(VerifierError::InvalidTransactionHash(_))
        ));

        let resolved = expectation.with_hash("0xresolved");
        assert_eq!(resolved.hash().unwrap(), "0xresolved");
        assert_eq!(expectation.direct_hash(), None);
    }

    #[test]
    fn test_rejection_carries_code_and_details() {
        let result = VerificationResult::from(VerifierError::TransactionNotFound {
            hash: "0xabc".into(),
            network_id: 1,
        });

        assert!(!result.is_verified());
        assert_eq!(result.error_code(), Some(ErrorCode::TransactionNotFound));
        let failure = result.failure().unwrap();
        assert_eq!(failure.details.as_ref().unwrap()["networkId"], 1);
    }
}
