use crate::chains::ChainRegistry;
use crate::error::{BatchError, Result, VerifierError};
use crate::models::{
    TransactionExpectation, TransactionFacts, TransactionStatus, VerificationResult,
};
use crate::services::SafeResolver;
use crate::validation::{close_to, is_timestamp_valid, normalize_address};
use futures::future::join_all;
use std::borrow::Cow;
use std::sync::Arc;

pub const MAX_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerificationSettings {
    /// Relative margin allowed between observed and expected amounts.
    pub amount_delta: f64,
    pub time_threshold_secs: i64,
}

impl Default for VerificationSettings {
    fn default() -> Self {
        Self {
            amount_delta: 0.001,
            time_threshold_secs: 3600,
        }
    }
}

/// Checks caller claims about payments against what the chains recorded.
pub struct VerificationService {
    registry: Arc<ChainRegistry>,
    safe: Arc<dyn SafeResolver>,
    settings: VerificationSettings,
}

impl VerificationService {
    pub fn new(
        registry: Arc<ChainRegistry>,
        safe: Arc<dyn SafeResolver>,
        settings: VerificationSettings,
    ) -> Self {
        Self {
            registry,
            safe,
            settings,
        }
    }

    pub fn settings(&self) -> VerificationSettings {
        self.settings
    }

    pub fn registry(&self) -> &Arc<ChainRegistry> {
        &self.registry
    }

    pub async fn verify(&self, expectation: &TransactionExpectation) -> VerificationResult {
        let label = expectation
            .direct_hash()
            .or(expectation.proposal_hash())
            .unwrap_or_default()
            .to_string();

        tracing::info!(
            tx_hash = %label,
            network_id = expectation.network_id,
            symbol = %expectation.symbol,
            "Verifying transaction"
        );

        match self.try_verify(expectation).await {
            Ok(facts) => {
                tracing::info!(
                    tx_hash = %facts.hash,
                    amount = facts.amount,
                    "Transaction verified"
                );
                VerificationResult::Verified(facts)
            }
            Err(e) => {
                let code = e.code();
                match &e {
                    VerifierError::Rpc(_)
                    | VerifierError::Http(_)
                    | VerifierError::Network(_)
                    | VerifierError::Config(_) => {
                        tracing::error!(
                            tx_hash = %label,
                            error_code = %code,
                            "Verification failed: {}",
                            e
                        )
                    }
                    _ => tracing::warn!(
                        tx_hash = %label,
                        error_code = %code,
                        "Verification rejected: {}",
                        e
                    ),
                }
                VerificationResult::from(e)
            }
        }
    }

    async fn try_verify(&self, expectation: &TransactionExpectation) -> Result<TransactionFacts> {
        let expectation = self.resolve_hash(expectation).await?;
        let facts = self.registry.get_facts(&expectation).await?;
        ensure_settled(&facts, expectation.network_id)?;

        if expectation.is_swap {
            let recipient = expectation.to_address.trim();
            let delivered = self
                .registry
                .transfers_to(
                    &facts.hash,
                    expectation.network_id,
                    expectation.chain_type,
                    recipient,
                )
                .await?;

            if !delivered {
                return Err(VerifierError::SwapValidationFailed {
                    hash: facts.hash,
                    recipient: recipient.to_string(),
                });
            }
            return Ok(facts);
        }

        reconcile(facts, &expectation, &self.settings)
    }

    async fn resolve_hash<'a>(
        &self,
        expectation: &'a TransactionExpectation,
    ) -> Result<Cow<'a, TransactionExpectation>> {
        if expectation.direct_hash().is_some() {
            return Ok(Cow::Borrowed(expectation));
        }

        let Some(proposal_hash) = expectation.proposal_hash() else {
            return Err(VerifierError::InvalidTransactionHash(String::new()));
        };

        let resolved = self
            .safe
            .executed_transaction_hash(proposal_hash, expectation.network_id)
            .await?
            .ok_or_else(|| VerifierError::ProposalNotExecuted {
                proposal_hash: proposal_hash.to_string(),
                network_id: expectation.network_id,
            })?;

        tracing::debug!(
            safe_tx_hash = %proposal_hash,
            tx_hash = %resolved,
            "Resolved Safe proposal"
        );
        Ok(Cow::Owned(expectation.with_hash(resolved)))
    }

    /// Verifies up to [`MAX_BATCH_SIZE`] expectations concurrently, results in input order.
    pub async fn verify_batch(
        &self,
        expectations: &[TransactionExpectation],
    ) -> std::result::Result<Vec<VerificationResult>, BatchError> {
        if expectations.is_empty() {
            return Err(BatchError::Empty);
        }
        if expectations.len() > MAX_BATCH_SIZE {
            return Err(BatchError::TooLarge {
                size: expectations.len(),
                max: MAX_BATCH_SIZE,
            });
        }

        let results = join_all(expectations.iter().map(|e| self.verify(e))).await;

        let verified = results.iter().filter(|r| r.is_verified()).count();
        tracing::info!(
            total = results.len(),
            verified,
            rejected = results.len() - verified,
            "Batch verification completed"
        );

        Ok(results)
    }

    pub async fn timestamp(&self, hash: &str, network_id: u64) -> Result<i64> {
        self.registry.get_timestamp(hash, network_id).await
    }
}

/// Only mined, successful transactions can be verified.
fn ensure_settled(facts: &TransactionFacts, network_id: u64) -> Result<()> {
    match facts.status {
        TransactionStatus::Success => Ok(()),
        TransactionStatus::Pending => Err(VerifierError::TransactionNotFound {
            hash: facts.hash.clone(),
            network_id,
        }),
        TransactionStatus::Failed => Err(VerifierError::TransactionFailed {
            hash: facts.hash.clone(),
            network_id,
        }),
    }
}

/// Compares observed facts with the expectation: recipient, sender, amount, then age.
pub fn reconcile(
    facts: TransactionFacts,
    expectation: &TransactionExpectation,
    settings: &VerificationSettings,
) -> Result<TransactionFacts> {
    let expected_to = normalize_address(&expectation.to_address);
    let actual_to = normalize_address(&facts.to);
    if actual_to != expected_to {
        return Err(VerifierError::RecipientMismatch {
            hash: facts.hash,
            expected: expected_to,
            actual: actual_to,
        });
    }

    let expected_from = normalize_address(&expectation.from_address);
    let actual_from = normalize_address(&facts.from);
    if actual_from != expected_from {
        return Err(VerifierError::SenderMismatch {
            hash: facts.hash,
            expected: expected_from,
            actual: actual_from,
        });
    }

    if !close_to(facts.amount, expectation.amount, settings.amount_delta) {
        return Err(VerifierError::AmountMismatch {
            hash: facts.hash,
            expected: expectation.amount,
            actual: facts.amount,
            delta: settings.amount_delta,
        });
    }

    if !expectation.skip_timestamp_check
        && !is_timestamp_valid(
            facts.timestamp,
            expectation.timestamp,
            settings.time_threshold_secs,
        )
    {
        return Err(VerifierError::TimestampTooOld {
            hash: facts.hash,
            expected: expectation.timestamp,
            actual: facts.timestamp,
            threshold: settings.time_threshold_secs,
        });
    }

    Ok(facts)
}
