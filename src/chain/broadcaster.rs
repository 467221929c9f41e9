//! Transaction broadcast with bounded retry and typed rejection handling.
//!
//! # Responsibilities
//! - Submit signed payloads to the chain endpoint
//! - Retry transient transport failures with jittered exponential backoff
//! - Return immediately on definitive rejections with a typed reason
//! - Treat "already known" responses as success
//! - Drive QUEUED → SUBMITTED transitions and the attempt counter
//! - Apply the nonce commit/release policy on success and rejection

use alloy::primitives::{keccak256, Address, TxHash};
use std::sync::Arc;

use crate::chain::endpoint::{ChainEndpoint, SubmitOutcome};
use crate::chain::nonce::NonceManager;
use crate::chain::types::{
    BroadcastOutcome, ChainError, ChainKey, ChainResult, RejectReason, TxStatus,
};
use crate::config::schema::BroadcastConfig;
use crate::observability::metrics;
use crate::resilience::backoff::backoff_delay;

/// Submits signed transactions and settles their nonce bookkeeping.
pub struct TransactionBroadcaster {
    config: BroadcastConfig,
    nonces: Arc<NonceManager>,
}

impl TransactionBroadcaster {
    pub fn new(config: BroadcastConfig, nonces: Arc<NonceManager>) -> Self {
        Self { config, nonces }
    }

    /// Broadcast a signed transaction.
    ///
    /// `address` and `nonce` are supplied for nonce-based chains so the
    /// outcome can be committed or released; sequencerless chains pass
    /// `None` and bypass nonce bookkeeping entirely.
    ///
    /// Returns `Ok` with `accepted = false` for definitive rejections.
    /// `Err(StaleNonce)` signals the nonce was already used on-chain and
    /// the local counter has been resynced; `Err(BroadcastTransient)`
    /// means the retry budget was exhausted without a definitive answer.
    pub async fn broadcast(
        &self,
        key: &ChainKey,
        endpoint: &dyn ChainEndpoint,
        raw_tx: &[u8],
        address: Option<Address>,
        nonce: Option<u64>,
    ) -> ChainResult<BroadcastOutcome> {
        let local_hash: TxHash = keccak256(raw_tx);
        self.nonces.track(local_hash, key, address, nonce);

        let max_attempts = self.config.max_attempts.max(1);
        let mut last_err = String::new();

        for attempt in 1..=max_attempts {
            self.nonces.record_attempt(&local_hash);

            match endpoint.submit(raw_tx).await {
                Ok(SubmitOutcome::Accepted { tx_hash })
                | Ok(SubmitOutcome::AlreadyKnown { tx_hash }) => {
                    self.nonces.transition(&tx_hash, TxStatus::Submitted);
                    if let (Some(addr), Some(n)) = (address, nonce) {
                        self.nonces.commit(key, addr, n).await;
                    }
                    metrics::record_broadcast(key.chain(), true, attempt);
                    tracing::info!(chain = %key, tx_hash = %tx_hash, attempt, "transaction submitted");
                    return Ok(BroadcastOutcome {
                        tx_hash: format!("{tx_hash:#x}"),
                        accepted: true,
                        reason: None,
                        message: None,
                    });
                }
                Ok(SubmitOutcome::Rejected { reason, message }) => {
                    self.nonces.transition(&local_hash, TxStatus::Failed);
                    metrics::record_broadcast(key.chain(), false, attempt);
                    tracing::warn!(
                        chain = %key,
                        tx_hash = %local_hash,
                        %reason,
                        message = %message,
                        "broadcast rejected"
                    );

                    if let (Some(addr), Some(n)) = (address, nonce) {
                        if reason == RejectReason::NonceTooLow {
                            self.nonces.resync(key, addr, endpoint).await?;
                            return Err(ChainError::StaleNonce {
                                key: key.clone(),
                                address: addr.to_string(),
                                nonce: n,
                            });
                        }
                        self.nonces.release(key, addr, n, endpoint).await?;
                    }
                    return Ok(BroadcastOutcome {
                        tx_hash: format!("{local_hash:#x}"),
                        accepted: false,
                        reason: Some(reason),
                        message: Some(message),
                    });
                }
                Err(e) => {
                    last_err = e.to_string();
                    tracing::warn!(
                        chain = %key,
                        tx_hash = %local_hash,
                        attempt,
                        error = %last_err,
                        "broadcast attempt failed"
                    );
                    if attempt < max_attempts {
                        let delay = backoff_delay(
                            attempt,
                            self.config.base_delay_ms,
                            self.config.max_delay_ms,
                        );
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        // The payload may or may not have reached a node, so the nonce
        // stays pending; a later resync or cancel settles it.
        metrics::record_broadcast(key.chain(), false, max_attempts);
        Err(ChainError::BroadcastTransient {
            attempts: max_attempts,
            message: last_err,
        })
    }
}
