//! Receipt polling and the transaction lifecycle state machine.
//!
//! # State machine
//! ```text
//! QUEUED → SUBMITTED        broadcaster got network-level acceptance
//! SUBMITTED → CONFIRMED     receipt observed at required confirmation depth
//! SUBMITTED → FAILED        receipt observed indicating revert
//! SUBMITTED → DROPPED       no receipt after the drop-age threshold
//! ```
//! Terminal states are sticky: once recorded, later polls return the same
//! status without re-querying the chain.

use alloy::primitives::TxHash;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::chain::endpoint::ChainEndpoint;
use crate::chain::nonce::NonceManager;
use crate::chain::types::{ChainKey, ChainResult, PollResult, TxStatus};
use crate::config::schema::PollConfig;
use crate::observability::metrics;

struct CachedPoll {
    result: PollResult,
    at: Instant,
}

/// Maps raw chain receipts onto the stable lifecycle enum.
pub struct StatusPoller {
    config: PollConfig,
    nonces: Arc<NonceManager>,
    /// Terminal results, kept so repeat polls are answered locally.
    terminal: DashMap<TxHash, PollResult>,
    /// Short-lived cache absorbing redundant polls for live transactions.
    recent: DashMap<TxHash, CachedPoll>,
}

impl StatusPoller {
    pub fn new(config: PollConfig, nonces: Arc<NonceManager>) -> Self {
        Self {
            config,
            nonces,
            terminal: DashMap::new(),
            recent: DashMap::new(),
        }
    }

    /// Poll the chain for the status of `tx_hash`.
    ///
    /// Pure read apart from caching: absence of a receipt is not an error,
    /// it means the transaction is still pending until the drop-age
    /// threshold elapses.
    pub async fn poll(
        &self,
        key: &ChainKey,
        endpoint: &dyn ChainEndpoint,
        tx_hash: TxHash,
        required_confirmations: u32,
    ) -> ChainResult<PollResult> {
        if let Some(result) = self.terminal.get(&tx_hash) {
            return Ok(result.clone());
        }
        if let Some(cached) = self.recent.get(&tx_hash) {
            if cached.at.elapsed() < Duration::from_millis(self.config.cache_ttl_ms) {
                return Ok(cached.result.clone());
            }
        }

        let result = match endpoint.fetch_receipt(tx_hash).await? {
            Some(receipt) => {
                let head = endpoint.block_number().await?;
                let confirmations = receipt
                    .block_number
                    .map(|b| head.saturating_sub(b) + 1)
                    .unwrap_or(0);

                if !receipt.success {
                    self.settle(
                        key,
                        tx_hash,
                        TxStatus::Failed,
                        confirmations,
                        Some("transaction reverted".to_string()),
                    )
                } else if confirmations >= u64::from(required_confirmations) {
                    self.settle(key, tx_hash, TxStatus::Confirmed, confirmations, None)
                } else {
                    PollResult {
                        tx_hash: format!("{tx_hash:#x}"),
                        status: TxStatus::Submitted,
                        confirmations,
                        error_message: None,
                    }
                }
            }
            None => {
                let drop_age = Duration::from_secs(self.config.drop_age_secs);
                match self.nonces.tracked(&tx_hash) {
                    Some(tracked) if tracked.submitted_at.elapsed() < drop_age => PollResult {
                        tx_hash: format!("{tx_hash:#x}"),
                        status: TxStatus::Submitted,
                        confirmations: 0,
                        error_message: None,
                    },
                    Some(_) => self.settle(
                        key,
                        tx_hash,
                        TxStatus::Dropped,
                        0,
                        Some("transaction not found on chain".to_string()),
                    ),
                    // First sight of a hash this process never broadcast
                    // (sent externally, or before a restart): start the
                    // drop clock at this observation and report it
                    // pending until the threshold elapses.
                    None => {
                        self.nonces.track(tx_hash, key, None, None);
                        self.nonces.transition(&tx_hash, TxStatus::Submitted);
                        PollResult {
                            tx_hash: format!("{tx_hash:#x}"),
                            status: TxStatus::Submitted,
                            confirmations: 0,
                            error_message: None,
                        }
                    }
                }
            }
        };

        metrics::record_poll(key.chain(), &result.status.to_string());
        if !result.status.is_terminal() {
            self.recent.insert(
                tx_hash,
                CachedPoll {
                    result: result.clone(),
                    at: Instant::now(),
                },
            );
        }
        Ok(result)
    }

    /// Record a terminal result and mirror it into the pending table.
    fn settle(
        &self,
        key: &ChainKey,
        tx_hash: TxHash,
        status: TxStatus,
        confirmations: u64,
        error_message: Option<String>,
    ) -> PollResult {
        let result = PollResult {
            tx_hash: format!("{tx_hash:#x}"),
            status,
            confirmations,
            error_message,
        };
        self.nonces.transition(&tx_hash, status);
        self.terminal.insert(tx_hash, result.clone());
        self.recent.remove(&tx_hash);
        tracing::info!(chain = %key, tx_hash = %tx_hash, %status, "transaction reached terminal state");
        result
    }

    /// Drop expired cache entries and stale terminal results, alongside
    /// the pending-transaction prune.
    pub fn prune(&self) {
        let ttl = Duration::from_millis(self.config.cache_ttl_ms);
        self.recent.retain(|_, cached| cached.at.elapsed() <= ttl);
        // The terminal map is bounded by the pending table's retention:
        // anything no longer tracked there is safe to forget here.
        self.terminal
            .retain(|hash, _| self.nonces.tracked(hash).is_some());
    }
}
