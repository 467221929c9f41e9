//! Chain-agnostic types and error definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Identifies a (chain, network) pair, e.g. ("ethereum", "mainnet").
///
/// Keys are case-normalized on construction so lookups are insensitive to
/// how callers spell the chain or network name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChainKey {
    chain: String,
    network: String,
}

impl ChainKey {
    /// Create a normalized key from a chain and network name.
    pub fn new(chain: &str, network: &str) -> Self {
        Self {
            chain: chain.trim().to_ascii_lowercase(),
            network: network.trim().to_ascii_lowercase(),
        }
    }

    pub fn chain(&self) -> &str {
        &self.chain
    }

    pub fn network(&self) -> &str {
        &self.network
    }
}

impl fmt::Display for ChainKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.chain, self.network)
    }
}

/// Chain family, determining which transaction semantics apply.
///
/// Nonce management only applies to `Evm`-style chains; `Sequencerless`
/// chains deduplicate by signature and broadcast directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChainFamily {
    #[default]
    Evm,
    Sequencerless,
}

impl ChainFamily {
    /// Whether transactions on this family carry a per-sender nonce.
    pub fn uses_nonces(&self) -> bool {
        matches!(self, ChainFamily::Evm)
    }
}

/// Lifecycle state of a transaction as observed by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxStatus {
    /// Nonce allocated, not yet accepted at the network level.
    Queued,
    /// Accepted by a node, no receipt (or insufficient confirmations) yet.
    Submitted,
    /// Receipt observed with the required confirmation depth.
    Confirmed,
    /// Receipt observed indicating revert or execution error.
    Failed,
    /// No receipt after the drop-age threshold; evicted from the pool.
    Dropped,
}

impl TxStatus {
    /// Terminal states never change on subsequent polls.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TxStatus::Confirmed | TxStatus::Failed | TxStatus::Dropped)
    }
}

impl fmt::Display for TxStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TxStatus::Queued => "QUEUED",
            TxStatus::Submitted => "SUBMITTED",
            TxStatus::Confirmed => "CONFIRMED",
            TxStatus::Failed => "FAILED",
            TxStatus::Dropped => "DROPPED",
        };
        f.write_str(s)
    }
}

/// Result of a status poll for a single transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResult {
    pub tx_hash: String,
    pub status: TxStatus,
    pub confirmations: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

/// Typed reason for a definitive chain-level rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    NonceTooLow,
    Underpriced,
    InsufficientFunds,
    Malformed,
    Other,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RejectReason::NonceTooLow => "nonce_too_low",
            RejectReason::Underpriced => "underpriced",
            RejectReason::InsufficientFunds => "insufficient_funds",
            RejectReason::Malformed => "malformed",
            RejectReason::Other => "other",
        };
        f.write_str(s)
    }
}

/// Outcome of a broadcast attempt sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastOutcome {
    pub tx_hash: String,
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectReason>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Errors that can occur during gateway chain operations.
#[derive(Debug, Error)]
pub enum ChainError {
    /// Requested (chain, network) pair is not registered. Not retried.
    #[error("unknown chain {0}")]
    UnknownChain(ChainKey),

    /// Connection initialization failed; safe to retry the whole request.
    #[error("connection init failed for {key}: {message}")]
    ConnectionInitFailed { key: ChainKey, message: String },

    /// Chain reported a submitted nonce as already used.
    #[error("stale nonce {nonce} for {address} on {key}")]
    StaleNonce {
        key: ChainKey,
        address: String,
        nonce: u64,
    },

    /// Definitive chain-level rejection; never retried.
    #[error("broadcast rejected ({reason}): {message}")]
    BroadcastRejected {
        reason: RejectReason,
        message: String,
    },

    /// Network or timeout failure that exhausted the retry budget.
    #[error("broadcast failed after {attempts} attempts: {message}")]
    BroadcastTransient { attempts: u32, message: String },

    /// RPC connection or request failed.
    #[error("rpc error: {0}")]
    Rpc(String),

    /// RPC request timed out.
    #[error("rpc timeout after {0:?}")]
    Timeout(Duration),

    /// Signer unavailable or signing failed.
    #[error("wallet error: {0}")]
    Wallet(String),
}

impl ChainError {
    /// Whether a caller may safely retry the whole request.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ChainError::ConnectionInitFailed { .. }
                | ChainError::BroadcastTransient { .. }
                | ChainError::Rpc(_)
                | ChainError::Timeout(_)
        )
    }
}

/// Result type for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;
