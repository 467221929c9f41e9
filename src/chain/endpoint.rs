//! Chain endpoint capability interface.
//!
//! Everything the nonce, broadcast and poll subsystems need from a chain is
//! expressed through [`ChainEndpoint`]: fetch the authoritative nonce,
//! submit a raw signed transaction, fetch a receipt, read the head block.
//! The production implementation ([`crate::chain::client::ChainClient`])
//! wraps alloy providers; tests substitute scripted mocks.

use alloy::primitives::{Address, TxHash};
use async_trait::async_trait;

use crate::chain::types::{ChainFamily, ChainResult, RejectReason};

/// Slim receipt view, decoupled from any one SDK's receipt type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxReceipt {
    /// True when the transaction executed without reverting.
    pub success: bool,
    /// Block the transaction was included in, when known.
    pub block_number: Option<u64>,
}

/// Classification of a submission response at the endpoint boundary.
///
/// Transport-level failures (timeouts, connection errors) are returned as
/// `Err(ChainError::Rpc | Timeout)` and treated as transient; everything
/// the node answered definitively lands here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The node accepted the transaction into its pool.
    Accepted { tx_hash: TxHash },
    /// The node already knows this exact payload. Counts as success: the
    /// nonce+signature pair is the deduplication key.
    AlreadyKnown { tx_hash: TxHash },
    /// Definitive rejection; retrying the same payload cannot succeed.
    Rejected {
        reason: RejectReason,
        message: String,
    },
}

/// Capabilities a chain network must provide to the gateway core.
#[async_trait]
pub trait ChainEndpoint: Send + Sync {
    /// The chain family this endpoint speaks.
    fn family(&self) -> ChainFamily;

    /// Chain-authoritative next nonce for `address`.
    async fn fetch_nonce(&self, address: Address) -> ChainResult<u64>;

    /// Submit a raw signed transaction to the chain's acceptance endpoint.
    async fn submit(&self, raw_tx: &[u8]) -> ChainResult<SubmitOutcome>;

    /// Fetch the receipt for a transaction, if one exists yet.
    async fn fetch_receipt(&self, tx_hash: TxHash) -> ChainResult<Option<TxReceipt>>;

    /// Current head block number.
    async fn block_number(&self) -> ChainResult<u64>;

    /// Current gas price in wei. Used by the cancel/replace flow.
    async fn gas_price(&self) -> ChainResult<u128>;
}

/// Map a node rejection message onto a typed reason.
///
/// Node error strings are not standardized across clients; this matches the
/// substrings geth/erigon/reth and common RPC gateways emit.
pub fn classify_rejection(message: &str) -> Option<RejectReason> {
    let msg = message.to_ascii_lowercase();
    if msg.contains("nonce too low") || msg.contains("nonce is too low") {
        Some(RejectReason::NonceTooLow)
    } else if msg.contains("underpriced") || msg.contains("fee cap") || msg.contains("gas price below")
    {
        Some(RejectReason::Underpriced)
    } else if msg.contains("insufficient funds") || msg.contains("insufficient balance") {
        Some(RejectReason::InsufficientFunds)
    } else if msg.contains("invalid") || msg.contains("malformed") || msg.contains("rlp") {
        Some(RejectReason::Malformed)
    } else if msg.contains("exceeds block gas limit") || msg.contains("oversized") {
        Some(RejectReason::Other)
    } else {
        None
    }
}

/// Whether a node response means "this payload is already in the pool".
pub fn is_already_known(message: &str) -> bool {
    let msg = message.to_ascii_lowercase();
    msg.contains("already known")
        || msg.contains("already imported")
        || msg.contains("known transaction")
        || msg.contains("duplicate transaction")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_common_rejections() {
        assert_eq!(
            classify_rejection("nonce too low: next nonce 7"),
            Some(RejectReason::NonceTooLow)
        );
        assert_eq!(
            classify_rejection("replacement transaction underpriced"),
            Some(RejectReason::Underpriced)
        );
        assert_eq!(
            classify_rejection("insufficient funds for gas * price + value"),
            Some(RejectReason::InsufficientFunds)
        );
        assert_eq!(
            classify_rejection("rlp: expected input list"),
            Some(RejectReason::Malformed)
        );
        assert_eq!(classify_rejection("connection reset by peer"), None);
    }

    #[test]
    fn recognizes_already_known_variants() {
        assert!(is_already_known("already known"));
        assert!(is_already_known("known transaction: 0xabc"));
        assert!(!is_already_known("nonce too low"));
    }
}
