//! Broadcast retry policy and the poll lifecycle state machine.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use alloy::primitives::keccak256;
use chain_gateway::chain::broadcaster::TransactionBroadcaster;
use chain_gateway::chain::endpoint::TxReceipt;
use chain_gateway::chain::nonce::NonceManager;
use chain_gateway::chain::poller::StatusPoller;
use chain_gateway::chain::types::{ChainError, RejectReason, TxStatus};
use chain_gateway::config::{BroadcastConfig, NonceConfig, PollConfig};

mod common;
use common::{addr, test_key, MockEndpoint, ScriptedSubmit};

fn fast_broadcast_config() -> BroadcastConfig {
    BroadcastConfig {
        max_attempts: 3,
        base_delay_ms: 1,
        max_delay_ms: 2,
    }
}

fn nonces() -> Arc<NonceManager> {
    Arc::new(NonceManager::new(NonceConfig {
        resync_interval_secs: 3600,
    }))
}

fn poller(nonces: Arc<NonceManager>) -> StatusPoller {
    StatusPoller::new(
        PollConfig {
            drop_age_secs: 180,
            cache_ttl_ms: 0,
            retention_secs: 3600,
            prune_interval_secs: 60,
        },
        nonces,
    )
}

#[tokio::test]
async fn transient_failures_are_retried_until_accepted() {
    let nonces = nonces();
    let broadcaster = TransactionBroadcaster::new(fast_broadcast_config(), nonces.clone());
    let endpoint = MockEndpoint::with_chain_nonce(5);
    endpoint.script([
        ScriptedSubmit::Transient("connection refused"),
        ScriptedSubmit::Transient("connection reset"),
        ScriptedSubmit::Accept,
    ]);
    let key = test_key();
    let address = addr(0x01);

    let nonce = nonces.allocate(&key, address, &endpoint).await.unwrap();
    let outcome = broadcaster
        .broadcast(&key, &endpoint, b"payload", Some(address), Some(nonce))
        .await
        .unwrap();

    assert!(outcome.accepted);
    assert_eq!(endpoint.submit_calls.load(Ordering::SeqCst), 3);
    // The nonce was committed, so the next allocation advances.
    assert_eq!(nonces.allocate(&key, address, &endpoint).await.unwrap(), 6);
}

#[tokio::test]
async fn definitive_rejection_is_not_retried_and_releases_nonce() {
    let nonces = nonces();
    let broadcaster = TransactionBroadcaster::new(fast_broadcast_config(), nonces.clone());
    let endpoint = MockEndpoint::with_chain_nonce(7);
    endpoint.script([ScriptedSubmit::Reject(
        RejectReason::InsufficientFunds,
        "insufficient funds for gas * price + value",
    )]);
    let key = test_key();
    let address = addr(0x02);

    let nonce = nonces.allocate(&key, address, &endpoint).await.unwrap();
    assert_eq!(nonce, 7);

    let outcome = broadcaster
        .broadcast(&key, &endpoint, b"payload", Some(address), Some(nonce))
        .await
        .unwrap();

    assert!(!outcome.accepted);
    assert_eq!(outcome.reason, Some(RejectReason::InsufficientFunds));
    assert_eq!(endpoint.submit_calls.load(Ordering::SeqCst), 1);
    // Released back to the pool: the same nonce is handed out again.
    assert_eq!(nonces.allocate(&key, address, &endpoint).await.unwrap(), 7);
}

#[tokio::test]
async fn already_known_counts_as_success() {
    let nonces = nonces();
    let broadcaster = TransactionBroadcaster::new(fast_broadcast_config(), nonces.clone());
    let endpoint = MockEndpoint::new();
    endpoint.script([ScriptedSubmit::Accept, ScriptedSubmit::AlreadyKnown]);
    let key = test_key();
    let address = addr(0x03);

    let nonce = nonces.allocate(&key, address, &endpoint).await.unwrap();
    let first = broadcaster
        .broadcast(&key, &endpoint, b"payload", Some(address), Some(nonce))
        .await
        .unwrap();
    let second = broadcaster
        .broadcast(&key, &endpoint, b"payload", Some(address), Some(nonce))
        .await
        .unwrap();

    assert!(first.accepted);
    assert!(second.accepted);
    // Byte-identical payloads resolve to one logical transaction.
    assert_eq!(first.tx_hash, second.tx_hash);
}

#[tokio::test]
async fn nonce_too_low_resyncs_and_signals_stale_nonce() {
    let nonces = nonces();
    let broadcaster = TransactionBroadcaster::new(fast_broadcast_config(), nonces.clone());
    let endpoint = MockEndpoint::with_chain_nonce(4);
    endpoint.script([ScriptedSubmit::Reject(
        RejectReason::NonceTooLow,
        "nonce too low: next nonce 9",
    )]);
    let key = test_key();
    let address = addr(0x04);

    let nonce = nonces.allocate(&key, address, &endpoint).await.unwrap();
    assert_eq!(nonce, 4);

    // The chain has moved on; resync should adopt its value.
    endpoint.chain_nonce.store(9, Ordering::SeqCst);
    let err = broadcaster
        .broadcast(&key, &endpoint, b"payload", Some(address), Some(nonce))
        .await
        .unwrap_err();

    assert!(matches!(err, ChainError::StaleNonce { .. }));
    assert_eq!(nonces.allocate(&key, address, &endpoint).await.unwrap(), 9);
}

#[tokio::test]
async fn exhausted_retries_surface_transient_error() {
    let nonces = nonces();
    let broadcaster = TransactionBroadcaster::new(fast_broadcast_config(), nonces.clone());
    let endpoint = MockEndpoint::new();
    endpoint.script([
        ScriptedSubmit::Transient("timeout"),
        ScriptedSubmit::Transient("timeout"),
        ScriptedSubmit::Transient("timeout"),
    ]);
    let key = test_key();

    let err = broadcaster
        .broadcast(&key, &endpoint, b"payload", None, None)
        .await
        .unwrap_err();

    match err {
        ChainError::BroadcastTransient { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("expected BroadcastTransient, got {other:?}"),
    }
    assert_eq!(endpoint.submit_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn poll_reports_confirmed_at_required_depth() {
    let nonces = nonces();
    let poller = poller(nonces.clone());
    let endpoint = MockEndpoint::new();
    let key = test_key();
    let tx_hash = keccak256(b"mined");

    endpoint.set_receipt(
        tx_hash,
        TxReceipt {
            success: true,
            block_number: Some(90),
        },
    );
    endpoint.set_head_block(100);

    let result = poller.poll(&key, &endpoint, tx_hash, 3).await.unwrap();
    assert_eq!(result.status, TxStatus::Confirmed);
    assert_eq!(result.confirmations, 11);
}

#[tokio::test]
async fn poll_reports_submitted_below_required_depth() {
    let nonces = nonces();
    let poller = poller(nonces.clone());
    let endpoint = MockEndpoint::new();
    let key = test_key();
    let tx_hash = keccak256(b"fresh");

    endpoint.set_receipt(
        tx_hash,
        TxReceipt {
            success: true,
            block_number: Some(100),
        },
    );
    endpoint.set_head_block(100);

    let result = poller.poll(&key, &endpoint, tx_hash, 3).await.unwrap();
    assert_eq!(result.status, TxStatus::Submitted);
    assert_eq!(result.confirmations, 1);
}

#[tokio::test]
async fn reverted_receipt_is_terminally_failed() {
    let nonces = nonces();
    let poller = poller(nonces.clone());
    let endpoint = MockEndpoint::new();
    let key = test_key();
    let tx_hash = keccak256(b"reverted");

    endpoint.set_receipt(
        tx_hash,
        TxReceipt {
            success: false,
            block_number: Some(50),
        },
    );
    endpoint.set_head_block(60);

    let first = poller.poll(&key, &endpoint, tx_hash, 1).await.unwrap();
    assert_eq!(first.status, TxStatus::Failed);

    // Even if the chain later claims success, the terminal state holds.
    endpoint.set_receipt(
        tx_hash,
        TxReceipt {
            success: true,
            block_number: Some(50),
        },
    );
    let second = poller.poll(&key, &endpoint, tx_hash, 1).await.unwrap();
    assert_eq!(second.status, TxStatus::Failed);
}

#[tokio::test]
async fn tracked_transaction_without_receipt_is_still_submitted() {
    let nonces = nonces();
    let broadcaster = TransactionBroadcaster::new(fast_broadcast_config(), nonces.clone());
    let poller = poller(nonces.clone());
    let endpoint = MockEndpoint::new();
    let key = test_key();

    let outcome = broadcaster
        .broadcast(&key, &endpoint, b"in flight", None, None)
        .await
        .unwrap();
    assert!(outcome.accepted);

    let tx_hash = keccak256(b"in flight");
    let result = poller.poll(&key, &endpoint, tx_hash, 1).await.unwrap();
    assert_eq!(result.status, TxStatus::Submitted);
    assert_eq!(result.confirmations, 0);
}

#[tokio::test]
async fn unknown_transaction_is_submitted_until_drop_age() {
    let nonces = nonces();
    let poller = poller(nonces.clone());
    let endpoint = MockEndpoint::new();
    let key = test_key();
    let tx_hash = keccak256(b"sent elsewhere");

    // Never broadcast through this process: the drop clock starts at
    // first observation, so the transaction is still pending.
    let first = poller.poll(&key, &endpoint, tx_hash, 1).await.unwrap();
    assert_eq!(first.status, TxStatus::Submitted);
    assert_eq!(first.confirmations, 0);

    // A receipt surfacing later must not be masked.
    endpoint.set_receipt(
        tx_hash,
        TxReceipt {
            success: true,
            block_number: Some(10),
        },
    );
    endpoint.set_head_block(20);
    let second = poller.poll(&key, &endpoint, tx_hash, 1).await.unwrap();
    assert_eq!(second.status, TxStatus::Confirmed);
    assert_eq!(second.confirmations, 11);
}

#[tokio::test]
async fn receiptless_transaction_drops_after_threshold() {
    let nonces = nonces();
    let poller = StatusPoller::new(
        PollConfig {
            drop_age_secs: 0,
            cache_ttl_ms: 0,
            retention_secs: 3600,
            prune_interval_secs: 60,
        },
        nonces.clone(),
    );
    let endpoint = MockEndpoint::new();
    let key = test_key();
    let tx_hash = keccak256(b"vanished");

    let first = poller.poll(&key, &endpoint, tx_hash, 1).await.unwrap();
    assert_eq!(first.status, TxStatus::Submitted);

    // Threshold elapsed since first observation.
    let second = poller.poll(&key, &endpoint, tx_hash, 1).await.unwrap();
    assert_eq!(second.status, TxStatus::Dropped);

    // Terminal, even if a receipt appears afterwards.
    endpoint.set_receipt(
        tx_hash,
        TxReceipt {
            success: true,
            block_number: Some(5),
        },
    );
    let third = poller.poll(&key, &endpoint, tx_hash, 1).await.unwrap();
    assert_eq!(third.status, TxStatus::Dropped);
}
