//! Shared test fixtures: a scriptable chain endpoint.
#![allow(dead_code)]

use alloy::primitives::{keccak256, Address, TxHash};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;

use chain_gateway::chain::endpoint::{ChainEndpoint, SubmitOutcome, TxReceipt};
use chain_gateway::chain::types::{ChainError, ChainFamily, ChainKey, ChainResult, RejectReason};

/// One scripted response for a submit call.
#[derive(Debug, Clone)]
pub enum ScriptedSubmit {
    Accept,
    AlreadyKnown,
    Reject(RejectReason, &'static str),
    Transient(&'static str),
}

/// Chain endpoint with scriptable behavior and call counters.
#[derive(Default)]
pub struct MockEndpoint {
    pub chain_nonce: AtomicU64,
    pub head_block: AtomicU64,
    pub submit_script: Mutex<VecDeque<ScriptedSubmit>>,
    pub receipts: Mutex<HashMap<TxHash, TxReceipt>>,
    pub submit_calls: AtomicUsize,
    pub nonce_fetches: AtomicUsize,
}

impl MockEndpoint {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chain_nonce(nonce: u64) -> Self {
        let endpoint = Self::default();
        endpoint.chain_nonce.store(nonce, Ordering::SeqCst);
        endpoint
    }

    pub fn script(&self, responses: impl IntoIterator<Item = ScriptedSubmit>) {
        self.submit_script.lock().unwrap().extend(responses);
    }

    pub fn set_receipt(&self, tx_hash: TxHash, receipt: TxReceipt) {
        self.receipts.lock().unwrap().insert(tx_hash, receipt);
    }

    pub fn set_head_block(&self, block: u64) {
        self.head_block.store(block, Ordering::SeqCst);
    }
}

#[async_trait]
impl ChainEndpoint for MockEndpoint {
    fn family(&self) -> ChainFamily {
        ChainFamily::Evm
    }

    async fn fetch_nonce(&self, _address: Address) -> ChainResult<u64> {
        self.nonce_fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.chain_nonce.load(Ordering::SeqCst))
    }

    async fn submit(&self, raw_tx: &[u8]) -> ChainResult<SubmitOutcome> {
        self.submit_calls.fetch_add(1, Ordering::SeqCst);
        let scripted = self.submit_script.lock().unwrap().pop_front();
        let tx_hash = keccak256(raw_tx);
        match scripted.unwrap_or(ScriptedSubmit::Accept) {
            ScriptedSubmit::Accept => Ok(SubmitOutcome::Accepted { tx_hash }),
            ScriptedSubmit::AlreadyKnown => Ok(SubmitOutcome::AlreadyKnown { tx_hash }),
            ScriptedSubmit::Reject(reason, message) => Ok(SubmitOutcome::Rejected {
                reason,
                message: message.to_string(),
            }),
            ScriptedSubmit::Transient(message) => Err(ChainError::Rpc(message.to_string())),
        }
    }

    async fn fetch_receipt(&self, tx_hash: TxHash) -> ChainResult<Option<TxReceipt>> {
        Ok(self.receipts.lock().unwrap().get(&tx_hash).copied())
    }

    async fn block_number(&self) -> ChainResult<u64> {
        Ok(self.head_block.load(Ordering::SeqCst))
    }

    async fn gas_price(&self) -> ChainResult<u128> {
        Ok(10_000_000_000)
    }
}

pub fn test_key() -> ChainKey {
    ChainKey::new("ethereum", "testnet")
}

pub fn addr(byte: u8) -> Address {
    Address::repeat_byte(byte)
}
