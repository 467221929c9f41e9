//! Nonce allocation and pending-transaction bookkeeping.
//!
//! # Responsibilities
//! - Hand out strictly increasing, gap-free nonces per (chain, address)
//! - Serialize allocation per key while unrelated keys proceed in parallel
//! - Reconcile the local counter against the chain-authoritative value
//! - Track pending transactions through their lifecycle until retention
//!   expires
//!
//! # Invariants
//! - Two concurrent `allocate` calls for one key never return the same
//!   nonce.
//! - The local counter never regresses below a committed or pending nonce.
//! - Every nonce-affecting failure leaves the record consistent: a nonce
//!   is either pending, committed, or returned/discarded via `release`.

use alloy::primitives::{Address, TxHash};
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::chain::endpoint::ChainEndpoint;
use crate::chain::types::{ChainKey, ChainResult, TxStatus};
use crate::config::schema::NonceConfig;

type NonceKey = (ChainKey, Address);

/// Per-(chain, address) allocation state. Mutated only under its mutex.
#[derive(Debug, Default)]
struct NonceRecord {
    /// Next nonce to hand out. `None` until the first chain sync.
    next_nonce: Option<u64>,
    /// Allocated nonces not yet committed or released.
    pending: BTreeSet<u64>,
    /// Highest nonce durably accepted by the chain.
    highest_committed: Option<u64>,
    last_synced_at: Option<Instant>,
}

impl NonceRecord {
    /// Adopt the chain value when it is ahead of the local counter;
    /// otherwise keep the local view (covers mempool visibility lag).
    fn reconcile(&mut self, chain_nonce: u64) {
        let local = self.next_nonce.unwrap_or(0);
        self.next_nonce = Some(chain_nonce.max(local));
        self.last_synced_at = Some(Instant::now());
    }

    fn is_stale(&self, max_age: Duration) -> bool {
        match self.last_synced_at {
            Some(at) => at.elapsed() > max_age,
            None => true,
        }
    }
}

/// A transaction the gateway has allocated a nonce for or broadcast.
#[derive(Debug, Clone)]
pub struct PendingTransaction {
    pub tx_hash: TxHash,
    pub key: ChainKey,
    pub address: Option<Address>,
    pub nonce: Option<u64>,
    pub submitted_at: Instant,
    pub attempts: u32,
    pub status: TxStatus,
}

/// Owner of all nonce records and the pending-transaction table.
pub struct NonceManager {
    records: DashMap<NonceKey, Arc<Mutex<NonceRecord>>>,
    pending_txs: DashMap<TxHash, PendingTransaction>,
    config: NonceConfig,
}

impl NonceManager {
    pub fn new(config: NonceConfig) -> Self {
        Self {
            records: DashMap::new(),
            pending_txs: DashMap::new(),
            config,
        }
    }

    fn record(&self, key: &ChainKey, address: Address) -> Arc<Mutex<NonceRecord>> {
        self.records
            .entry((key.clone(), address))
            .or_default()
            .value()
            .clone()
    }

    /// Allocate the next nonce for (key, address) and mark it pending.
    ///
    /// Serialized per key: the record mutex is held across the chain sync,
    /// so concurrent callers line up and receive consecutive values.
    pub async fn allocate(
        &self,
        key: &ChainKey,
        address: Address,
        endpoint: &dyn ChainEndpoint,
    ) -> ChainResult<u64> {
        let record = self.record(key, address);
        let mut guard = record.lock().await;

        if guard.next_nonce.is_none() || guard.is_stale(self.resync_interval()) {
            let chain_nonce = endpoint.fetch_nonce(address).await?;
            guard.reconcile(chain_nonce);
        }

        // reconcile always leaves Some
        let nonce = guard.next_nonce.unwrap_or(0);
        guard.pending.insert(nonce);
        guard.next_nonce = Some(nonce + 1);

        tracing::debug!(chain = %key, %address, nonce, "allocated nonce");
        Ok(nonce)
    }

    /// Read the nonce the allocator would hand out next, without
    /// allocating. Syncs from the chain when the record is unsynced or
    /// stale.
    pub async fn peek(
        &self,
        key: &ChainKey,
        address: Address,
        endpoint: &dyn ChainEndpoint,
    ) -> ChainResult<u64> {
        let record = self.record(key, address);
        let mut guard = record.lock().await;
        if guard.next_nonce.is_none() || guard.is_stale(self.resync_interval()) {
            let chain_nonce = endpoint.fetch_nonce(address).await?;
            guard.reconcile(chain_nonce);
        }
        Ok(guard.next_nonce.unwrap_or(0))
    }

    /// Mark an allocated nonce as durably accepted by the chain.
    pub async fn commit(&self, key: &ChainKey, address: Address, nonce: u64) {
        let record = self.record(key, address);
        let mut guard = record.lock().await;
        guard.pending.remove(&nonce);
        guard.highest_committed = Some(guard.highest_committed.map_or(nonce, |c| c.max(nonce)));
        tracing::debug!(chain = %key, %address, nonce, "committed nonce");
    }

    /// Return a nonce whose transaction definitively failed before
    /// acceptance.
    ///
    /// The value goes back to the pool only when it was the most recent
    /// allocation and nothing higher is pending or committed. Any higher
    /// activity means the value may have been superseded, so the counter
    /// is resynchronized from the chain instead and the gap is accepted.
    pub async fn release(
        &self,
        key: &ChainKey,
        address: Address,
        nonce: u64,
        endpoint: &dyn ChainEndpoint,
    ) -> ChainResult<()> {
        let record = self.record(key, address);
        let mut guard = record.lock().await;
        guard.pending.remove(&nonce);

        let higher_committed = guard.highest_committed.is_some_and(|c| c > nonce);
        let higher_pending = guard.pending.range(nonce + 1..).next().is_some();
        let was_latest = guard.next_nonce == Some(nonce + 1);

        if !higher_committed && !higher_pending && was_latest {
            guard.next_nonce = Some(nonce);
            tracing::debug!(chain = %key, %address, nonce, "released nonce back to pool");
        } else {
            let chain_nonce = endpoint.fetch_nonce(address).await?;
            guard.reconcile(chain_nonce);
            tracing::debug!(
                chain = %key,
                %address,
                nonce,
                next = guard.next_nonce,
                "released nonce discarded, counter resynced"
            );
        }
        Ok(())
    }

    /// Force-reconcile the local counter with the chain.
    ///
    /// Adopts the chain value when it is higher (covers externally-sent
    /// transactions); keeps the local value when the chain lags (covers
    /// mempool visibility delay). Called on `StaleNonce` rejections.
    pub async fn resync(
        &self,
        key: &ChainKey,
        address: Address,
        endpoint: &dyn ChainEndpoint,
    ) -> ChainResult<u64> {
        let record = self.record(key, address);
        let mut guard = record.lock().await;
        let chain_nonce = endpoint.fetch_nonce(address).await?;
        guard.reconcile(chain_nonce);
        let next = guard.next_nonce.unwrap_or(0);
        tracing::info!(chain = %key, %address, chain_nonce, next, "nonce resynced");
        Ok(next)
    }

    fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.config.resync_interval_secs)
    }

    // ------------------------------------------------------------------
    // Pending-transaction table
    // ------------------------------------------------------------------

    /// Record a transaction about to be broadcast.
    pub fn track(
        &self,
        tx_hash: TxHash,
        key: &ChainKey,
        address: Option<Address>,
        nonce: Option<u64>,
    ) {
        self.pending_txs.insert(
            tx_hash,
            PendingTransaction {
                tx_hash,
                key: key.clone(),
                address,
                nonce,
                submitted_at: Instant::now(),
                attempts: 0,
                status: TxStatus::Queued,
            },
        );
    }

    /// Bump the attempt counter for a tracked transaction.
    pub fn record_attempt(&self, tx_hash: &TxHash) {
        if let Some(mut entry) = self.pending_txs.get_mut(tx_hash) {
            entry.attempts += 1;
        }
    }

    /// Advance a tracked transaction's lifecycle state. Terminal states
    /// are sticky: a transition away from one is ignored.
    pub fn transition(&self, tx_hash: &TxHash, status: TxStatus) {
        if let Some(mut entry) = self.pending_txs.get_mut(tx_hash) {
            if entry.status.is_terminal() {
                return;
            }
            entry.status = status;
        }
    }

    /// Look up a tracked transaction.
    pub fn tracked(&self, tx_hash: &TxHash) -> Option<PendingTransaction> {
        self.pending_txs.get(tx_hash).map(|e| e.clone())
    }

    /// Drop terminal entries older than the retention window.
    pub fn prune(&self, retention: Duration) {
        let before = self.pending_txs.len();
        self.pending_txs
            .retain(|_, tx| !(tx.status.is_terminal() && tx.submitted_at.elapsed() > retention));
        let removed = before - self.pending_txs.len();
        if removed > 0 {
            tracing::debug!(removed, "pruned pending transaction table");
        }
    }

    /// Number of tracked transactions, for status reporting.
    pub fn tracked_count(&self) -> usize {
        self.pending_txs.len()
    }
}
