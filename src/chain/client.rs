//! Alloy-backed chain RPC client with timeout and failover handling.
//!
//! # Responsibilities
//! - Connect to JSON-RPC endpoints (primary + failovers)
//! - Enforce a bounded timeout on every chain call
//! - Rotate to the next provider on transport failure
//! - Classify submission responses into accepted / already-known / rejected

use alloy::primitives::{keccak256, Address, TxHash};
use alloy::providers::{Provider, ProviderBuilder};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::chain::endpoint::{
    classify_rejection, is_already_known, ChainEndpoint, SubmitOutcome, TxReceipt,
};
use crate::chain::types::{ChainError, ChainFamily, ChainResult};
use crate::config::schema::ChainConfig;
use crate::observability::metrics;

/// RPC client for one (chain, network) endpoint set.
#[derive(Clone)]
pub struct ChainClient {
    /// Providers in preference order (primary first).
    providers: Vec<Arc<dyn Provider + Send + Sync>>,
    config: ChainConfig,
    timeout_duration: Duration,
}

impl ChainClient {
    /// Connect to the configured endpoints and verify chain identity.
    ///
    /// Fails when no provider is reachable or the reported chain id does
    /// not match the configuration; the caller treats this as a transient
    /// initialization failure and retries on a later request.
    pub async fn connect(config: ChainConfig) -> ChainResult<Self> {
        let timeout_duration = Duration::from_secs(config.rpc_timeout_secs);
        let mut providers = Vec::new();

        let primary: url::Url = config
            .rpc_url
            .parse()
            .map_err(|e| ChainError::Rpc(format!("invalid RPC URL '{}': {}", config.rpc_url, e)))?;
        providers
            .push(Arc::new(ProviderBuilder::new().connect_http(primary))
                as Arc<dyn Provider + Send + Sync>);

        for url_str in &config.failover_urls {
            match url_str.parse::<url::Url>() {
                Ok(url) => providers
                    .push(Arc::new(ProviderBuilder::new().connect_http(url))
                        as Arc<dyn Provider + Send + Sync>),
                Err(_) => {
                    tracing::warn!(url = %url_str, "ignoring invalid failover RPC URL");
                }
            }
        }

        let client = Self {
            providers,
            config: config.clone(),
            timeout_duration,
        };

        // Chain identity check doubles as the reachability probe.
        if config.family.uses_nonces() {
            let reported = client.chain_id().await?;
            if reported != config.chain_id {
                return Err(ChainError::Rpc(format!(
                    "chain id mismatch: expected {}, got {}",
                    config.chain_id, reported
                )));
            }
        } else {
            client.block_number().await?;
        }

        tracing::info!(
            rpc_url = %config.rpc_url,
            chain_id = config.chain_id,
            failovers = config.failover_urls.len(),
            "chain client connected"
        );
        Ok(client)
    }

    /// Run `call` against each provider in order until one answers.
    async fn with_failover<T, F, Fut>(&self, op: &str, call: F) -> ChainResult<T>
    where
        F: Fn(Arc<dyn Provider + Send + Sync>) -> Fut,
        Fut: std::future::Future<Output = Result<T, alloy::transports::TransportError>>,
    {
        for (i, provider) in self.providers.iter().enumerate() {
            match timeout(self.timeout_duration, call(provider.clone())).await {
                Ok(Ok(result)) => return Ok(result),
                Ok(Err(e)) => {
                    tracing::warn!(op, provider_idx = i, error = %e, "rpc error, trying next provider");
                }
                Err(_) => {
                    tracing::warn!(op, provider_idx = i, "rpc timeout, trying next provider");
                }
            }
        }
        Err(ChainError::Rpc(format!("all providers failed: {}", op)))
    }

    /// Reported chain id, for identity verification.
    pub async fn chain_id(&self) -> ChainResult<u64> {
        self.with_failover("eth_chainId", |p| async move { p.get_chain_id().await })
            .await
    }

    /// Whether the chain answers head-block queries.
    pub async fn is_healthy(&self) -> bool {
        let healthy = self.block_number().await.is_ok();
        metrics::record_rpc_health(&self.config.chain, healthy);
        healthy
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }
}

#[async_trait]
impl ChainEndpoint for ChainClient {
    fn family(&self) -> ChainFamily {
        self.config.family
    }

    async fn fetch_nonce(&self, address: Address) -> ChainResult<u64> {
        self.with_failover("eth_getTransactionCount", |p| async move {
            p.get_transaction_count(address).await
        })
        .await
    }

    async fn submit(&self, raw_tx: &[u8]) -> ChainResult<SubmitOutcome> {
        // The hash is derivable from the payload, so "already known"
        // responses can still report the transaction id.
        let local_hash: TxHash = keccak256(raw_tx);

        let mut last_err: Option<String> = None;
        for (i, provider) in self.providers.iter().enumerate() {
            let fut = provider.send_raw_transaction(raw_tx);
            match timeout(self.timeout_duration, fut).await {
                Ok(Ok(pending)) => {
                    return Ok(SubmitOutcome::Accepted {
                        tx_hash: *pending.tx_hash(),
                    });
                }
                Ok(Err(e)) => {
                    let message = e.to_string();
                    if is_already_known(&message) {
                        return Ok(SubmitOutcome::AlreadyKnown { tx_hash: local_hash });
                    }
                    if let Some(reason) = classify_rejection(&message) {
                        // Definitive rejection: failover cannot change it.
                        return Ok(SubmitOutcome::Rejected { reason, message });
                    }
                    tracing::warn!(provider_idx = i, error = %message, "submit transport error");
                    last_err = Some(message);
                }
                Err(_) => {
                    tracing::warn!(provider_idx = i, "submit timed out");
                    last_err = Some(format!("timeout after {:?}", self.timeout_duration));
                }
            }
        }
        Err(ChainError::Rpc(
            last_err.unwrap_or_else(|| "all providers failed: eth_sendRawTransaction".to_string()),
        ))
    }

    async fn fetch_receipt(&self, tx_hash: TxHash) -> ChainResult<Option<TxReceipt>> {
        let receipt = self
            .with_failover("eth_getTransactionReceipt", |p| async move {
                p.get_transaction_receipt(tx_hash).await
            })
            .await?;
        Ok(receipt.map(|r| TxReceipt {
            success: r.status(),
            block_number: r.block_number,
        }))
    }

    async fn block_number(&self) -> ChainResult<u64> {
        self.with_failover("eth_blockNumber", |p| async move { p.get_block_number().await })
            .await
    }

    async fn gas_price(&self) -> ChainResult<u128> {
        self.with_failover("eth_gasPrice", |p| async move { p.get_gas_price().await })
            .await
    }
}

impl std::fmt::Debug for ChainClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainClient")
            .field("rpc_url", &self.config.rpc_url)
            .field("chain_id", &self.config.chain_id)
            .field("timeout_secs", &self.config.rpc_timeout_secs)
            .finish()
    }
}
