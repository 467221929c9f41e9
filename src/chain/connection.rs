//! Connection cache with single-flight initialization.
//!
//! # Responsibilities
//! - Hold at most one live connection per [`ChainKey`]
//! - Deduplicate concurrent initialization for the same key: all first
//!   requesters await one shared attempt and see the same result
//! - Never cache a failed attempt; the next request retries
//! - Evict unhealthy connections on explicit request only

use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt, Shared};
use std::sync::Arc;

use crate::chain::client::ChainClient;
use crate::chain::endpoint::ChainEndpoint;
use crate::chain::registry::ChainRegistry;
use crate::chain::types::{ChainError, ChainKey, ChainResult};
use crate::config::schema::ChainConfig;
use crate::observability::metrics;

/// A live, shared connection to one chain network.
pub struct ChainConnection {
    key: ChainKey,
    config: ChainConfig,
    endpoint: Arc<dyn ChainEndpoint>,
}

impl std::fmt::Debug for ChainConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainConnection")
            .field("key", &self.key)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ChainConnection {
    pub fn new(key: ChainKey, config: ChainConfig, endpoint: Arc<dyn ChainEndpoint>) -> Self {
        Self {
            key,
            config,
            endpoint,
        }
    }

    pub fn key(&self) -> &ChainKey {
        &self.key
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn endpoint(&self) -> &Arc<dyn ChainEndpoint> {
        &self.endpoint
    }
}

/// Factory producing an endpoint for a chain configuration.
///
/// Injectable so tests can count initializations and script failures.
pub type EndpointFactory = Arc<
    dyn Fn(ChainKey, ChainConfig) -> BoxFuture<'static, ChainResult<Arc<dyn ChainEndpoint>>>
        + Send
        + Sync,
>;

type InitResult = Result<Arc<ChainConnection>, Arc<ChainError>>;
type InitFuture = Shared<BoxFuture<'static, InitResult>>;

/// Owner of all [`ChainConnection`] instances.
pub struct ConnectionManager {
    registry: Arc<ChainRegistry>,
    factory: EndpointFactory,
    ready: DashMap<ChainKey, Arc<ChainConnection>>,
    in_flight: DashMap<ChainKey, InitFuture>,
}

impl ConnectionManager {
    /// Manager backed by real RPC clients.
    pub fn new(registry: Arc<ChainRegistry>) -> Self {
        let factory: EndpointFactory = Arc::new(|_key, config| {
            async move {
                let client = ChainClient::connect(config).await?;
                Ok(Arc::new(client) as Arc<dyn ChainEndpoint>)
            }
            .boxed()
        });
        Self::with_factory(registry, factory)
    }

    /// Manager with an injected endpoint factory.
    pub fn with_factory(registry: Arc<ChainRegistry>, factory: EndpointFactory) -> Self {
        Self {
            registry,
            factory,
            ready: DashMap::new(),
            in_flight: DashMap::new(),
        }
    }

    /// Return the connection for `key`, initializing it on first use.
    ///
    /// Concurrent callers for the same uninitialized key share a single
    /// initialization attempt and all observe its outcome. A failed
    /// attempt is dropped from the in-flight table, so a later call starts
    /// a fresh one.
    pub async fn get_connection(&self, key: &ChainKey) -> ChainResult<Arc<ChainConnection>> {
        if let Some(conn) = self.ready.get(key) {
            return Ok(conn.clone());
        }

        // Resolve configuration before any init work is shared.
        let config = self.registry.get(key)?.clone();

        let init = self
            .in_flight
            .entry(key.clone())
            .or_insert_with(|| self.spawn_init(key.clone(), config))
            .value()
            .clone();

        // An init that completed between the ready check and the entry
        // call has already published its connection; use it instead of
        // driving another attempt.
        if let Some(conn) = self.ready.get(key).map(|c| c.value().clone()) {
            self.in_flight.remove(key);
            return Ok(conn);
        }

        let result = init.await;
        match result {
            Ok(conn) => {
                // A competing init may have published first; the earlier
                // connection stays the canonical one.
                let conn = {
                    let entry = self.ready.entry(key.clone()).or_insert(conn);
                    entry.value().clone()
                };
                self.in_flight.remove(key);
                metrics::record_connection_init(key.chain(), true);
                Ok(conn)
            }
            Err(shared_err) => {
                self.in_flight.remove(key);
                metrics::record_connection_init(key.chain(), false);
                Err(ChainError::ConnectionInitFailed {
                    key: key.clone(),
                    message: shared_err.to_string(),
                })
            }
        }
    }

    fn spawn_init(&self, key: ChainKey, config: ChainConfig) -> InitFuture {
        let factory = self.factory.clone();
        let fut = async move {
            tracing::info!(chain = %key, "initializing chain connection");
            match factory(key.clone(), config.clone()).await {
                Ok(endpoint) => Ok(Arc::new(ChainConnection::new(key, config, endpoint))),
                Err(e) => {
                    tracing::warn!(error = %e, "chain connection init failed");
                    Err(Arc::new(e))
                }
            }
        };
        fut.boxed().shared()
    }

    /// Drop the cached connection for `key`, forcing re-initialization on
    /// the next request. Used when downstream operations detect an
    /// unusable connection.
    pub fn evict(&self, key: &ChainKey) {
        if self.ready.remove(key).is_some() {
            tracing::warn!(chain = %key, "evicted chain connection");
        }
    }

    /// Snapshot of currently initialized connections.
    pub fn ready_connections(&self) -> Vec<Arc<ChainConnection>> {
        self.ready.iter().map(|e| e.value().clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::endpoint::{SubmitOutcome, TxReceipt};
    use crate::chain::types::ChainFamily;
    use alloy::primitives::{Address, TxHash};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct NullEndpoint;

    #[async_trait]
    impl ChainEndpoint for NullEndpoint {
        fn family(&self) -> ChainFamily {
            ChainFamily::Evm
        }
        async fn fetch_nonce(&self, _address: Address) -> ChainResult<u64> {
            Ok(0)
        }
        async fn submit(&self, _raw_tx: &[u8]) -> ChainResult<SubmitOutcome> {
            Ok(SubmitOutcome::Accepted {
                tx_hash: TxHash::ZERO,
            })
        }
        async fn fetch_receipt(&self, _tx_hash: TxHash) -> ChainResult<Option<TxReceipt>> {
            Ok(None)
        }
        async fn block_number(&self) -> ChainResult<u64> {
            Ok(1)
        }
        async fn gas_price(&self) -> ChainResult<u128> {
            Ok(1)
        }
    }

    fn registry() -> Arc<ChainRegistry> {
        Arc::new(ChainRegistry::from_config(&[ChainConfig {
            chain: "ethereum".into(),
            network: "mainnet".into(),
            ..ChainConfig::default()
        }]))
    }

    fn counting_factory(count: Arc<AtomicUsize>) -> EndpointFactory {
        Arc::new(move |_key, _config| {
            let count = count.clone();
            async move {
                count.fetch_add(1, Ordering::SeqCst);
                // Hold the in-flight window open so concurrent callers pile up.
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(Arc::new(NullEndpoint) as Arc<dyn ChainEndpoint>)
            }
            .boxed()
        })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_share_one_init() {
        let inits = Arc::new(AtomicUsize::new(0));
        let manager = Arc::new(ConnectionManager::with_factory(
            registry(),
            counting_factory(inits.clone()),
        ));
        let key = ChainKey::new("ethereum", "mainnet");

        let mut handles = Vec::new();
        for _ in 0..16 {
            let manager = manager.clone();
            let key = key.clone();
            handles.push(tokio::spawn(
                async move { manager.get_connection(&key).await },
            ));
        }

        let mut conns = Vec::new();
        for h in handles {
            conns.push(h.await.unwrap().unwrap());
        }

        assert_eq!(inits.load(Ordering::SeqCst), 1);
        for conn in &conns[1..] {
            assert!(Arc::ptr_eq(&conns[0], conn));
        }
    }

    #[tokio::test]
    async fn unknown_chain_fails_without_init() {
        let inits = Arc::new(AtomicUsize::new(0));
        let manager =
            ConnectionManager::with_factory(registry(), counting_factory(inits.clone()));
        let key = ChainKey::new("solana", "devnet");

        let err = manager.get_connection(&key).await.unwrap_err();
        assert!(matches!(err, ChainError::UnknownChain(_)));
        assert_eq!(inits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failed_init_is_not_cached() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let factory: EndpointFactory = Arc::new(move |_key, _config| {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    Err(ChainError::Rpc("node unreachable".into()))
                } else {
                    Ok(Arc::new(NullEndpoint) as Arc<dyn ChainEndpoint>)
                }
            }
            .boxed()
        });
        let manager = ConnectionManager::with_factory(registry(), factory);
        let key = ChainKey::new("ethereum", "mainnet");

        let err = manager.get_connection(&key).await.unwrap_err();
        assert!(matches!(err, ChainError::ConnectionInitFailed { .. }));

        let conn = manager.get_connection(&key).await.unwrap();
        assert_eq!(conn.key(), &key);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn init_completing_second_adopts_the_published_connection() {
        // Interleaving where a caller misses the ready check, a competing
        // initialization publishes its connection, and the caller's own
        // init then completes: the published connection must stay the
        // only live instance for the key.
        let slot: Arc<std::sync::OnceLock<Arc<ConnectionManager>>> =
            Arc::new(std::sync::OnceLock::new());
        let key = ChainKey::new("ethereum", "mainnet");
        let published = Arc::new(ChainConnection::new(
            key.clone(),
            ChainConfig::default(),
            Arc::new(NullEndpoint),
        ));

        let factory: EndpointFactory = {
            let slot = slot.clone();
            let published = published.clone();
            Arc::new(move |key, _config| {
                let slot = slot.clone();
                let published = published.clone();
                async move {
                    let manager = slot.get().unwrap();
                    manager.ready.insert(key, published.clone());
                    Ok(Arc::new(NullEndpoint) as Arc<dyn ChainEndpoint>)
                }
                .boxed()
            })
        };

        let manager = Arc::new(ConnectionManager::with_factory(registry(), factory));
        let _ = slot.set(manager.clone());

        let conn = manager.get_connection(&key).await.unwrap();
        assert!(Arc::ptr_eq(&conn, &published));
        assert_eq!(manager.ready.len(), 1);
    }

    #[tokio::test]
    async fn evicted_connection_is_reinitialized() {
        let inits = Arc::new(AtomicUsize::new(0));
        let manager =
            ConnectionManager::with_factory(registry(), counting_factory(inits.clone()));
        let key = ChainKey::new("ethereum", "mainnet");

        let first = manager.get_connection(&key).await.unwrap();
        manager.evict(&key);
        let second = manager.get_connection(&key).await.unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(inits.load(Ordering::SeqCst), 2);
    }
}
