//! HTTP server setup.
//!
//! # Responsibilities
//! - Build the Axum router with all chain routes
//! - Wire up middleware (tracing, timeout, request ID)
//! - Spawn the pending-table pruner
//! - Serve with graceful shutdown

use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::chain::broadcaster::TransactionBroadcaster;
use crate::chain::connection::ConnectionManager;
use crate::chain::nonce::NonceManager;
use crate::chain::poller::StatusPoller;
use crate::chain::registry::ChainRegistry;
use crate::chain::types::ChainResult;
use crate::chain::wallet::Wallet;
use crate::config::GatewayConfig;
use crate::http::handlers;
use crate::lifecycle::{shutdown_signal, Shutdown};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub connections: Arc<ConnectionManager>,
    pub nonces: Arc<NonceManager>,
    pub broadcaster: Arc<TransactionBroadcaster>,
    pub poller: Arc<StatusPoller>,
    pub wallet: Option<Arc<Wallet>>,
}

/// HTTP server for the gateway.
pub struct GatewayServer {
    router: Router,
    config: GatewayConfig,
    nonces: Arc<NonceManager>,
    poller: Arc<StatusPoller>,
    shutdown: Shutdown,
}

impl GatewayServer {
    /// Initialize all subsystems from configuration.
    pub fn new(config: GatewayConfig) -> ChainResult<Self> {
        let registry = Arc::new(ChainRegistry::from_config(&config.chains));
        let connections = Arc::new(ConnectionManager::new(registry));
        let nonces = Arc::new(NonceManager::new(config.nonce.clone()));
        let broadcaster = Arc::new(TransactionBroadcaster::new(
            config.broadcast.clone(),
            nonces.clone(),
        ));
        let poller = Arc::new(StatusPoller::new(config.poll.clone(), nonces.clone()));
        let wallet = Wallet::from_env()?.map(Arc::new);
        if wallet.is_none() {
            tracing::info!("no gateway wallet configured; /chain/cancel is unavailable");
        }

        let state = AppState {
            connections,
            nonces: nonces.clone(),
            broadcaster,
            poller: poller.clone(),
            wallet,
        };

        let router = Self::build_router(&config, state);
        Ok(Self {
            router,
            config,
            nonces,
            poller,
            shutdown: Shutdown::new(),
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        Router::new()
            .route("/chain/status", get(handlers::chain_status))
            .route("/chain/poll", post(handlers::poll))
            .route("/chain/nonce", post(handlers::nonce))
            .route("/chain/nextNonce", post(handlers::next_nonce))
            .route("/chain/broadcast", post(handlers::broadcast))
            .route("/chain/cancel", post(handlers::cancel))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.timeouts.request_secs,
            )))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "gateway server starting");

        self.spawn_pruner();

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        self.shutdown.trigger();
        tracing::info!("gateway server stopped");
        Ok(())
    }

    /// Periodically drop terminal transactions past retention. The task
    /// exits when the server shuts down.
    fn spawn_pruner(&self) {
        let nonces = self.nonces.clone();
        let poller = self.poller.clone();
        let retention = Duration::from_secs(self.config.poll.retention_secs);
        let interval = Duration::from_secs(self.config.poll.prune_interval_secs.max(1));
        let mut stop = self.shutdown.subscribe();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        nonces.prune(retention);
                        poller.prune();
                    }
                    _ = stop.recv() => break,
                }
            }
        });
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}
