//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files, and
//! every field has a default so minimal configs work.

use serde::{Deserialize, Serialize};

use crate::chain::types::ChainFamily;

/// Root configuration for the gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Request timeout settings.
    pub timeouts: TimeoutConfig,

    /// Chain network definitions, one per (chain, network) pair.
    pub chains: Vec<ChainConfig>,

    /// Nonce allocator settings.
    pub nonce: NonceConfig,

    /// Broadcast retry policy.
    pub broadcast: BroadcastConfig,

    /// Poll state machine settings.
    pub poll: PollConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:15888").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:15888".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Whole-request timeout in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// One chain network endpoint definition.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Chain name (e.g., "ethereum").
    pub chain: String,

    /// Network name (e.g., "mainnet", "sepolia").
    pub network: String,

    /// Chain family, selecting transaction semantics.
    pub family: ChainFamily,

    /// Primary JSON-RPC endpoint.
    pub rpc_url: String,

    /// Failover endpoints, tried in order after the primary.
    pub failover_urls: Vec<String>,

    /// Expected chain id (EIP-155), verified at connection init.
    pub chain_id: u64,

    /// Per-call RPC timeout in seconds.
    pub rpc_timeout_secs: u64,

    /// Confirmation depth required before a receipt counts as CONFIRMED.
    pub confirmation_blocks: u32,

    /// Gas price multiplier applied by the cancel/replace flow.
    pub gas_bump_multiplier: f64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain: String::new(),
            network: String::new(),
            family: ChainFamily::Evm,
            rpc_url: "http://localhost:8545".to_string(),
            failover_urls: Vec::new(),
            chain_id: 1,
            rpc_timeout_secs: 10,
            confirmation_blocks: 1,
            gas_bump_multiplier: 1.25,
        }
    }
}

/// Nonce allocator settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NonceConfig {
    /// Age after which a cached nonce record is refreshed from the chain
    /// before allocation.
    pub resync_interval_secs: u64,
}

impl Default for NonceConfig {
    fn default() -> Self {
        Self {
            resync_interval_secs: 30,
        }
    }
}

/// Broadcast retry policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BroadcastConfig {
    /// Maximum submission attempts for transient failures.
    pub max_attempts: u32,

    /// Base backoff delay in milliseconds.
    pub base_delay_ms: u64,

    /// Backoff cap in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 250,
            max_delay_ms: 5_000,
        }
    }
}

/// Poll state machine settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PollConfig {
    /// Age after which a receiptless transaction is reported DROPPED.
    pub drop_age_secs: u64,

    /// TTL of the short-lived poll result cache in milliseconds.
    pub cache_ttl_ms: u64,

    /// Retention window for terminal pending-transaction records.
    pub retention_secs: u64,

    /// Interval between prune passes over the pending table.
    pub prune_interval_secs: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            drop_age_secs: 180,
            cache_ttl_ms: 500,
            retention_secs: 3_600,
            prune_interval_secs: 60,
        }
    }
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Whether to expose Prometheus metrics.
    pub metrics_enabled: bool,

    /// Address for the metrics exporter listener.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9091".to_string(),
        }
    }
}
