//! Chain route handlers.
//!
//! Thin request/response glue over the chain subsystem: parse and
//! validate inputs, resolve the connection, delegate, map errors to
//! status codes. Business logic lives in `crate::chain`.

use alloy::primitives::{hex, Address, TxHash};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::chain::connection::ChainConnection;
use crate::chain::types::{BroadcastOutcome, ChainError, ChainKey, PollResult};
use crate::http::server::AppState;

/// Error envelope for all chain routes.
pub enum ApiError {
    Chain(ChainError),
    BadRequest(String),
}

impl From<ChainError> for ApiError {
    fn from(e: ChainError) -> Self {
        ApiError::Chain(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, "bad_request", message)
            }
            ApiError::Chain(e) => {
                let status = match &e {
                    ChainError::UnknownChain(_) => StatusCode::NOT_FOUND,
                    ChainError::BroadcastRejected { .. } => StatusCode::BAD_REQUEST,
                    ChainError::StaleNonce { .. } => StatusCode::CONFLICT,
                    ChainError::Wallet(_) => StatusCode::INTERNAL_SERVER_ERROR,
                    ChainError::ConnectionInitFailed { .. }
                    | ChainError::BroadcastTransient { .. }
                    | ChainError::Rpc(_)
                    | ChainError::Timeout(_) => StatusCode::SERVICE_UNAVAILABLE,
                };
                let kind = match &e {
                    ChainError::UnknownChain(_) => "unknown_chain",
                    ChainError::ConnectionInitFailed { .. } => "connection_init_failed",
                    ChainError::StaleNonce { .. } => "stale_nonce",
                    ChainError::BroadcastRejected { .. } => "broadcast_rejected",
                    ChainError::BroadcastTransient { .. } => "broadcast_transient",
                    ChainError::Rpc(_) => "rpc_error",
                    ChainError::Timeout(_) => "rpc_timeout",
                    ChainError::Wallet(_) => "wallet_error",
                };
                (status, kind, e.to_string())
            }
        };
        let body = json!({ "error": { "kind": kind, "message": message } });
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn parse_address(s: &str) -> ApiResult<Address> {
    s.parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid address: {}", s)))
}

fn parse_tx_hash(s: &str) -> ApiResult<TxHash> {
    s.parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid transaction hash: {}", s)))
}

async fn resolve(
    state: &AppState,
    chain: &str,
    network: &str,
) -> ApiResult<(ChainKey, Arc<ChainConnection>)> {
    let key = ChainKey::new(chain, network);
    let conn = state.connections.get_connection(&key).await?;
    Ok((key, conn))
}

// ---------------------------------------------------------------------
// GET /chain/status
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct StatusQuery {
    pub chain: Option<String>,
    pub network: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainStatus {
    pub chain: String,
    pub network: String,
    pub chain_id: u64,
    pub block_number: Option<u64>,
    pub healthy: bool,
}

async fn status_of(conn: &ChainConnection) -> ChainStatus {
    let block = conn.endpoint().block_number().await.ok();
    ChainStatus {
        chain: conn.key().chain().to_string(),
        network: conn.key().network().to_string(),
        chain_id: conn.config().chain_id,
        healthy: block.is_some(),
        block_number: block,
    }
}

pub async fn chain_status(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> ApiResult<Json<serde_json::Value>> {
    let statuses = match (query.chain, query.network) {
        (Some(chain), Some(network)) => {
            let (_, conn) = resolve(&state, &chain, &network).await?;
            vec![status_of(&conn).await]
        }
        _ => {
            let mut statuses = Vec::new();
            for conn in state.connections.ready_connections() {
                statuses.push(status_of(&conn).await);
            }
            statuses
        }
    };
    Ok(Json(json!({
        "timestamp": now_millis(),
        "chains": statuses,
        "trackedTransactions": state.nonces.tracked_count(),
    })))
}

// ---------------------------------------------------------------------
// POST /chain/poll
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollRequest {
    pub chain: String,
    pub network: String,
    pub tx_hash: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PollResponse {
    pub network: String,
    pub timestamp: u64,
    #[serde(flatten)]
    pub result: PollResult,
}

pub async fn poll(
    State(state): State<AppState>,
    Json(req): Json<PollRequest>,
) -> ApiResult<Json<PollResponse>> {
    let tx_hash = parse_tx_hash(&req.tx_hash)?;
    let (key, conn) = resolve(&state, &req.chain, &req.network).await?;

    let result = state
        .poller
        .poll(
            &key,
            conn.endpoint().as_ref(),
            tx_hash,
            conn.config().confirmation_blocks,
        )
        .await?;

    Ok(Json(PollResponse {
        network: key.network().to_string(),
        timestamp: now_millis(),
        result,
    }))
}

// ---------------------------------------------------------------------
// POST /chain/nonce and /chain/nextNonce
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NonceRequest {
    pub chain: String,
    pub network: String,
    pub address: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NonceResponse {
    pub network: String,
    pub timestamp: u64,
    pub address: String,
    pub nonce: u64,
}

/// Read-only view of the next nonce.
pub async fn nonce(
    State(state): State<AppState>,
    Json(req): Json<NonceRequest>,
) -> ApiResult<Json<NonceResponse>> {
    let address = parse_address(&req.address)?;
    let (key, conn) = resolve(&state, &req.chain, &req.network).await?;
    ensure_nonce_chain(&conn)?;

    let nonce = state
        .nonces
        .peek(&key, address, conn.endpoint().as_ref())
        .await?;
    Ok(Json(NonceResponse {
        network: key.network().to_string(),
        timestamp: now_millis(),
        address: req.address,
        nonce,
    }))
}

/// Allocate the next nonce and mark it pending.
pub async fn next_nonce(
    State(state): State<AppState>,
    Json(req): Json<NonceRequest>,
) -> ApiResult<Json<NonceResponse>> {
    let address = parse_address(&req.address)?;
    let (key, conn) = resolve(&state, &req.chain, &req.network).await?;
    ensure_nonce_chain(&conn)?;

    let nonce = state
        .nonces
        .allocate(&key, address, conn.endpoint().as_ref())
        .await?;
    Ok(Json(NonceResponse {
        network: key.network().to_string(),
        timestamp: now_millis(),
        address: req.address,
        nonce,
    }))
}

fn ensure_nonce_chain(conn: &ChainConnection) -> ApiResult<()> {
    if conn.config().family.uses_nonces() {
        Ok(())
    } else {
        Err(ApiError::BadRequest(format!(
            "chain {} does not use nonces",
            conn.key()
        )))
    }
}

// ---------------------------------------------------------------------
// POST /chain/broadcast
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastRequest {
    pub chain: String,
    pub network: String,
    /// Hex-encoded signed transaction.
    pub signed_tx: String,
    /// Sender address; required on nonce-based chains for bookkeeping.
    pub address: Option<String>,
    /// Nonce carried by the signed transaction, when known.
    pub nonce: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastResponse {
    pub network: String,
    pub timestamp: u64,
    #[serde(flatten)]
    pub outcome: BroadcastOutcome,
}

pub async fn broadcast(
    State(state): State<AppState>,
    Json(req): Json<BroadcastRequest>,
) -> ApiResult<Json<BroadcastResponse>> {
    let raw = hex::decode(req.signed_tx.trim_start_matches("0x"))
        .map_err(|_| ApiError::BadRequest("signedTx is not valid hex".to_string()))?;
    if raw.is_empty() {
        return Err(ApiError::BadRequest("signedTx is empty".to_string()));
    }

    let (key, conn) = resolve(&state, &req.chain, &req.network).await?;

    // Nonce bookkeeping only applies to nonce-based chains and only when
    // the caller tells us which (address, nonce) the payload carries.
    let (address, nonce) = if conn.config().family.uses_nonces() {
        let address = req.address.as_deref().map(parse_address).transpose()?;
        (address, req.nonce)
    } else {
        (None, None)
    };

    let outcome = state
        .broadcaster
        .broadcast(&key, conn.endpoint().as_ref(), &raw, address, nonce)
        .await?;

    Ok(Json(BroadcastResponse {
        network: key.network().to_string(),
        timestamp: now_millis(),
        outcome,
    }))
}

// ---------------------------------------------------------------------
// POST /chain/cancel
// ---------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    pub chain: String,
    pub network: String,
    /// Nonce of the stuck transaction to supersede.
    pub nonce: u64,
}

pub async fn cancel(
    State(state): State<AppState>,
    Json(req): Json<CancelRequest>,
) -> ApiResult<Json<BroadcastResponse>> {
    let wallet = state
        .wallet
        .as_ref()
        .ok_or_else(|| ApiError::Chain(ChainError::Wallet("no gateway wallet configured".into())))?;

    let (key, conn) = resolve(&state, &req.chain, &req.network).await?;
    ensure_nonce_chain(&conn)?;

    let gas_price = conn.endpoint().gas_price().await?;
    let raw = wallet
        .build_cancel_tx(
            conn.config().chain_id,
            req.nonce,
            gas_price,
            conn.config().gas_bump_multiplier,
        )
        .await?;

    let outcome = state
        .broadcaster
        .broadcast(
            &key,
            conn.endpoint().as_ref(),
            &raw,
            Some(wallet.address()),
            Some(req.nonce),
        )
        .await?;

    Ok(Json(BroadcastResponse {
        network: key.network().to_string(),
        timestamp: now_millis(),
        outcome,
    }))
}
