//! Gateway wallet for the cancel/replace flow.
//!
//! # Security
//! - The private key is loaded ONLY from an environment variable
//! - Keys are never logged or serialized

use alloy::eips::eip2718::Encodable2718;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, U256};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;

use crate::chain::types::{ChainError, ChainResult};

/// Environment variable holding the hex-encoded private key.
pub const PRIVATE_KEY_ENV_VAR: &str = "GATEWAY_WALLET_PRIVATE_KEY";

/// Signer used to build supersede-by-fee cancellation transactions.
#[derive(Clone)]
pub struct Wallet {
    signer: PrivateKeySigner,
}

impl Wallet {
    /// Create a wallet from a hex-encoded private key (with or without a
    /// 0x prefix). The key is never logged.
    pub fn from_private_key(private_key_hex: &str) -> ChainResult<Self> {
        let key_hex = private_key_hex.strip_prefix("0x").unwrap_or(private_key_hex);
        let signer: PrivateKeySigner = key_hex
            .parse()
            .map_err(|e| ChainError::Wallet(format!("invalid private key: {}", e)))?;

        tracing::info!(address = %signer.address(), "gateway wallet loaded");
        Ok(Self { signer })
    }

    /// Load the wallet from `GATEWAY_WALLET_PRIVATE_KEY`, if set.
    pub fn from_env() -> ChainResult<Option<Self>> {
        match std::env::var(PRIVATE_KEY_ENV_VAR) {
            Ok(key) => Self::from_private_key(&key).map(Some),
            Err(_) => Ok(None),
        }
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    /// Build and sign a cancellation for `nonce`: a zero-value transfer to
    /// self carrying the same nonce at a bumped gas price, which
    /// supersedes the stuck original in the pool.
    pub async fn build_cancel_tx(
        &self,
        chain_id: u64,
        nonce: u64,
        gas_price: u128,
        bump_multiplier: f64,
    ) -> ChainResult<Vec<u8>> {
        let bumped = (gas_price as f64 * bump_multiplier.max(1.0)) as u128;

        let tx = TransactionRequest::default()
            .with_to(self.address())
            .with_value(U256::ZERO)
            .with_nonce(nonce)
            .with_chain_id(chain_id)
            .with_gas_price(bumped)
            .with_gas_limit(21_000);

        let wallet = EthereumWallet::from(self.signer.clone());
        let envelope = tx
            .build(&wallet)
            .await
            .map_err(|e| ChainError::Wallet(format!("signing failed: {}", e)))?;
        Ok(envelope.encoded_2718())
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.signer.address())
            .finish()
    }
}
