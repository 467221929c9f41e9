//! Configuration validation.
//!
//! Serde handles the syntactic layer; this module runs the semantic
//! checks and returns every problem found, not just the first.

use std::collections::HashSet;
use std::fmt;

use crate::chain::types::ChainKey;
use crate::config::schema::GatewayConfig;

/// One semantic problem in a configuration.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn err(field: &str, message: impl Into<String>) -> ValidationError {
    ValidationError {
        field: field.to_string(),
        message: message.into(),
    }
}

/// Validate a loaded configuration.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(err(
            "listener.bind_address",
            format!("not a valid socket address: {}", config.listener.bind_address),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(err("timeouts.request_secs", "must be greater than zero"));
    }
    if config.broadcast.max_attempts == 0 {
        errors.push(err("broadcast.max_attempts", "must be at least 1"));
    }
    if config.poll.drop_age_secs == 0 {
        errors.push(err("poll.drop_age_secs", "must be greater than zero"));
    }

    let mut seen: HashSet<ChainKey> = HashSet::new();
    for (i, chain) in config.chains.iter().enumerate() {
        let field = format!("chains[{}]", i);
        if chain.chain.trim().is_empty() {
            errors.push(err(&field, "chain name is empty"));
        }
        if chain.network.trim().is_empty() {
            errors.push(err(&field, "network name is empty"));
        }
        if chain.rpc_url.parse::<url::Url>().is_err() {
            errors.push(err(&field, format!("invalid rpc_url: {}", chain.rpc_url)));
        }
        for url in &chain.failover_urls {
            if url.parse::<url::Url>().is_err() {
                errors.push(err(&field, format!("invalid failover url: {}", url)));
            }
        }
        if chain.rpc_timeout_secs == 0 {
            errors.push(err(&field, "rpc_timeout_secs must be greater than zero"));
        }
        if chain.confirmation_blocks == 0 {
            errors.push(err(&field, "confirmation_blocks must be at least 1"));
        }
        if chain.gas_bump_multiplier < 1.0 {
            errors.push(err(&field, "gas_bump_multiplier must be >= 1.0"));
        }

        let key = ChainKey::new(&chain.chain, &chain.network);
        if !seen.insert(key.clone()) {
            errors.push(err(&field, format!("duplicate chain definition: {}", key)));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
