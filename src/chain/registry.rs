//! Registry of configured chain networks.
//!
//! Maps a normalized [`ChainKey`] to its endpoint configuration. Purely
//! configuration-driven; connection state lives in the connection manager.

use std::collections::HashMap;

use crate::chain::types::{ChainError, ChainKey, ChainResult};
use crate::config::schema::ChainConfig;

/// Lookup table from (chain, network) to endpoint configuration.
#[derive(Debug, Default)]
pub struct ChainRegistry {
    chains: HashMap<ChainKey, ChainConfig>,
}

impl ChainRegistry {
    /// Build the registry from the configured chain list.
    ///
    /// Later entries with the same key shadow earlier ones; config
    /// validation rejects duplicates before this point.
    pub fn from_config(chains: &[ChainConfig]) -> Self {
        let mut map = HashMap::with_capacity(chains.len());
        for cfg in chains {
            let key = ChainKey::new(&cfg.chain, &cfg.network);
            map.insert(key, cfg.clone());
        }
        Self { chains: map }
    }

    /// Resolve a key to its configuration, or `UnknownChain`.
    pub fn get(&self, key: &ChainKey) -> ChainResult<&ChainConfig> {
        self.chains
            .get(key)
            .ok_or_else(|| ChainError::UnknownChain(key.clone()))
    }

    /// All registered keys.
    pub fn keys(&self) -> impl Iterator<Item = &ChainKey> {
        self.chains.keys()
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}
