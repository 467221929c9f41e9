//! Chain Gateway
//!
//! A uniform HTTP contract over heterogeneous blockchain networks.
//!
//! # Architecture Overview
//!
//! ```text
//!                     ┌────────────────────────────────────────────────┐
//!                     │                 CHAIN GATEWAY                   │
//!                     │                                                 │
//!   Client Request    │  ┌────────┐   ┌──────────┐   ┌──────────────┐  │
//!   ──────────────────┼─▶│  http  │──▶│ registry │──▶│  connection  │  │
//!                     │  │ server │   │          │   │   manager    │  │
//!                     │  └────────┘   └──────────┘   └──────┬───────┘  │
//!                     │                                      │          │
//!                     │              ┌───────────────────────┼───────┐  │
//!                     │              ▼                       ▼       │  │
//!                     │      ┌──────────────┐        ┌────────────┐  │  │
//!                     │      │    nonce     │        │   chain    │──┼──┼──▶ Chain RPC
//!                     │      │   manager    │        │   client   │  │  │
//!                     │      └──────┬───────┘        └────────────┘  │  │
//!                     │             │                       ▲        │  │
//!                     │             ▼                       │        │  │
//!                     │      ┌──────────────┐       ┌──────────────┐ │  │
//!   Client Response   │      │ broadcaster  │       │    status    │ │  │
//!   ◀─────────────────┼──────│ (retry/bkoff)│       │    poller    │ │  │
//!                     │      └──────────────┘       └──────────────┘ │  │
//!                     │                                              │  │
//!                     │  ┌──────────────────────────────────────────┐│  │
//!                     │  │  config · observability · lifecycle ·    ││  │
//!                     │  │  resilience                              ││  │
//!                     │  └──────────────────────────────────────────┘│  │
//!                     └────────────────────────────────────────────────┘
//! ```

// Core subsystems
pub mod chain;
pub mod config;
pub mod http;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use chain::{ChainError, ChainKey, ChainResult, TxStatus};
pub use config::GatewayConfig;
pub use http::GatewayServer;
pub use lifecycle::Shutdown;
