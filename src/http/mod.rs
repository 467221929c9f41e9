//! HTTP surface of the gateway.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, request ID)
//!     → handlers.rs (parse request, resolve connection, delegate)
//!     → crate::chain (nonce/broadcast/poll subsystem)
//!     → handlers.rs (map ChainError to status code, serialize response)
//! ```

pub mod handlers;
pub mod server;

pub use server::{AppState, GatewayServer};
