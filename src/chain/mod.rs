//! Chain connection lifecycle and the transaction subsystem.
//!
//! # Data Flow
//! ```text
//! request (chain, network)
//!     → registry.rs (key → endpoint configuration)
//!     → connection.rs (cached connection, single-flight init)
//!     → nonce.rs (allocate nonce for sender)
//!     → [caller signs transaction]
//!     → broadcaster.rs (submit with retry/backoff, commit or release)
//!     → poller.rs (receipt → lifecycle status, terminal states sticky)
//! ```

pub mod broadcaster;
pub mod client;
pub mod connection;
pub mod endpoint;
pub mod nonce;
pub mod poller;
pub mod registry;
pub mod types;
pub mod wallet;

pub use broadcaster::TransactionBroadcaster;
pub use connection::{ChainConnection, ConnectionManager};
pub use endpoint::{ChainEndpoint, SubmitOutcome, TxReceipt};
pub use nonce::NonceManager;
pub use poller::StatusPoller;
pub use registry::ChainRegistry;
pub use types::{
    BroadcastOutcome, ChainError, ChainFamily, ChainKey, ChainResult, PollResult, RejectReason,
    TxStatus,
};
pub use wallet::Wallet;
