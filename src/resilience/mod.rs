//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Chain RPC call:
//!     → client.rs enforces a per-call deadline and provider failover
//!     → On transient submit failure: broadcaster retries with
//!       backoff.rs delays, up to the configured attempt budget
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every chain call has a deadline
//! - Only transient failures are retried; definitive rejections never are
//! - Jittered backoff prevents synchronized retry bursts

pub mod backoff;
