//! # tw-core
//!
//! Core crate for the ticker wall, providing:
//!
//! - **Model** (`model`): screens, cluster, presentation settings, tickers,
//!   announcements and the `Update` vocabulary shared by leader and followers
//! - **Layout** (`layout`): tape layout engine (visible window + pixel offsets)
//! - **Configuration** (`config`): JSON config deserialization
//! - **Error types** (`error`): domain-specific `TickerWallError` via thiserror
//! - **Supervisor** (`supervisor`): task group with shared shutdown signal
//! - **WebSocket** (`ws`): connect helper + reconnect backoff
//! - **Time utilities** (`time_util`): wall-clock milliseconds
//! - **Logging** (`logging`): tracing-based structured logging

pub mod config;
pub mod error;
pub mod layout;
pub mod logging;
pub mod model;
pub mod supervisor;
pub mod time_util;
pub mod ws;

// Re-export model types at crate root for convenience.
pub use error::{Result, TickerWallError};
pub use model::*;
