//! Typed error definitions for the ticker wall.
//!
//! Provides [`TickerWallError`] for domain-specific errors that are more
//! informative than plain `anyhow::Error` strings. All variants implement
//! `std::error::Error` via `thiserror`, so they integrate seamlessly with
//! `anyhow::Result` at the process edges.

use thiserror::Error;
use uuid::Uuid;

/// Domain-specific errors for the ticker wall.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TickerWallError {
    /// No screen with this UUID is a member of the cluster.
    #[error("unknown screen: {0}")]
    UnknownScreen(Uuid),

    /// A screen with this UUID has already joined the cluster.
    #[error("screen already joined: {0}")]
    DuplicateScreen(Uuid),

    /// No ticker with this symbol is on the tape.
    #[error("unknown ticker: {0}")]
    UnknownTicker(String),

    /// A ticker with this symbol is already on the tape.
    #[error("ticker already exists: {0}")]
    DuplicateTicker(String),

    /// Request payload failed validation.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Connection to the leader (or a stream on it) failed.
    #[error("connection error: {0}")]
    Connection(String),

    /// Market data vendor request or message handling failed.
    #[error("feed error: {0}")]
    Feed(String),

    /// Configuration parsing or validation error.
    #[error("config error: {0}")]
    Config(String),
}

/// Result alias for domain operations.
pub type Result<T> = std::result::Result<T, TickerWallError>;
