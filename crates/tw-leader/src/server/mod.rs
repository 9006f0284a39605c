//! HTTP surfaces of the leader.
//!
//! - [`rpc`]: the follower-facing RPC server (join stream, snapshots, admin
//!   operations), default `0.0.0.0:6886`.
//! - [`admin`]: the small JSON façade for operators, default `0.0.0.0:8080`.

pub mod admin;
pub mod error;
pub mod rpc;

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;
use tw_core::supervisor::ShutdownSignal;
use tw_core::ws::KeepAlive;

use crate::coordinator::Coordinator;
use crate::feed::ReferenceSource;

pub use error::AppError;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
    /// Used to load reference data for tickers added at runtime.
    pub source: Option<Arc<dyn ReferenceSource>>,
    /// Ping cadence and idle limit for join streams.
    pub keepalive: KeepAlive,
    pub shutdown: ShutdownSignal,
}

/// Serve `router` on `listener` until shutdown.
pub async fn serve(listener: TcpListener, router: Router, name: &'static str, shutdown: ShutdownSignal) -> anyhow::Result<()> {
    let addr = listener.local_addr()?;
    info!("[{name}] listening on {addr}");
    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .with_context(|| format!("{name} server on {addr}"))?;
    info!("[{name}] stopped");
    Ok(())
}
