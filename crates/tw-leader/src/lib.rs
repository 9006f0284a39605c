//! # tw-leader
//!
//! The single authoritative process of a ticker wall.
//!
//! ## Architecture
//!
//! ```text
//! PolygonStream ──► ingest ──┐
//! refresh loops ─────────────┼──► Coordinator ──► fan-out ──► per-screen queues ──► /rpc/join sockets
//! RPC / admin handlers ──────┘
//! ```
//!
//! - [`coordinator`]: membership, canonical state, broadcast fan-out
//! - [`feed`]: reference data source trait + Polygon REST/websocket adapters
//! - [`loops`]: price ingest and periodic reference refresh
//! - [`server`]: RPC server and admin façade (axum)

pub mod coordinator;
pub mod feed;
pub mod loops;
pub mod server;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tw_core::config::LeaderConfig;
use tw_core::supervisor::TaskGroup;
use tw_core::ws::KeepAlive;
use tw_core::{Result, Ticker};

use crate::coordinator::{Coordinator, CoordinatorConfig};
use crate::feed::{PolygonRest, PolygonStream, ReferenceSource};
use crate::server::AppState;

/// Capacity of the stream → ingest channel.
const PRICE_CHANNEL_SIZE: usize = 10_000;

pub struct Leader {
    config: LeaderConfig,
    api_key: String,
    coordinator: Arc<Coordinator>,
    source: Arc<dyn ReferenceSource>,
}

impl Leader {
    /// Build a leader with the Polygon feed. Fails without an API key.
    pub fn new(config: LeaderConfig) -> Result<Self> {
        let api_key = config.resolve_api_key()?;
        let source = Arc::new(PolygonRest::new(
            api_key.clone(),
            &config.rest_url,
            Duration::from_millis(config.request_timeout_ms),
        ));
        Self::with_source(config, api_key, source)
    }

    /// Build a leader around any reference source.
    pub fn with_source(config: LeaderConfig, api_key: String, source: Arc<dyn ReferenceSource>) -> Result<Self> {
        let coordinator =
            Arc::new(Coordinator::new(CoordinatorConfig::from(&config), config.presentation.clone()));
        for symbol in config.symbols() {
            coordinator.add_ticker(Ticker::new(symbol))?;
        }
        Ok(Self { config, api_key, coordinator, source })
    }

    /// Load reference data, bind both listeners and spawn every leader task
    /// into `group`.
    pub async fn start(&self, group: &mut TaskGroup) -> anyhow::Result<()> {
        let loaded = loops::refresh_details(&self.coordinator, self.source.as_ref()).await;
        let total = self.coordinator.symbols().len();
        if loaded < total {
            warn!("[leader] reference data loaded for {loaded}/{total} ticker(s)");
        } else {
            info!("[leader] reference data loaded for {loaded} ticker(s)");
        }

        let rpc_listener = TcpListener::bind(&self.config.rpc_addr)
            .await
            .with_context(|| format!("bind rpc server on {}", self.config.rpc_addr))?;
        let http_listener = TcpListener::bind(&self.config.http_addr)
            .await
            .with_context(|| format!("bind admin server on {}", self.config.http_addr))?;

        let keepalive = KeepAlive::every(Duration::from_millis(self.config.ping_interval_ms));
        let state = AppState {
            coordinator: self.coordinator.clone(),
            source: Some(self.source.clone()),
            keepalive,
            shutdown: group.signal(),
        };
        let (price_tx, price_rx) = mpsc::channel(PRICE_CHANNEL_SIZE);

        let coordinator = self.coordinator.clone();
        let signal = group.signal();
        group.spawn("fanout", async move { coordinator.run_fanout(signal).await });

        group.spawn("ingest", loops::run_ingest(self.coordinator.clone(), price_rx, group.signal()));

        let stream = PolygonStream::new(
            self.config.stream_url.clone(),
            self.api_key.clone(),
            self.coordinator.settings().per_tick_updates,
        )
        .with_keepalive(keepalive);
        group.spawn("price-stream", stream.run(self.coordinator.subscribe_symbols(), price_tx, group.signal()));

        group.spawn(
            "details-refresh",
            loops::run_details_refresh(
                self.coordinator.clone(),
                self.source.clone(),
                Duration::from_secs(self.config.details_refresh_secs.max(1)),
                group.signal(),
            ),
        );
        group.spawn(
            "aggs-refresh",
            loops::run_aggregates_refresh(
                self.coordinator.clone(),
                self.source.clone(),
                Duration::from_secs(self.config.aggs_refresh_secs.max(1)),
                group.signal(),
            ),
        );

        group.spawn(
            "rpc-server",
            server::serve(rpc_listener, server::rpc::rpc_router(state.clone()), "rpc", group.signal()),
        );
        group.spawn(
            "admin-server",
            server::serve(http_listener, server::admin::admin_router(state), "admin", group.signal()),
        );

        info!("[leader] started with {} ticker(s)", self.coordinator.symbols().len());
        Ok(())
    }
}
