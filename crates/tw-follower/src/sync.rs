//! Follower sync state machine.
//!
//! ```text
//!  Connecting ──► fetch tickers ──► join ──► first cluster ──► Connected ──► apply updates
//!      ▲                                                                      │ error
//!      │                                                                      ▼
//!      └──────────────────── backoff (100 ms .. max) ◄──────────────── Reconnecting
//! ```
//!
//! A join counts as established only once the leader's first
//! `ClusterChanged` arrives; a leader that accepts the socket and then
//! rejects the screen never shows `Connected` and never resets the backoff.
//! There is no retry cap; only shutdown ends the loop, leaving the status
//! `Disconnected`.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use tw_core::supervisor::ShutdownSignal;
use tw_core::ws::Backoff;
use tw_core::{Result, Screen, Update};

use crate::api::LeaderClient;
use crate::mirror::{ConnectionStatus, Mirror};

pub struct Follower {
    client: LeaderClient,
    mirror: Arc<Mirror>,
    max_backoff: Duration,
}

impl Follower {
    pub fn new(client: LeaderClient, screen: Screen, max_backoff: Duration) -> Self {
        Self { client, mirror: Arc::new(Mirror::new(screen)), max_backoff }
    }

    pub fn mirror(&self) -> Arc<Mirror> {
        self.mirror.clone()
    }

    pub fn client(&self) -> &LeaderClient {
        &self.client
    }

    /// Stay synced with the leader until shutdown.
    pub async fn run(&self, shutdown: ShutdownSignal) -> anyhow::Result<()> {
        let mut backoff = Backoff::new(self.max_backoff);

        while !shutdown.is_cancelled() {
            self.mirror.set_status(ConnectionStatus::Connecting);
            match self.session(&shutdown, &mut backoff).await {
                Ok(()) => break,
                Err(e) => {
                    warn!("[sync] {e}");
                    self.mirror.set_status(ConnectionStatus::Reconnecting);
                    if !backoff.wait(&shutdown).await {
                        break;
                    }
                }
            }
        }

        self.mirror.set_status(ConnectionStatus::Disconnected);
        Ok(())
    }

    /// One connection lifetime. `Ok` only on shutdown.
    async fn session(&self, shutdown: &ShutdownSignal, backoff: &mut Backoff) -> Result<()> {
        let tickers = self.client.get_tickers().await?;
        info!("[sync] loaded {} ticker(s) from {}", tickers.len(), self.client.base_url());
        self.mirror.load_tickers(tickers);

        let screen = self.mirror.screen();
        let mut stream = self.client.join(&screen).await?;
        let mut confirmed = false;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    stream.close().await;
                    return Ok(());
                }
                update = stream.next() => {
                    let update = update?;
                    let membership = matches!(update, Update::ClusterChanged(_));
                    self.mirror.apply(update);
                    if membership && !confirmed {
                        confirmed = true;
                        self.mirror.set_status(ConnectionStatus::Connected);
                        backoff.reset();
                        info!("[sync] joined as {}", screen.uuid);
                    }
                }
            }
        }
    }

    /// Record a new local size and tell the leader.
    ///
    /// The local screen is updated even if the call fails, so the next join
    /// carries the new size.
    pub async fn resize(&self, width: i64, height: i64) -> Result<Screen> {
        let mut screen = self.mirror.screen();
        screen.width = width;
        screen.height = height;
        self.mirror.set_screen(screen.clone());
        info!("[sync] resize to {width}x{height}");
        self.client.update_screen(&screen).await
    }
}
