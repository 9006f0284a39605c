//! Leader background loops: price ingest and periodic reference refresh.
//!
//! A refresh pass visits every symbol on the tape. A symbol whose request
//! fails is logged and skipped; the pass carries on and the loop tries again
//! on its next tick.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tw_core::PriceUpdate;
use tw_core::supervisor::ShutdownSignal;
use tw_core::time_util;

use crate::coordinator::Coordinator;
use crate::feed::ReferenceSource;

/// Feed price ticks from the stream into the coordinator.
pub async fn run_ingest(
    coordinator: Arc<Coordinator>,
    mut rx: mpsc::Receiver<PriceUpdate>,
    shutdown: ShutdownSignal,
) -> anyhow::Result<()> {
    info!("[ingest] started");
    loop {
        let update = tokio::select! {
            _ = shutdown.cancelled() => break,
            update = rx.recv() => update,
        };
        let Some(update) = update else { break };
        if !coordinator.ingest_price(update.clone()) {
            debug!("[ingest] dropping tick for {}", update.symbol);
        }
    }
    info!("[ingest] stopped");
    Ok(())
}

/// Load reference data for every symbol. Returns how many succeeded.
pub async fn refresh_details(coordinator: &Coordinator, source: &dyn ReferenceSource) -> usize {
    let mut refreshed = 0;
    for symbol in coordinator.symbols() {
        match source.load_ticker(&symbol).await {
            Ok(reference) => match coordinator.refresh_ticker(&reference) {
                Ok(_) => refreshed += 1,
                // Removed while the request was in flight.
                Err(e) => debug!("[refresh] {symbol}: {e}"),
            },
            Err(e) => warn!("[refresh] details for {symbol} failed: {e}"),
        }
    }
    refreshed
}

/// Reload intraday bars for every symbol. Returns how many changed.
pub async fn refresh_aggregates(coordinator: &Coordinator, source: &dyn ReferenceSource, day: &str) -> usize {
    let mut changed = 0;
    for symbol in coordinator.symbols() {
        match source.today_aggregates(&symbol, day).await {
            Ok(bars) => {
                debug!("[refresh] {symbol}: {} bars", bars.len());
                match coordinator.update_aggregates(&symbol, bars) {
                    Ok(Some(_)) => changed += 1,
                    Ok(None) => {}
                    Err(e) => debug!("[refresh] {symbol}: {e}"),
                }
            }
            Err(e) => warn!("[refresh] aggregates for {symbol} failed: {e}"),
        }
    }
    changed
}

/// Run `refresh_details` every `period` until shutdown.
pub async fn run_details_refresh(
    coordinator: Arc<Coordinator>,
    source: Arc<dyn ReferenceSource>,
    period: Duration,
    shutdown: ShutdownSignal,
) -> anyhow::Result<()> {
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            _ = ticker.tick() => {
                let n = refresh_details(&coordinator, source.as_ref()).await;
                info!("[refresh] details refreshed for {n} ticker(s)");
            }
        }
    }
}

/// Run `refresh_aggregates` every `period` until shutdown. The first pass
/// runs immediately.
pub async fn run_aggregates_refresh(
    coordinator: Arc<Coordinator>,
    source: Arc<dyn ReferenceSource>,
    period: Duration,
    shutdown: ShutdownSignal,
) -> anyhow::Result<()> {
    let mut ticker = tokio::time::interval(period);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            _ = ticker.tick() => {
                let day = time_util::trading_day(time_util::now_ms());
                let n = refresh_aggregates(&coordinator, source.as_ref(), &day).await;
                debug!("[refresh] aggregates changed for {n} ticker(s)");
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use async_trait::async_trait;
    use tw_core::{Aggregate, PresentationSettings, Result, Ticker, TickerWallError};

    use super::*;
    use crate::coordinator::CoordinatorConfig;

    /// Serves canned data; symbols starting with `BAD` fail.
    pub(crate) struct FakeSource;

    #[async_trait]
    impl ReferenceSource for FakeSource {
        async fn load_ticker(&self, symbol: &str) -> Result<Ticker> {
            if symbol.starts_with("BAD") {
                return Err(TickerWallError::Feed(format!("{symbol}: HTTP 500")));
            }
            let mut t = Ticker::new(symbol);
            t.company_name = format!("{symbol} Inc.");
            t.previous_close_price = 100.0;
            t.outstanding_shares = 1_000;
            t.apply_price(101.0);
            Ok(t)
        }

        async fn today_aggregates(&self, symbol: &str, _day: &str) -> Result<Vec<Aggregate>> {
            if symbol.starts_with("BAD") {
                return Err(TickerWallError::Feed("timeout".into()));
            }
            Ok(vec![Aggregate { timestamp_ms: 1, close: 100.0, ..Default::default() }])
        }
    }

    fn coordinator(symbols: &[&str]) -> Arc<Coordinator> {
        let c = Arc::new(Coordinator::new(CoordinatorConfig::default(), PresentationSettings::default()));
        for s in symbols {
            c.add_ticker(Ticker::new(*s)).unwrap();
        }
        c
    }

    #[tokio::test]
    async fn failed_symbol_is_skipped() {
        let c = coordinator(&["AAPL", "BADX", "MSFT"]);
        assert_eq!(refresh_details(&c, &FakeSource).await, 2);

        let tickers = c.tickers();
        assert_eq!(tickers[0].company_name, "AAPL Inc.");
        assert_eq!(tickers[0].price, 101.0);
        assert_eq!(tickers[1].company_name, "");
        assert_eq!(tickers[2].market_cap, 101_000.0);
    }

    #[tokio::test]
    async fn aggregates_refresh_counts_changes() {
        let c = coordinator(&["AAPL", "BADX"]);
        assert_eq!(refresh_aggregates(&c, &FakeSource, "2024-03-15").await, 1);
        assert_eq!(refresh_aggregates(&c, &FakeSource, "2024-03-15").await, 0);
        assert_eq!(c.tickers()[0].recent_aggregates.len(), 1);
    }

    #[tokio::test]
    async fn ingest_applies_prices_until_shutdown() {
        let c = coordinator(&["AAPL"]);
        let (tx, rx) = mpsc::channel(8);
        let shutdown = ShutdownSignal::new();
        let task = tokio::spawn(run_ingest(Arc::clone(&c), rx, shutdown.clone()));

        tx.send(PriceUpdate { symbol: "AAPL".into(), price: 42.0 }).await.unwrap();
        drop(tx);
        task.await.unwrap().unwrap();
        assert_eq!(c.tickers()[0].price, 42.0);
    }
}
