//! Authoritative cluster state and update fan-out.
//!
//! ```text
//!  feed / admin / RPC ──► Coordinator ops ──► broadcast queue ──► run_fanout
//!                                                                   │
//!                                     ┌─────────────┬───────────────┤
//!                                     ▼             ▼               ▼
//!                               client queue   client queue   client queue
//!                               (bounded)      (bounded)      (bounded)
//! ```
//!
//! Membership changes enqueue a [`Broadcast::Membership`] marker instead of a
//! ready `ClusterChanged`; the fan-out loop resolves it against the cluster as
//! it is at delivery time, so followers can never receive a cluster snapshot
//! older than one they already have.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use ahash::AHashMap;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tracing::{debug, info, warn};
use tw_core::config::LeaderConfig;
use tw_core::supervisor::ShutdownSignal;
use tw_core::{
    Aggregate, Announcement, PresentationSettings, PresentationSettingsPatch, PriceUpdate, Result,
    Screen, ScreenCluster, Ticker, TickerWallError, Update, remove_ticker, time_util, upsert_ticker,
};
use uuid::Uuid;

/// Coordinator tuning knobs.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub client_queue_size: usize,
    pub announce_grace_ms: i64,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self { client_queue_size: 100, announce_grace_ms: 200 }
    }
}

impl From<&LeaderConfig> for CoordinatorConfig {
    fn from(cfg: &LeaderConfig) -> Self {
        Self { client_queue_size: cfg.client_queue_size, announce_grace_ms: cfg.announce_grace_ms }
    }
}

/// Item on the internal broadcast queue.
#[derive(Debug)]
enum Broadcast {
    /// Send the cluster as it is when delivered.
    Membership,
    Update(Update),
}

/// Why the leader dropped a screen that was still connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Departure {
    /// Removed by an operator.
    Removed,
    /// Fell too far behind the update stream.
    Overflow,
}

struct ClientEntry {
    /// Distinguishes successive joins that reuse one screen UUID.
    session: u64,
    tx: mpsc::Sender<Update>,
    departure: oneshot::Sender<Departure>,
}

impl ClientEntry {
    fn notify(self, uuid: Uuid, reason: Departure) {
        if self.departure.send(reason).is_err() {
            debug!("[coordinator] screen {uuid} already closing");
        }
    }
}

struct LeaderState {
    tickers: Vec<Ticker>,
    /// Joined screens plus the canonical presentation settings.
    cluster: ScreenCluster,
    clients: AHashMap<Uuid, ClientEntry>,
    next_session: u64,
}

impl LeaderState {
    /// Drop `uuid` if `session` is still the live join for it. Returns
    /// whether a screen left the cluster.
    fn remove_session(&mut self, uuid: Uuid, session: u64, reason: Option<Departure>) -> bool {
        if self.clients.get(&uuid).map(|c| c.session) != Some(session) {
            return false;
        }
        if let (Some(entry), Some(reason)) = (self.clients.remove(&uuid), reason) {
            entry.notify(uuid, reason);
        }
        self.cluster.remove(uuid).is_ok()
    }
}

/// Owner of all leader state. Shared as `Arc<Coordinator>`.
pub struct Coordinator {
    config: CoordinatorConfig,
    state: RwLock<LeaderState>,
    broadcast_tx: mpsc::UnboundedSender<Broadcast>,
    broadcast_rx: Mutex<mpsc::UnboundedReceiver<Broadcast>>,
    symbols_tx: watch::Sender<Vec<String>>,
}

impl Coordinator {
    pub fn new(config: CoordinatorConfig, settings: PresentationSettings) -> Self {
        let (broadcast_tx, broadcast_rx) = mpsc::unbounded_channel();
        let (symbols_tx, _) = watch::channel(Vec::new());
        Self {
            config,
            state: RwLock::new(LeaderState {
                tickers: Vec::new(),
                cluster: ScreenCluster::new(settings),
                clients: AHashMap::new(),
                next_session: 0,
            }),
            broadcast_tx,
            broadcast_rx: Mutex::new(broadcast_rx),
            symbols_tx,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, LeaderState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, LeaderState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn broadcast(&self, item: Broadcast) {
        // The receiver lives as long as `self`.
        let _ = self.broadcast_tx.send(item);
    }

    fn publish(&self, update: Update) {
        debug!("[coordinator] queue {}", update.kind());
        self.broadcast(Broadcast::Update(update));
    }

    // -----------------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------------

    /// Add a screen to the cluster and open its update queue.
    ///
    /// The queue is seeded with the post-join cluster, so that is always the
    /// first update the screen sees.
    pub fn join(self: &Arc<Self>, screen: Screen) -> Result<Subscription> {
        let uuid = screen.uuid;
        let (tx, rx) = mpsc::channel(self.config.client_queue_size.max(1));
        let (departure, departure_rx) = oneshot::channel();

        let session = {
            let mut state = self.write();
            if state.clients.contains_key(&uuid) {
                return Err(TickerWallError::DuplicateScreen(uuid));
            }
            state.cluster.insert(screen.clone());
            if let Err(e) = tx.try_send(Update::ClusterChanged(state.cluster.clone())) {
                warn!("[coordinator] screen {uuid} missed its first cluster: {e}");
            }
            state.next_session += 1;
            let session = state.next_session;
            state.clients.insert(uuid, ClientEntry { session, tx, departure });
            session
        };

        info!(
            "[coordinator] screen {uuid} joined (index={}, {}x{})",
            screen.index, screen.width, screen.height
        );
        self.broadcast(Broadcast::Membership);

        Ok(Subscription { uuid, session, rx, departure: departure_rx, coordinator: Arc::clone(self) })
    }

    /// Remove a screen from the cluster. Its subscription ends with
    /// [`Departure::Removed`].
    pub fn leave(&self, uuid: Uuid) -> Result<Screen> {
        let screen = {
            let mut state = self.write();
            let screen = state.cluster.remove(uuid)?;
            if let Some(entry) = state.clients.remove(&uuid) {
                entry.notify(uuid, Departure::Removed);
            }
            screen
        };
        info!("[coordinator] screen {uuid} removed");
        self.broadcast(Broadcast::Membership);
        Ok(screen)
    }

    /// Leave on behalf of a closing subscription, unless the screen has
    /// already been dropped or has rejoined since.
    fn release(&self, uuid: Uuid, session: u64) {
        let removed = self.write().remove_session(uuid, session, None);
        if removed {
            info!("[coordinator] screen {uuid} disconnected");
            self.broadcast(Broadcast::Membership);
        }
    }

    /// Replace a member's screen description (resize or reorder).
    pub fn update_screen(&self, screen: Screen) -> Result<Screen> {
        self.write().cluster.replace(screen.clone())?;
        info!(
            "[coordinator] screen {} updated (index={}, {}x{})",
            screen.uuid, screen.index, screen.width, screen.height
        );
        self.broadcast(Broadcast::Membership);
        Ok(screen)
    }

    // -----------------------------------------------------------------------
    // Presentation
    // -----------------------------------------------------------------------

    /// Schedule an announcement slightly in the future so every screen has it
    /// before it starts.
    pub fn announce(&self, mut announcement: Announcement) -> Result<Announcement> {
        announcement.validate()?;
        announcement.show_at_timestamp_ms = time_util::now_ms() + self.config.announce_grace_ms;
        info!("[coordinator] announcement '{}' at {}", announcement.message, announcement.show_at_timestamp_ms);
        self.publish(Update::AnnouncementCreated(announcement.clone()));
        Ok(announcement)
    }

    /// Merge the fields set in `patch` into the current settings.
    pub fn update_presentation_settings(&self, patch: PresentationSettingsPatch) -> Result<PresentationSettings> {
        patch.validate()?;
        let settings = {
            let mut state = self.write();
            patch.apply(&mut state.cluster.settings);
            state.cluster.settings.clone()
        };
        info!("[coordinator] presentation settings updated");
        self.publish(Update::PresentationChanged(settings.clone()));
        Ok(settings)
    }

    // -----------------------------------------------------------------------
    // Tickers
    // -----------------------------------------------------------------------

    /// Put a new symbol on the tape. The symbol is upper-cased.
    pub fn add_ticker(&self, mut ticker: Ticker) -> Result<Ticker> {
        ticker.symbol = ticker.symbol.trim().to_uppercase();
        if ticker.symbol.is_empty() {
            return Err(TickerWallError::Validation("ticker symbol is empty".into()));
        }

        let (added, symbols) = {
            let mut state = self.write();
            if state.tickers.iter().any(|t| t.symbol == ticker.symbol) {
                return Err(TickerWallError::DuplicateTicker(ticker.symbol));
            }
            let symbol = ticker.symbol.clone();
            upsert_ticker(&mut state.tickers, ticker);
            // Re-read to pick up the assigned index.
            let added = find(&state.tickers, &symbol).cloned().unwrap_or_default();
            (added, symbol_list(&state.tickers))
        };

        info!("[coordinator] ticker {} added ({} on tape)", added.symbol, symbols.len());
        self.symbols_tx.send_replace(symbols);
        self.publish(Update::TickerAdded(added.clone()));
        Ok(added)
    }

    pub fn remove_ticker(&self, symbol: &str) -> Result<Ticker> {
        let symbol = symbol.trim().to_uppercase();
        let (removed, symbols) = {
            let mut state = self.write();
            let removed = remove_ticker(&mut state.tickers, &symbol)
                .ok_or_else(|| TickerWallError::UnknownTicker(symbol.clone()))?;
            (removed, symbol_list(&state.tickers))
        };

        info!("[coordinator] ticker {} removed ({} on tape)", removed.symbol, symbols.len());
        self.symbols_tx.send_replace(symbols);
        self.publish(Update::TickerRemoved(removed.clone()));
        Ok(removed)
    }

    /// Apply a live price tick. Ticks for symbols not on the tape are
    /// dropped; returns whether the tick was used.
    pub fn ingest_price(&self, update: PriceUpdate) -> bool {
        {
            let mut state = self.write();
            match state.tickers.iter_mut().find(|t| t.symbol == update.symbol) {
                Some(ticker) => ticker.apply_price(update.price),
                None => return false,
            }
        }
        self.publish(Update::PriceChanged(update));
        true
    }

    /// Merge freshly loaded reference data (name, previous close, shares)
    /// into a ticker. A ticker that has never seen a price also takes the
    /// reference price.
    pub fn refresh_ticker(&self, reference: &Ticker) -> Result<Ticker> {
        let updated = {
            let mut state = self.write();
            let ticker = state
                .tickers
                .iter_mut()
                .find(|t| t.symbol == reference.symbol)
                .ok_or_else(|| TickerWallError::UnknownTicker(reference.symbol.clone()))?;
            ticker.merge_reference(reference);
            if ticker.price == 0.0 && reference.price > 0.0 {
                ticker.apply_price(reference.price);
            }
            ticker.clone()
        };
        self.publish(Update::TickerUpdated(updated.clone()));
        Ok(updated)
    }

    /// Replace a ticker's intraday bars. Returns `None` when nothing changed
    /// (no update is broadcast).
    pub fn update_aggregates(&self, symbol: &str, aggregates: Vec<Aggregate>) -> Result<Option<Ticker>> {
        let updated = {
            let mut state = self.write();
            let ticker = state
                .tickers
                .iter_mut()
                .find(|t| t.symbol == symbol)
                .ok_or_else(|| TickerWallError::UnknownTicker(symbol.to_string()))?;
            if ticker.recent_aggregates == aggregates {
                return Ok(None);
            }
            ticker.recent_aggregates = aggregates;
            ticker.clone()
        };
        self.publish(Update::TickerUpdated(updated.clone()));
        Ok(Some(updated))
    }

    // -----------------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------------

    pub fn tickers(&self) -> Vec<Ticker> {
        self.read().tickers.clone()
    }

    pub fn cluster(&self) -> ScreenCluster {
        self.read().cluster.clone()
    }

    pub fn settings(&self) -> PresentationSettings {
        self.read().cluster.settings.clone()
    }

    pub fn symbols(&self) -> Vec<String> {
        symbol_list(&self.read().tickers)
    }

    /// Watch the symbol set (used by the price stream to resubscribe).
    pub fn subscribe_symbols(&self) -> watch::Receiver<Vec<String>> {
        self.symbols_tx.subscribe()
    }

    pub fn client_count(&self) -> usize {
        self.read().clients.len()
    }

    // -----------------------------------------------------------------------
    // Fan-out
    // -----------------------------------------------------------------------

    /// Drain the broadcast queue into every client queue until shutdown.
    pub async fn run_fanout(&self, shutdown: ShutdownSignal) -> anyhow::Result<()> {
        let mut rx = self.broadcast_rx.lock().await;
        info!("[fanout] started");
        loop {
            let item = tokio::select! {
                _ = shutdown.cancelled() => break,
                item = rx.recv() => item,
            };
            match item {
                Some(item) => self.deliver(item),
                None => break,
            }
        }
        info!("[fanout] stopped");
        Ok(())
    }

    /// Deliver one broadcast. Locks are held only while snapshotting.
    fn deliver(&self, item: Broadcast) {
        let (update, targets) = {
            let state = self.read();
            let update = match item {
                Broadcast::Membership => Update::ClusterChanged(state.cluster.clone()),
                Broadcast::Update(update) => update,
            };
            let targets: Vec<(Uuid, u64, mpsc::Sender<Update>)> =
                state.clients.iter().map(|(uuid, c)| (*uuid, c.session, c.tx.clone())).collect();
            (update, targets)
        };

        let mut overflowed = Vec::new();
        for (uuid, session, tx) in targets {
            match tx.try_send(update.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!("[fanout] screen {uuid} queue full, disconnecting");
                    overflowed.push((uuid, session));
                }
                // Its subscription is closing and will release the screen.
                Err(TrySendError::Closed(_)) => debug!("[fanout] screen {uuid} queue closed"),
            }
        }

        for (uuid, session) in overflowed {
            self.disconnect(uuid, session);
        }
    }

    /// Drop a slow client. Its queue closes once drained, which ends its
    /// send loop. A screen that rejoined since the snapshot is left alone.
    fn disconnect(&self, uuid: Uuid, session: u64) {
        let removed = self.write().remove_session(uuid, session, Some(Departure::Overflow));
        if removed {
            self.broadcast(Broadcast::Membership);
        }
    }

    /// Deliver everything queued so far without waiting.
    #[cfg(test)]
    fn pump(&self) {
        let mut rx = self.broadcast_rx.try_lock().expect("fan-out not running in tests");
        while let Ok(item) = rx.try_recv() {
            self.deliver(item);
        }
    }
}

fn find<'a>(tickers: &'a [Ticker], symbol: &str) -> Option<&'a Ticker> {
    tickers.iter().find(|t| t.symbol == symbol)
}

fn symbol_list(tickers: &[Ticker]) -> Vec<String> {
    tickers.iter().map(|t| t.symbol.clone()).collect()
}

/// One screen's stream of updates. Dropping it removes the screen from the
/// cluster.
pub struct Subscription {
    uuid: Uuid,
    session: u64,
    rx: mpsc::Receiver<Update>,
    departure: oneshot::Receiver<Departure>,
    coordinator: Arc<Coordinator>,
}

impl Subscription {
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Next update; `None` once the leader has dropped this screen.
    pub async fn recv(&mut self) -> Option<Update> {
        self.rx.recv().await
    }

    /// Why the leader ended this subscription, once [`recv`](Self::recv)
    /// has returned `None`. `None` if it was not the leader's doing.
    pub fn departure(&mut self) -> Option<Departure> {
        self.departure.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.coordinator.release(self.uuid, self.session);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tw_core::AnnouncementKind;

    use super::*;

    fn coordinator(queue: usize) -> Arc<Coordinator> {
        Arc::new(Coordinator::new(
            CoordinatorConfig { client_queue_size: queue, announce_grace_ms: 200 },
            PresentationSettings::default(),
        ))
    }

    fn drain(sub: &mut Subscription) -> Vec<Update> {
        std::iter::from_fn(|| sub.rx.try_recv().ok()).collect()
    }

    fn indices(update: &Update) -> Vec<i32> {
        match update {
            Update::ClusterChanged(c) => c.screens.iter().map(|s| s.index).collect(),
            other => panic!("expected cluster, got {}", other.kind()),
        }
    }

    #[test]
    fn first_update_is_the_cluster() {
        let c = coordinator(16);
        c.add_ticker(Ticker::new("AAPL")).unwrap();
        let mut sub = c.join(Screen::new(1920, 300, 1)).unwrap();
        let first = sub.rx.try_recv().unwrap();
        assert_eq!(indices(&first), vec![1]);
    }

    #[test]
    fn join_and_leave_are_broadcast() {
        let c = coordinator(16);
        let mut a = c.join(Screen::new(1000, 100, 2)).unwrap();
        let b = c.join(Screen::new(1000, 100, 1)).unwrap();
        c.pump();

        let seen: Vec<Vec<i32>> = drain(&mut a).iter().map(indices).collect();
        // Seed, then one Membership per join, each resolved at delivery.
        assert_eq!(seen, vec![vec![2], vec![1, 2], vec![1, 2]]);

        let b_uuid = b.uuid();
        drop(b);
        c.pump();
        assert!(!c.cluster().contains(b_uuid));
        let last = drain(&mut a).pop().unwrap();
        assert_eq!(indices(&last), vec![2]);
    }

    #[test]
    fn duplicate_join_is_rejected() {
        let c = coordinator(16);
        let screen = Screen::new(1000, 100, 1);
        let _sub = c.join(screen.clone()).unwrap();
        assert!(matches!(c.join(screen), Err(TickerWallError::DuplicateScreen(_))));
        assert_eq!(c.cluster().number_of_screens(), 1);
    }

    #[test]
    fn stale_subscription_does_not_remove_rejoined_screen() {
        let c = coordinator(16);
        let screen = Screen::new(1000, 100, 1);
        let old = c.join(screen.clone()).unwrap();
        c.release(old.uuid, old.session);
        let _new = c.join(screen.clone()).unwrap();
        drop(old);
        assert!(c.cluster().contains(screen.uuid));
        assert_eq!(c.client_count(), 1);
    }

    #[test]
    fn stale_overflow_does_not_remove_rejoined_screen() {
        let c = coordinator(16);
        let screen = Screen::new(1000, 100, 1);
        let old = c.join(screen.clone()).unwrap();
        let old_session = old.session;
        c.release(old.uuid, old_session);
        let mut new = c.join(screen.clone()).unwrap();

        c.disconnect(screen.uuid, old_session);
        assert!(c.cluster().contains(screen.uuid));
        assert_eq!(c.client_count(), 1);
        assert_eq!(new.departure(), None);

        c.disconnect(screen.uuid, new.session);
        assert!(!c.cluster().contains(screen.uuid));
        assert_eq!(new.departure(), Some(Departure::Overflow));
    }

    #[test]
    fn leave_ends_the_subscription_as_removed() {
        let c = coordinator(16);
        let mut a = c.join(Screen::new(1000, 100, 1)).unwrap();
        let mut b = c.join(Screen::new(1000, 100, 2)).unwrap();

        let removed = c.leave(a.uuid()).unwrap();
        assert_eq!(removed.index, 1);
        assert!(!c.cluster().contains(a.uuid()));
        assert_eq!(c.client_count(), 1);

        drain(&mut a);
        assert!(a.rx.is_closed());
        assert_eq!(a.departure(), Some(Departure::Removed));

        c.pump();
        assert_eq!(indices(&drain(&mut b).pop().unwrap()), vec![2]);
        assert_eq!(b.departure(), None);
        assert!(matches!(c.leave(a.uuid()), Err(TickerWallError::UnknownScreen(_))));
    }

    #[test]
    fn update_screen_unknown_uuid() {
        let c = coordinator(16);
        let err = c.update_screen(Screen::new(1, 1, 1)).unwrap_err();
        assert!(matches!(err, TickerWallError::UnknownScreen(_)));
    }

    #[test]
    fn update_screen_reorders_and_broadcasts() {
        let c = coordinator(16);
        let mut a = c.join(Screen::new(1000, 100, 1)).unwrap();
        let _b = c.join(Screen::new(1000, 100, 2)).unwrap();
        let mut moved = c.cluster().screens[0].clone();
        moved.index = 3;
        moved.width = 800;
        c.update_screen(moved.clone()).unwrap();
        c.pump();

        let last = drain(&mut a).pop().unwrap();
        assert_eq!(indices(&last), vec![2, 3]);
        assert_eq!(c.cluster().screen_offset(moved.uuid), Some(1000));
    }

    #[test]
    fn overflow_disconnects_only_the_slow_client() {
        let c = coordinator(4);
        let mut fast = c.join(Screen::new(1000, 100, 1)).unwrap();
        let mut slow = c.join(Screen::new(1000, 100, 2)).unwrap();
        c.add_ticker(Ticker::new("AAPL")).unwrap();
        c.pump();
        drain(&mut fast);

        for i in 0..4 {
            c.ingest_price(PriceUpdate { symbol: "AAPL".into(), price: 100.0 + f64::from(i) });
            c.pump();
            drain(&mut fast);
        }

        assert_eq!(c.cluster().number_of_screens(), 1);
        assert!(c.cluster().contains(fast.uuid()));
        assert_eq!(c.client_count(), 1);

        // The slow client's queue drains and then closes.
        let rest = drain(&mut slow);
        assert_eq!(rest.len(), 4);
        assert!(slow.rx.is_closed());
        assert_eq!(slow.departure(), Some(Departure::Overflow));
    }

    #[test]
    fn announce_is_stamped_in_the_future() {
        let c = coordinator(16);
        let mut a = c.join(Screen::new(1000, 100, 1)).unwrap();
        let before = time_util::now_ms();
        let mut announcement = Announcement::new("market closes in 5", 2000);
        announcement.kind = AnnouncementKind::Danger;
        announcement.show_at_timestamp_ms = 1;
        let stamped = c.announce(announcement).unwrap();
        assert!(stamped.show_at_timestamp_ms >= before + 200);
        c.pump();
        assert!(matches!(drain(&mut a).last(), Some(Update::AnnouncementCreated(x)) if *x == stamped));
    }

    #[test]
    fn invalid_announcement_is_rejected() {
        let c = coordinator(16);
        assert!(matches!(c.announce(Announcement::new("", 100)), Err(TickerWallError::Validation(_))));
    }

    #[test]
    fn presentation_patch_merges() {
        let c = coordinator(16);
        let patch = PresentationSettingsPatch { ticker_box_width: Some(1000), ..Default::default() };
        let merged = c.update_presentation_settings(patch).unwrap();
        assert_eq!(merged.ticker_box_width, 1000);
        assert_eq!(merged.scroll_speed, PresentationSettings::default().scroll_speed);
        assert_eq!(c.cluster().settings, merged);

        let bad = PresentationSettingsPatch { scroll_speed: Some(0), ..Default::default() };
        assert!(c.update_presentation_settings(bad).is_err());
        assert_eq!(c.settings(), merged);
    }

    #[test]
    fn tickers_stay_sorted_and_indexed() {
        let c = coordinator(16);
        for s in ["msft", "AAPL", "NVDA"] {
            c.add_ticker(Ticker::new(s)).unwrap();
        }
        assert!(matches!(c.add_ticker(Ticker::new("aapl")), Err(TickerWallError::DuplicateTicker(_))));
        let got: Vec<(String, i32)> = c.tickers().into_iter().map(|t| (t.symbol, t.index)).collect();
        assert_eq!(got, vec![("AAPL".into(), 0), ("MSFT".into(), 1), ("NVDA".into(), 2)]);

        c.remove_ticker("aapl").unwrap();
        assert_eq!(c.symbols(), vec!["MSFT".to_string(), "NVDA".to_string()]);
        assert_eq!(c.tickers()[0].index, 0);
        assert!(matches!(c.remove_ticker("AAPL"), Err(TickerWallError::UnknownTicker(_))));
    }

    #[test]
    fn symbol_watch_follows_the_tape() {
        let c = coordinator(16);
        let rx = c.subscribe_symbols();
        c.add_ticker(Ticker::new("AMD")).unwrap();
        assert_eq!(*rx.borrow(), vec!["AMD".to_string()]);
    }

    #[test]
    fn prices_update_canonical_tickers() {
        let c = coordinator(16);
        let mut reference = Ticker::new("AAPL");
        reference.previous_close_price = 100.0;
        reference.outstanding_shares = 10;
        reference.price = 90.0;
        c.add_ticker(Ticker::new("AAPL")).unwrap();
        c.refresh_ticker(&reference).unwrap();
        assert_eq!(c.tickers()[0].price, 90.0);

        assert!(c.ingest_price(PriceUpdate { symbol: "AAPL".into(), price: 110.0 }));
        assert!(!c.ingest_price(PriceUpdate { symbol: "ZZZ".into(), price: 1.0 }));
        let t = &c.tickers()[0];
        assert_eq!(t.market_cap, 1100.0);
        assert!((t.price_change_percentage - (1.0 - 1.1)).abs() < 1e-9);
    }

    #[test]
    fn unchanged_aggregates_are_not_broadcast() {
        let c = coordinator(16);
        c.add_ticker(Ticker::new("AAPL")).unwrap();
        let bars = vec![Aggregate { timestamp_ms: 1, close: 2.0, ..Default::default() }];
        assert!(c.update_aggregates("AAPL", bars.clone()).unwrap().is_some());
        assert!(c.update_aggregates("AAPL", bars).unwrap().is_none());
    }

    #[tokio::test]
    async fn fanout_loop_delivers_and_stops() {
        let c = coordinator(16);
        let shutdown = ShutdownSignal::new();
        let task = tokio::spawn({
            let c = Arc::clone(&c);
            let shutdown = shutdown.clone();
            async move { c.run_fanout(shutdown).await }
        });

        let mut sub = c.join(Screen::new(1000, 100, 1)).unwrap();
        c.add_ticker(Ticker::new("AAPL")).unwrap();

        let mut kinds = Vec::new();
        while kinds.len() < 3 {
            let update = tokio::time::timeout(Duration::from_secs(2), sub.recv()).await.unwrap().unwrap();
            kinds.push(update.kind());
        }
        assert_eq!(kinds, vec!["cluster_changed", "cluster_changed", "ticker_added"]);

        shutdown.trigger();
        task.await.unwrap().unwrap();
    }
}
