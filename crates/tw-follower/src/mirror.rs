//! Follower-side copy of leader state.
//!
//! The sync loop writes into the mirror one whole update at a time; the frame
//! loop reads consistent snapshots out of it.

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::Serialize;
use tracing::{debug, info};
use tw_core::layout::{self, Placement};
use tw_core::{Announcement, Screen, ScreenCluster, Ticker, Update, remove_ticker, upsert_ticker};

/// Link state to the leader, shown by the renderer as a reconnect indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MirrorState {
    /// This follower's own screen.
    pub screen: Screen,
    pub tickers: Vec<Ticker>,
    pub cluster: ScreenCluster,
    pub announcement: Option<Announcement>,
    pub status: ConnectionStatus,
}

impl MirrorState {
    pub fn new(screen: Screen) -> Self {
        Self {
            screen,
            tickers: Vec::new(),
            cluster: ScreenCluster::default(),
            announcement: None,
            status: ConnectionStatus::Disconnected,
        }
    }

    pub fn apply(&mut self, update: Update) {
        match update {
            Update::ClusterChanged(cluster) => {
                self.cluster = cluster;
            }
            Update::TickerAdded(ticker) | Update::TickerUpdated(ticker) => {
                upsert_ticker(&mut self.tickers, ticker);
            }
            Update::TickerRemoved(ticker) => {
                if remove_ticker(&mut self.tickers, &ticker.symbol).is_none() {
                    debug!("[mirror] remove of unknown ticker {}", ticker.symbol);
                }
            }
            Update::PriceChanged(tick) => match self.tickers.iter_mut().find(|t| t.symbol == tick.symbol) {
                Some(ticker) => ticker.apply_price(tick.price),
                None => debug!("[mirror] price for unknown ticker {}", tick.symbol),
            },
            Update::AnnouncementCreated(announcement) => {
                info!("[mirror] announcement '{}'", announcement.message);
                self.announcement = Some(announcement);
            }
            Update::PresentationChanged(settings) => {
                self.cluster.settings = settings;
            }
        }
    }
}

/// A ticker to draw and its x position on this screen.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedTicker {
    pub ticker: Ticker,
    pub offset: i64,
}

impl From<Placement<'_>> for RenderedTicker {
    fn from(p: Placement<'_>) -> Self {
        Self { ticker: p.ticker.clone(), offset: p.offset }
    }
}

/// Everything the renderer needs for one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub status: ConnectionStatus,
    pub global_offset: i64,
    pub placements: Vec<RenderedTicker>,
    /// Present only while it should be on screen.
    pub announcement: Option<Announcement>,
}

#[derive(Debug)]
pub struct Mirror {
    state: RwLock<MirrorState>,
}

impl Mirror {
    pub fn new(screen: Screen) -> Self {
        Self { state: RwLock::new(MirrorState::new(screen)) }
    }

    fn read(&self) -> RwLockReadGuard<'_, MirrorState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, MirrorState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn apply(&self, update: Update) {
        self.write().apply(update);
    }

    /// Replace the ticker list with a fresh snapshot from the leader.
    pub fn load_tickers(&self, mut tickers: Vec<Ticker>) {
        tw_core::sort_and_index(&mut tickers);
        self.write().tickers = tickers;
    }

    pub fn status(&self) -> ConnectionStatus {
        self.read().status
    }

    pub fn set_status(&self, status: ConnectionStatus) {
        let mut state = self.write();
        if state.status != status {
            info!("[mirror] {:?} -> {:?}", state.status, status);
            state.status = status;
        }
    }

    pub fn screen(&self) -> Screen {
        self.read().screen.clone()
    }

    pub fn set_screen(&self, screen: Screen) {
        self.write().screen = screen;
    }

    pub fn snapshot(&self) -> MirrorState {
        self.read().clone()
    }

    /// Lay out the tape for this screen at `now_ms`.
    pub fn frame(&self, now_ms: i64, viewport_width: i64) -> Frame {
        let state = self.read();
        let settings = &state.cluster.settings;
        let global_offset = layout::scroll_offset(now_ms, settings.scroll_speed);
        let animation_ms = i64::from(settings.animation_duration_ms);

        let placements = layout::placements(
            global_offset,
            &state.cluster,
            &state.tickers,
            state.screen.uuid,
            viewport_width,
        )
        .into_iter()
        .map(RenderedTicker::from)
        .collect();

        let announcement = state.announcement.as_ref().filter(|a| a.is_renderable(now_ms, animation_ms)).cloned();

        Frame { status: state.status, global_offset, placements, announcement }
    }

    /// Drop an announcement whose window has passed. Returns whether one was
    /// dropped.
    pub fn collect_expired(&self, now_ms: i64) -> bool {
        let mut state = self.write();
        let animation_ms = i64::from(state.cluster.settings.animation_duration_ms);
        if state.announcement.as_ref().is_some_and(|a| a.is_expired(now_ms, animation_ms)) {
            state.announcement = None;
            return true;
        }
        false
    }
}
