//! The leader → follower update vocabulary.

use serde::{Deserialize, Serialize};

use super::{Announcement, PresentationSettings, PriceUpdate, ScreenCluster, Ticker};

/// One change to leader-owned state, carrying the whole changed entity.
///
/// Serialized as `{"type": "...", "payload": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Update {
    ClusterChanged(ScreenCluster),
    TickerAdded(Ticker),
    TickerRemoved(Ticker),
    TickerUpdated(Ticker),
    PriceChanged(PriceUpdate),
    AnnouncementCreated(Announcement),
    PresentationChanged(PresentationSettings),
}

impl Update {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Update::ClusterChanged(_) => "cluster_changed",
            Update::TickerAdded(_) => "ticker_added",
            Update::TickerRemoved(_) => "ticker_removed",
            Update::TickerUpdated(_) => "ticker_updated",
            Update::PriceChanged(_) => "price_changed",
            Update::AnnouncementCreated(_) => "announcement_created",
            Update::PresentationChanged(_) => "presentation_changed",
        }
    }
}
