//! Market-data feed adapter.
//!
//! Two halves, both vendor-specific behind thin seams:
//!
//! - [`ReferenceSource`]: request/response reference data (company name,
//!   previous close, shares outstanding, intraday bars), implemented by
//!   [`rest::PolygonRest`].
//! - [`stream::PolygonStream`]: realtime trades or minute bars over a
//!   websocket, turned into [`PriceUpdate`](tw_core::PriceUpdate)s.

pub mod rest;
pub mod stream;

use async_trait::async_trait;
use tw_core::{Aggregate, Result, Ticker};

pub use rest::PolygonRest;
pub use stream::PolygonStream;

/// Source of per-symbol reference data.
#[async_trait]
pub trait ReferenceSource: Send + Sync {
    /// Company details, previous close and latest price for `symbol`.
    async fn load_ticker(&self, symbol: &str) -> Result<Ticker>;

    /// Intraday bars for `symbol` on `day` (`YYYY-MM-DD`).
    async fn today_aggregates(&self, symbol: &str, day: &str) -> Result<Vec<Aggregate>>;
}
