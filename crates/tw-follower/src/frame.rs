//! Headless frame loop.
//!
//! Computes each frame the way a renderer would and reports it through
//! `tracing`: the full placement list at `trace`, announcement and status
//! transitions at `info`.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{info, trace};
use tw_core::supervisor::ShutdownSignal;
use tw_core::time_util;

use crate::mirror::{ConnectionStatus, Mirror};

pub async fn run_frame_loop(mirror: Arc<Mirror>, interval: Duration, shutdown: ShutdownSignal) -> anyhow::Result<()> {
    let mut ticker = tokio::time::interval(interval.max(Duration::from_millis(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let mut last_status: Option<ConnectionStatus> = None;
    let mut showing: Option<i64> = None;

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => return Ok(()),
            _ = ticker.tick() => {}
        }

        let now = time_util::now_ms();
        mirror.collect_expired(now);
        let width = mirror.screen().width;
        let frame = mirror.frame(now, width);

        if last_status != Some(frame.status) {
            if frame.status != ConnectionStatus::Connected {
                info!("[frame] showing {:?} indicator", frame.status);
            }
            last_status = Some(frame.status);
        }

        let current = frame.announcement.as_ref().map(|a| a.show_at_timestamp_ms);
        if current != showing {
            if let Some(a) = &frame.announcement {
                info!("[frame] announcement ({:?}, {:?}): {}", a.kind, a.animation, a.message);
            }
            showing = current;
        }

        trace!(
            "[frame] offset={} tickers={}",
            frame.global_offset,
            frame.placements.iter().map(|p| format!("{}@{}", p.ticker.symbol, p.offset)).collect::<Vec<_>>().join(" ")
        );
    }
}
