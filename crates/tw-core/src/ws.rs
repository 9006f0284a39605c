//! WebSocket helpers shared by the feed stream, the join stream and the
//! follower: connect, reconnect backoff, and ping keep-alive with a read
//! deadline.

use std::time::Duration;

use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::debug;

use crate::error::TickerWallError;
use crate::supervisor::ShutdownSignal;

pub type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Open a websocket (plain or TLS, from the URL scheme).
pub async fn connect(url: &str) -> Result<WsStream, TickerWallError> {
    let parsed = url::Url::parse(url).map_err(|e| TickerWallError::Connection(format!("{url}: {e}")))?;
    if !matches!(parsed.scheme(), "ws" | "wss") {
        return Err(TickerWallError::Connection(format!("{url}: not a websocket url")));
    }

    let request = parsed
        .as_str()
        .into_client_request()
        .map_err(|e| TickerWallError::Connection(format!("{url}: {e}")))?;

    debug!("[ws] connecting to {} ({})", url, parsed.host_str().unwrap_or(""));
    let (stream, _response) = tokio_tungstenite::connect_async(request)
        .await
        .map_err(|e| TickerWallError::Connection(format!("{url}: {e}")))?;
    Ok(stream)
}

/// Websocket URL for `path` on the server at the HTTP base URL `base`
/// (`http` becomes `ws`, `https` becomes `wss`).
pub fn ws_url(base: &str, path: &str) -> Result<String, TickerWallError> {
    let mut url = url::Url::parse(base).map_err(|e| TickerWallError::Config(format!("{base}: {e}")))?;
    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => return Err(TickerWallError::Config(format!("{base}: unsupported scheme {other}"))),
    };
    url.set_scheme(scheme)
        .map_err(|_| TickerWallError::Config(format!("{base}: cannot switch scheme")))?;
    url.set_path(path);
    Ok(url.to_string())
}

/// Exponential reconnect backoff: 100 ms doubling up to a ceiling.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub const INITIAL: Duration = Duration::from_millis(100);

    pub fn new(max: Duration) -> Self {
        Self { initial: Self::INITIAL, max: max.max(Self::INITIAL), current: Self::INITIAL }
    }

    /// Delay to wait now; the next one doubles.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = (self.current * 2).min(self.max);
        delay
    }

    /// Call after a successful connect.
    pub fn reset(&mut self) {
        self.current = self.initial;
    }

    /// Sleep for the next delay. Returns `false` if shutdown arrived first.
    pub async fn wait(&mut self, shutdown: &ShutdownSignal) -> bool {
        let delay = self.next_delay();
        tokio::select! {
            _ = tokio::time::sleep(delay) => true,
            _ = shutdown.cancelled() => false,
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

/// Ping cadence and read deadline for a long-lived websocket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeepAlive {
    pub ping_interval: Duration,
    /// Silence (no frame of any kind, pongs included) after which the peer is
    /// presumed gone.
    pub idle_timeout: Duration,
}

impl KeepAlive {
    /// Ping every `ping_interval`; give up after three intervals of silence.
    pub fn every(ping_interval: Duration) -> Self {
        let ping_interval = ping_interval.max(Duration::from_millis(1));
        Self { ping_interval, idle_timeout: ping_interval * 3 }
    }

    /// Ping ticker. The first tick is one interval out.
    pub fn ticker(&self) -> Interval {
        let mut ticker = tokio::time::interval_at(Instant::now() + self.ping_interval, self.ping_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker
    }

    pub fn liveness(&self) -> Liveness {
        Liveness::new(self.idle_timeout)
    }
}

impl Default for KeepAlive {
    fn default() -> Self {
        Self::every(Duration::from_secs(15))
    }
}

/// When a peer was last heard from.
#[derive(Debug, Clone, Copy)]
pub struct Liveness {
    last_seen: Instant,
    idle_timeout: Duration,
}

impl Liveness {
    pub fn new(idle_timeout: Duration) -> Self {
        Self { last_seen: Instant::now(), idle_timeout }
    }

    /// Record that something arrived.
    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    pub fn idle_timeout(&self) -> Duration {
        self.idle_timeout
    }

    /// Resolves once the peer has been silent for the idle timeout.
    pub async fn expired(&self) {
        tokio::time::sleep_until(self.last_seen + self.idle_timeout).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let mut b = Backoff::new(Duration::from_millis(500));
        let delays: Vec<u128> = (0..6).map(|_| b.next_delay().as_millis()).collect();
        assert_eq!(delays, vec![100, 200, 400, 500, 500, 500]);
        b.reset();
        assert_eq!(b.next_delay(), Duration::from_millis(100));
    }

    #[test]
    fn http_base_becomes_ws() {
        assert_eq!(ws_url("http://localhost:6886", "/rpc/join").unwrap(), "ws://localhost:6886/rpc/join");
        assert_eq!(ws_url("https://wall.example.com", "/rpc/join").unwrap(), "wss://wall.example.com/rpc/join");
        assert!(ws_url("ftp://x", "/").is_err());
    }

    #[tokio::test]
    async fn backoff_wait_stops_on_shutdown() {
        let signal = ShutdownSignal::new();
        signal.trigger();
        let mut b = Backoff::new(Duration::from_secs(60));
        b.current = Duration::from_secs(60);
        assert!(!b.wait(&signal).await);
    }

    #[test]
    fn keepalive_gives_up_after_three_intervals() {
        let k = KeepAlive::every(Duration::from_secs(10));
        assert_eq!(k.idle_timeout, Duration::from_secs(30));
        assert_eq!(KeepAlive::default().ping_interval, Duration::from_secs(15));
    }

    #[tokio::test]
    async fn liveness_expires_without_traffic_and_touch_extends_it() {
        let mut live = Liveness::new(Duration::from_millis(300));
        tokio::time::sleep(Duration::from_millis(200)).await;
        live.touch();
        // Just touched: still alive 100 ms later.
        assert!(tokio::time::timeout(Duration::from_millis(100), live.expired()).await.is_err());
        tokio::time::timeout(Duration::from_secs(2), live.expired()).await.unwrap();
    }

    #[tokio::test]
    async fn ticker_skips_the_immediate_tick() {
        let k = KeepAlive::every(Duration::from_millis(200));
        let mut ticker = k.ticker();
        assert!(tokio::time::timeout(Duration::from_millis(50), ticker.tick()).await.is_err());
    }

    #[tokio::test]
    async fn connect_rejects_non_ws_scheme() {
        assert!(matches!(connect("http://localhost:1").await, Err(TickerWallError::Connection(_))));
    }
}
