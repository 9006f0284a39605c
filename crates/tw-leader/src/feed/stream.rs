//! Polygon realtime stocks websocket.
//!
//! Connects, authenticates, subscribes every symbol on the tape (trades `T.`
//! or minute bars `A.`), and forwards prices onto the ingest channel. The
//! subscription follows the coordinator's symbol set while connected, and the
//! whole session is re-established with exponential backoff after any
//! disconnect, including a connection that goes quiet for longer than the
//! keep-alive's idle timeout.

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};
use tw_core::PriceUpdate;
use tw_core::supervisor::ShutdownSignal;
use tw_core::ws::{self, Backoff, KeepAlive};

/// One event out of a websocket frame.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    Price(PriceUpdate),
    /// Connection/auth status message from the server.
    Status { status: String, message: String },
}

pub struct PolygonStream {
    url: String,
    api_key: String,
    per_tick_updates: bool,
    keepalive: KeepAlive,
}

impl PolygonStream {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>, per_tick_updates: bool) -> Self {
        Self { url: url.into(), api_key: api_key.into(), per_tick_updates, keepalive: KeepAlive::default() }
    }

    pub fn with_keepalive(mut self, keepalive: KeepAlive) -> Self {
        self.keepalive = keepalive;
        self
    }

    fn prefix(&self) -> &'static str {
        if self.per_tick_updates { "T." } else { "A." }
    }

    /// Run until shutdown, or until the ingest side goes away.
    pub async fn run(
        self,
        mut symbols: watch::Receiver<Vec<String>>,
        tx: mpsc::Sender<PriceUpdate>,
        shutdown: ShutdownSignal,
    ) -> anyhow::Result<()> {
        let mut backoff = Backoff::default();

        loop {
            if shutdown.is_cancelled() {
                return Ok(());
            }

            info!("[polygon-ws] connecting to {}", self.url);
            let stream = match ws::connect(&self.url).await {
                Ok(s) => {
                    backoff.reset();
                    info!("[polygon-ws] connected");
                    s
                }
                Err(e) => {
                    error!("[polygon-ws] {e}");
                    if !backoff.wait(&shutdown).await {
                        return Ok(());
                    }
                    continue;
                }
            };

            let (mut write, mut read) = stream.split();

            if let Err(e) = write.send(Message::Text(auth_message(&self.api_key).into())).await {
                error!("[polygon-ws] auth send failed: {e}");
                if !backoff.wait(&shutdown).await {
                    return Ok(());
                }
                continue;
            }

            let mut subscribed = symbols.borrow_and_update().clone();
            if let Some(msg) = subscription_message("subscribe", self.prefix(), &subscribed) {
                debug!("[polygon-ws] {msg}");
                if let Err(e) = write.send(Message::Text(msg.into())).await {
                    error!("[polygon-ws] subscribe send failed: {e}");
                }
            }

            let mut ping = self.keepalive.ticker();
            let mut liveness = self.keepalive.liveness();

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        let _ = write.close().await;
                        return Ok(());
                    }

                    _ = ping.tick() => {
                        if let Err(e) = write.send(Message::Ping(Vec::new().into())).await {
                            error!("[polygon-ws] ping failed: {e}");
                            break;
                        }
                    }

                    _ = liveness.expired() => {
                        warn!("[polygon-ws] no data for {:?}", liveness.idle_timeout());
                        break;
                    }

                    changed = symbols.changed() => {
                        if changed.is_err() {
                            info!("[polygon-ws] symbol source closed");
                            let _ = write.close().await;
                            return Ok(());
                        }
                        let next = symbols.borrow_and_update().clone();
                        let (added, removed) = diff(&subscribed, &next);
                        let messages = [
                            subscription_message("unsubscribe", self.prefix(), &removed),
                            subscription_message("subscribe", self.prefix(), &added),
                        ];
                        for msg in messages.into_iter().flatten() {
                            info!("[polygon-ws] {msg}");
                            if let Err(e) = write.send(Message::Text(msg.into())).await {
                                error!("[polygon-ws] send error: {e}");
                                break;
                            }
                        }
                        subscribed = next;
                    }

                    msg = read.next() => {
                        if matches!(msg, Some(Ok(_))) {
                            liveness.touch();
                        }
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                for event in parse_message(text.as_str()) {
                                    match event {
                                        StreamEvent::Price(update) => {
                                            if tx.send(update).await.is_err() {
                                                info!("[polygon-ws] ingest closed");
                                                return Ok(());
                                            }
                                        }
                                        StreamEvent::Status { status, message } => {
                                            if status.contains("fail") || status == "error" {
                                                warn!("[polygon-ws] {status}: {message}");
                                            } else {
                                                info!("[polygon-ws] {status}: {message}");
                                            }
                                        }
                                    }
                                }
                            }
                            Some(Ok(Message::Ping(data))) => {
                                let _ = write.send(Message::Pong(data)).await;
                            }
                            Some(Ok(Message::Close(_))) => {
                                warn!("[polygon-ws] received close frame");
                                break;
                            }
                            Some(Err(e)) => {
                                error!("[polygon-ws] read error: {e}");
                                break;
                            }
                            None => {
                                warn!("[polygon-ws] stream ended");
                                break;
                            }
                            _ => {}
                        }
                    }
                }
            }

            warn!("[polygon-ws] disconnected, reconnecting");
            if !backoff.wait(&shutdown).await {
                return Ok(());
            }
        }
    }
}

fn auth_message(api_key: &str) -> String {
    serde_json::json!({"action": "auth", "params": api_key}).to_string()
}

/// `{"action": ..., "params": "T.AAPL,T.MSFT"}`; `None` for no symbols.
pub fn subscription_message(action: &str, prefix: &str, symbols: &[String]) -> Option<String> {
    if symbols.is_empty() {
        return None;
    }
    let params: Vec<String> = symbols.iter().map(|s| format!("{prefix}{s}")).collect();
    Some(serde_json::json!({"action": action, "params": params.join(",")}).to_string())
}

/// Symbols to `(subscribe, unsubscribe)` when moving from `old` to `new`.
fn diff(old: &[String], new: &[String]) -> (Vec<String>, Vec<String>) {
    let added = new.iter().filter(|s| !old.contains(s)).cloned().collect();
    let removed = old.iter().filter(|s| !new.contains(s)).cloned().collect();
    (added, removed)
}

/// Parse one websocket frame (a JSON array of events).
///
/// Trades (`T`) use their price `p`; minute bars (`A`/`AM`) use the bar high
/// `h`. Anything else is skipped.
pub fn parse_message(text: &str) -> Vec<StreamEvent> {
    let Ok(v) = serde_json::from_str::<serde_json::Value>(text) else {
        debug!("[polygon-ws] unparseable frame");
        return Vec::new();
    };

    let events = match v {
        serde_json::Value::Array(items) => items,
        obj @ serde_json::Value::Object(_) => vec![obj],
        _ => return Vec::new(),
    };

    events.iter().filter_map(parse_event).collect()
}

fn parse_event(ev: &serde_json::Value) -> Option<StreamEvent> {
    let kind = ev.get("ev")?.as_str()?;
    let field = match kind {
        "T" => "p",
        "A" | "AM" => "h",
        "status" => {
            return Some(StreamEvent::Status {
                status: ev.get("status")?.as_str()?.to_string(),
                message: ev.get("message").and_then(|m| m.as_str()).unwrap_or_default().to_string(),
            });
        }
        _ => return None,
    };

    let symbol = ev.get("sym")?.as_str()?.to_string();
    let price = ev.get(field)?.as_f64()?;
    Some(StreamEvent::Price(PriceUpdate { symbol, price }))
}
