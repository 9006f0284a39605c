//! Client for the leader's RPC server.
//!
//! Unary calls go over HTTP with `reqwest`; the join stream is a websocket
//! on `/rpc/join`. Leader error bodies (`{"error": CODE, "message": ...}`)
//! are mapped back onto [`TickerWallError`].

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;
use uuid::Uuid;
use tw_core::ws::{self, KeepAlive, WsStream};
use tw_core::{
    Announcement, PresentationSettings, PresentationSettingsPatch, Result, Screen, ScreenCluster, Ticker,
    TickerWallError, Update,
};

/// Default per-call timeout for unary calls.
const CALL_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    error: String,
    #[serde(default)]
    message: String,
}

/// A failed unary call, before it is mapped to a domain error.
#[derive(Debug)]
struct CallFailure {
    status: Option<StatusCode>,
    code: String,
    message: String,
}

impl CallFailure {
    fn transport(message: String) -> Self {
        Self { status: None, code: String::new(), message }
    }

    fn into_error(self) -> TickerWallError {
        match self.code.as_str() {
            "VALIDATION" | "BAD_REQUEST" => TickerWallError::Validation(self.message),
            "UNKNOWN_TICKER" => TickerWallError::UnknownTicker(self.message),
            "DUPLICATE_TICKER" => TickerWallError::DuplicateTicker(self.message),
            _ => match self.status {
                Some(status) => TickerWallError::Connection(format!("{status}: {}", self.message)),
                None => TickerWallError::Connection(self.message),
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct LeaderClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
    idle_timeout: Duration,
}

impl LeaderClient {
    /// `base_url` is the leader's RPC address, e.g. `http://10.0.0.2:6886`.
    pub fn new(base_url: &str) -> Self {
        let base_url = base_url.trim_end_matches('/');
        let base_url =
            if base_url.contains("://") { base_url.to_string() } else { format!("http://{base_url}") };
        Self {
            http: reqwest::Client::new(),
            base_url,
            timeout: CALL_TIMEOUT,
            idle_timeout: KeepAlive::default().idle_timeout,
        }
    }

    /// How long a join stream may stay silent before it counts as lost.
    /// The leader pings well inside this window.
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn call<T: DeserializeOwned>(&self, request: RequestBuilder) -> std::result::Result<T, CallFailure> {
        let resp = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| CallFailure::transport(format!("{}: timed out", self.base_url)))?
            .map_err(|e| CallFailure::transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body: ErrorBody = resp.json().await.unwrap_or_default();
            return Err(CallFailure { status: Some(status), code: body.error, message: body.message });
        }
        resp.json::<T>().await.map_err(|e| CallFailure::transport(format!("bad response: {e}")))
    }

    pub async fn get_tickers(&self) -> Result<Vec<Ticker>> {
        self.call(self.http.get(self.url("/rpc/tickers"))).await.map_err(CallFailure::into_error)
    }

    pub async fn get_cluster(&self) -> Result<ScreenCluster> {
        self.call(self.http.get(self.url("/rpc/cluster"))).await.map_err(CallFailure::into_error)
    }

    pub async fn update_screen(&self, screen: &Screen) -> Result<Screen> {
        self.call(self.http.put(self.url("/rpc/screen")).json(screen)).await.map_err(|f| {
            if f.code == "UNKNOWN_SCREEN" { TickerWallError::UnknownScreen(screen.uuid) } else { f.into_error() }
        })
    }

    pub async fn announce(&self, announcement: &Announcement) -> Result<Announcement> {
        self.call(self.http.post(self.url("/rpc/announce")).json(announcement)).await.map_err(CallFailure::into_error)
    }

    pub async fn update_presentation_settings(&self, patch: &PresentationSettingsPatch) -> Result<PresentationSettings> {
        self.call(self.http.post(self.url("/rpc/presentation")).json(patch)).await.map_err(CallFailure::into_error)
    }

    pub async fn add_ticker(&self, symbol: &str) -> Result<Ticker> {
        self.call(self.http.post(self.url(&format!("/rpc/tickers/{symbol}")))).await.map_err(CallFailure::into_error)
    }

    pub async fn remove_ticker(&self, symbol: &str) -> Result<Ticker> {
        self.call(self.http.delete(self.url(&format!("/rpc/tickers/{symbol}")))).await.map_err(CallFailure::into_error)
    }

    /// Drop `uuid` from the cluster. Its join stream is closed by the leader.
    pub async fn remove_screen(&self, uuid: Uuid) -> Result<Screen> {
        self.call(self.http.delete(self.url(&format!("/rpc/screen/{uuid}")))).await.map_err(|f| {
            if f.code == "UNKNOWN_SCREEN" { TickerWallError::UnknownScreen(uuid) } else { f.into_error() }
        })
    }

    /// Open the join stream for `screen`.
    pub async fn join(&self, screen: &Screen) -> Result<UpdateStream> {
        let url = ws::ws_url(&self.base_url, "/rpc/join")?;
        let mut stream = ws::connect(&url).await?;
        let hello = serde_json::to_string(screen).map_err(|e| TickerWallError::Connection(e.to_string()))?;
        stream
            .send(Message::Text(hello.into()))
            .await
            .map_err(|e| TickerWallError::Connection(format!("join: {e}")))?;
        debug!("[api] joined as {}", screen.uuid);
        Ok(UpdateStream { ws: stream, idle_timeout: self.idle_timeout })
    }
}

/// The leader's update stream for one screen.
pub struct UpdateStream {
    ws: WsStream,
    idle_timeout: Duration,
}

impl UpdateStream {
    /// Next update. The stream ending for any reason is an error: the
    /// follower is expected to reconnect. So is a leader that sends nothing,
    /// not even a ping, for the idle timeout.
    pub async fn next(&mut self) -> Result<Update> {
        loop {
            let Ok(message) = tokio::time::timeout(self.idle_timeout, self.ws.next()).await else {
                return Err(TickerWallError::Connection(format!(
                    "no data from leader for {:?}",
                    self.idle_timeout
                )));
            };
            match message {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str(text.as_str())
                        .map_err(|e| TickerWallError::Connection(format!("bad update: {e}")));
                }
                Some(Ok(Message::Ping(data))) => {
                    let _ = self.ws.send(Message::Pong(data)).await;
                }
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame.map(|f| f.reason.to_string()).unwrap_or_default();
                    return Err(TickerWallError::Connection(format!("closed by leader: {reason}")));
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(TickerWallError::Connection(e.to_string())),
                None => return Err(TickerWallError::Connection("stream ended".into())),
            }
        }
    }

    pub async fn close(mut self) {
        let _ = self.ws.close(None).await;
    }
}
