//! Configuration parsing for the ticker wall.
//!
//! Both roles read one JSON file. Every field has a default, so an empty
//! object `{}` is a valid config and a leader only needs its API key.
//!
//! # Example config
//!
//! ```json
//! {
//!   "logging": { "level": "info", "log_dir": "/var/log/tickerwall" },
//!   "leader": {
//!     "tickers": ["AAPL", "MSFT", "NVDA"],
//!     "presentation": { "ticker_box_width": 1000, "scroll_speed": 16 }
//!   },
//!   "follower": { "leader": "http://10.0.0.2:6886", "screen_index": 2 }
//! }
//! ```

use std::path::Path;

use serde::Deserialize;

use crate::error::TickerWallError;
use crate::model::PresentationSettings;

/// Environment variable consulted when the config carries no API key.
pub const API_KEY_ENV: &str = "TICKERWALL_API_KEY";

/// Top-level application config, deserialized from a JSON file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    pub leader: LeaderConfig,
    pub follower: FollowerConfig,
}

/// Line format of the log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    /// One JSON object per line, for log shippers.
    Json,
}

/// Logging block.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily-rolling log files. Console only when absent.
    #[serde(default)]
    pub log_dir: Option<String>,

    /// Format of the file output. The console is always text.
    #[serde(default)]
    pub file_format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level(), log_dir: None, file_format: LogFormat::Text }
    }
}

impl LoggingConfig {
    /// Apply command-line overrides; each one present wins over the file.
    pub fn with_overrides(mut self, level: Option<&str>, log_dir: Option<&str>) -> Self {
        if let Some(level) = level {
            self.level = level.to_string();
        }
        if let Some(dir) = log_dir {
            self.log_dir = Some(dir.to_string());
        }
        self
    }
}

/// Leader process configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LeaderConfig {
    /// Listen address of the follower-facing RPC server.
    #[serde(default = "default_rpc_addr")]
    pub rpc_addr: String,

    /// Listen address of the admin HTTP façade.
    #[serde(default = "default_http_addr")]
    pub http_addr: String,

    /// Symbols displayed at startup.
    #[serde(default = "default_tickers")]
    pub tickers: Vec<String>,

    /// Market-data vendor API key. Falls back to `TICKERWALL_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Vendor REST base URL.
    #[serde(default = "default_rest_url")]
    pub rest_url: String,

    /// Vendor realtime websocket URL.
    #[serde(default = "default_stream_url")]
    pub stream_url: String,

    /// Capacity of each follower's outbound queue.
    #[serde(default = "default_client_queue_size")]
    pub client_queue_size: usize,

    /// Delay between accepting an announcement and showing it, so every
    /// screen receives it before it starts.
    #[serde(default = "default_announce_grace_ms")]
    pub announce_grace_ms: i64,

    /// Company-details refresh interval.
    #[serde(default = "default_details_refresh_secs")]
    pub details_refresh_secs: u64,

    /// Intraday aggregate refresh interval.
    #[serde(default = "default_aggs_refresh_secs")]
    pub aggs_refresh_secs: u64,

    /// Per-call timeout for vendor REST requests.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Ping period on follower join streams and the vendor stream. A peer
    /// silent for three periods is dropped.
    #[serde(default = "default_ping_interval_ms")]
    pub ping_interval_ms: u64,

    /// Initial presentation settings.
    #[serde(default)]
    pub presentation: PresentationSettings,
}

impl Default for LeaderConfig {
    fn default() -> Self {
        Self {
            rpc_addr: default_rpc_addr(),
            http_addr: default_http_addr(),
            tickers: default_tickers(),
            api_key: None,
            rest_url: default_rest_url(),
            stream_url: default_stream_url(),
            client_queue_size: default_client_queue_size(),
            announce_grace_ms: default_announce_grace_ms(),
            details_refresh_secs: default_details_refresh_secs(),
            aggs_refresh_secs: default_aggs_refresh_secs(),
            request_timeout_ms: default_request_timeout_ms(),
            ping_interval_ms: default_ping_interval_ms(),
            presentation: PresentationSettings::default(),
        }
    }
}

impl LeaderConfig {
    /// API key from the config, else from the environment.
    pub fn resolve_api_key(&self) -> Result<String, TickerWallError> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.is_empty()) {
            return Ok(key.clone());
        }
        std::env::var(API_KEY_ENV)
            .ok()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| TickerWallError::Config(format!("no api_key in config and {API_KEY_ENV} is unset")))
    }

    /// Upper-cased, de-duplicated startup symbols.
    pub fn symbols(&self) -> Vec<String> {
        let mut out: Vec<String> = self
            .tickers
            .iter()
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        out.sort();
        out.dedup();
        out
    }
}

/// Follower process configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FollowerConfig {
    /// Base URL of the leader's RPC server.
    #[serde(default = "default_leader_url")]
    pub leader: String,

    #[serde(default = "default_screen_width")]
    pub screen_width: i64,

    #[serde(default = "default_screen_height")]
    pub screen_height: i64,

    /// Left-to-right position of this screen in the wall.
    #[serde(default = "default_screen_index")]
    pub screen_index: i32,

    /// Reconnect backoff ceiling.
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Headless frame loop period.
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,

    /// Longest silence tolerated on the join stream before reconnecting.
    /// Should exceed the leader's ping interval.
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
}

impl Default for FollowerConfig {
    fn default() -> Self {
        Self {
            leader: default_leader_url(),
            screen_width: default_screen_width(),
            screen_height: default_screen_height(),
            screen_index: default_screen_index(),
            max_backoff_ms: default_max_backoff_ms(),
            frame_interval_ms: default_frame_interval_ms(),
            idle_timeout_ms: default_idle_timeout_ms(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default helpers (used by serde)
// ---------------------------------------------------------------------------

fn default_log_level() -> String {
    "info".into()
}

fn default_rpc_addr() -> String {
    "0.0.0.0:6886".into()
}

fn default_http_addr() -> String {
    "0.0.0.0:8080".into()
}

fn default_tickers() -> Vec<String> {
    ["AAPL", "AMD", "NVDA", "MSFT", "NFLX", "AMZN", "SNAP"].into_iter().map(String::from).collect()
}

fn default_rest_url() -> String {
    "https://api.polygon.io".into()
}

fn default_stream_url() -> String {
    "wss://socket.polygon.io/stocks".into()
}

fn default_client_queue_size() -> usize {
    100
}

fn default_announce_grace_ms() -> i64 {
    200
}

fn default_details_refresh_secs() -> u64 {
    300
}

fn default_aggs_refresh_secs() -> u64 {
    60
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

fn default_ping_interval_ms() -> u64 {
    15_000
}

fn default_leader_url() -> String {
    "http://localhost:6886".into()
}

fn default_screen_width() -> i64 {
    1920
}

fn default_screen_height() -> i64 {
    300
}

fn default_screen_index() -> i32 {
    10
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_frame_interval_ms() -> u64 {
    16
}

fn default_idle_timeout_ms() -> u64 {
    45_000
}

/// Load and parse a JSON config file.
pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&content)?;
    Ok(config)
}
