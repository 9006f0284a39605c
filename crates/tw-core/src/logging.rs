//! Process-wide `tracing` setup for the leader, follower and CLI.
//!
//! The console always gets human-readable output. With `log_dir` set, a
//! second layer writes `<log_dir>/tickerwall-<process>.<date>` through a
//! non-blocking writer, as text or JSON lines per `file_format`.
//!
//! The configured level applies to the ticker wall's own crates (and HTTP
//! request traces); everything else logs at `warn`. A level containing `=`
//! or `,` is taken as a full filter directive, and `RUST_LOG` replaces the
//! filter entirely.

pub use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{LogFormat, LoggingConfig};

/// Targets that follow the configured level.
const OWN_TARGETS: &[&str] = &["tw_core", "tw_leader", "tw_follower", "tw_runner", "tower_http"];

/// Which process is logging. Names the log file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Process {
    Leader,
    Follower,
    /// One-shot admin commands.
    Cli,
}

impl Process {
    pub fn file_prefix(self) -> &'static str {
        match self {
            Process::Leader => "tickerwall-leader",
            Process::Follower => "tickerwall-follower",
            Process::Cli => "tickerwall-cli",
        }
    }
}

/// Filter directives for a configured level.
fn directives(level: &str) -> String {
    let level = level.trim();
    if level.contains('=') || level.contains(',') {
        return level.to_string();
    }
    let mut out = String::from("warn");
    for target in OWN_TARGETS {
        out.push_str(&format!(",{target}={level}"));
    }
    out
}

/// Install the global subscriber for `process`.
///
/// Keep the returned guard alive until exit; dropping it flushes buffered
/// file output. A second call leaves the first subscriber in place.
pub fn init(config: &LoggingConfig, process: Process) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives(&config.level)));

    let console = fmt::layer().with_target(true).with_ansi(true);

    let (writer, guard) = match config.log_dir.as_deref() {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, process.file_prefix());
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };
    let json = config.file_format == LogFormat::Json;
    let text_file = writer
        .clone()
        .filter(|_| !json)
        .map(|w| fmt::layer().with_writer(w).with_ansi(false).with_target(true));
    let json_file = writer
        .filter(|_| json)
        .map(|w| fmt::layer().json().with_writer(w));

    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(console)
        .with(text_file)
        .with(json_file)
        .try_init();
    if let Err(e) = installed {
        eprintln!("logging already initialized: {e}");
    }
    guard
}
