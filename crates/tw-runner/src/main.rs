//! # tickerwall
//!
//! Entry point for every ticker wall process and the admin CLI.
//!
//! ```bash
//! tickerwall leader --config wall.json
//! tickerwall follower --config wall.json --index 2
//! tickerwall announce -m "Market closes early" -t danger
//! tickerwall update --scroll-speed 8 --up-color 0,255,0,255
//! tickerwall ticker add TSLA
//! tickerwall screen remove 7f3c9a52-0b8e-4f43-a1a6-3a2b9c8e1d44
//! tickerwall describe
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tw_core::config::{AppConfig, LoggingConfig, load_config};
use tw_core::logging::{self, Process};
use tw_core::supervisor::{ShutdownSignal, TaskGroup};
use tw_core::{Announcement, AnnouncementAnimation, AnnouncementKind, PresentationSettingsPatch, Rgba, Screen};
use tw_follower::{Follower, LeaderClient};
use tw_leader::Leader;
use uuid::Uuid;

const DEFAULT_LEADER: &str = "localhost:6886";

#[derive(Parser)]
#[command(name = "tickerwall", about = "Scrolling stock ticker wall across many screens")]
struct Cli {
    /// Log level (trace, debug, info, warn, error). Overrides the config file.
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Optional log directory for file output.
    #[arg(long, global = true)]
    log_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the leader.
    Leader {
        /// Configuration file path (JSON).
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Run one follower screen.
    Follower(FollowerArgs),
    /// Show an announcement on every screen.
    Announce(AnnounceArgs),
    /// Change presentation settings.
    Update(UpdateArgs),
    /// Print the cluster and ticker list.
    Describe(LeaderArg),
    /// Add or remove a ticker.
    Ticker {
        #[command(subcommand)]
        action: TickerAction,
    },
    /// Manage joined screens.
    Screen {
        #[command(subcommand)]
        action: ScreenAction,
    },
}

#[derive(Args)]
struct LeaderArg {
    /// Leader RPC address.
    #[arg(short, long, default_value = DEFAULT_LEADER)]
    leader: String,
}

#[derive(Args)]
struct FollowerArgs {
    /// Configuration file path (JSON).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Leader RPC address. Overrides the config file.
    #[arg(short, long)]
    leader: Option<String>,

    #[arg(long)]
    width: Option<i64>,

    #[arg(long)]
    height: Option<i64>,

    /// Position of this screen in the wall, left to right.
    #[arg(long)]
    index: Option<i32>,
}

#[derive(Args)]
struct AnnounceArgs {
    #[command(flatten)]
    leader: LeaderArg,

    #[arg(short, long, default_value = "Announcement!")]
    message: String,

    /// info, danger or success.
    #[arg(short = 't', long = "type", default_value = "info")]
    kind: AnnouncementKind,

    /// elastic, bounce, ease or back.
    #[arg(short = 'n', long, default_value = "elastic")]
    animation: AnnouncementAnimation,

    /// Milliseconds on screen, not counting the enter/exit animations.
    #[arg(short = 'i', long, default_value_t = 2000)]
    lifespan: i64,
}

#[derive(Args)]
struct UpdateArgs {
    #[command(flatten)]
    leader: LeaderArg,

    #[arg(short, long)]
    scroll_speed: Option<i32>,

    #[arg(short = 'w', long)]
    ticker_box_width: Option<i32>,

    #[arg(long)]
    animation_duration: Option<i32>,

    #[arg(long)]
    per_tick_updates: Option<bool>,

    #[arg(long)]
    show_logos: Option<bool>,

    /// Colors are "red,green,blue,alpha".
    #[arg(long)]
    up_color: Option<Rgba>,

    #[arg(long)]
    down_color: Option<Rgba>,

    #[arg(long)]
    font_color: Option<Rgba>,

    #[arg(long)]
    ticker_bg_color: Option<Rgba>,

    #[arg(long)]
    bg_color: Option<Rgba>,
}

impl UpdateArgs {
    fn patch(&self) -> PresentationSettingsPatch {
        PresentationSettingsPatch {
            scroll_speed: self.scroll_speed,
            ticker_box_width: self.ticker_box_width,
            per_tick_updates: self.per_tick_updates,
            animation_duration_ms: self.animation_duration,
            show_logos: self.show_logos,
            up_color: self.up_color,
            down_color: self.down_color,
            font_color: self.font_color,
            ticker_box_bg_color: self.ticker_bg_color,
            bg_color: self.bg_color,
        }
    }
}

#[derive(Subcommand)]
enum TickerAction {
    Add {
        symbol: String,
        #[command(flatten)]
        leader: LeaderArg,
    },
    Remove {
        symbol: String,
        #[command(flatten)]
        leader: LeaderArg,
    },
}

#[derive(Subcommand)]
enum ScreenAction {
    /// Drop a screen from the wall and close its connection.
    Remove {
        uuid: Uuid,
        #[command(flatten)]
        leader: LeaderArg,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Leader { config } => {
            let config = read_config(config.as_deref())?;
            let log_config = config.logging.clone().with_overrides(cli.log_level.as_deref(), cli.log_dir.as_deref());
            let _guard = logging::init(&log_config, Process::Leader);
            run_leader(config).await
        }
        Command::Follower(args) => {
            let config = read_config(args.config.as_deref())?;
            let log_config = config.logging.clone().with_overrides(cli.log_level.as_deref(), cli.log_dir.as_deref());
            let _guard = logging::init(&log_config, Process::Follower);
            run_follower(config, args).await
        }
        Command::Announce(args) => {
            let _guard = init_cli_logging(cli.log_level.as_deref(), cli.log_dir.as_deref());
            announce(args).await
        }
        Command::Update(args) => {
            let _guard = init_cli_logging(cli.log_level.as_deref(), cli.log_dir.as_deref());
            update(args).await
        }
        Command::Describe(args) => {
            let _guard = init_cli_logging(cli.log_level.as_deref(), cli.log_dir.as_deref());
            describe(&LeaderClient::new(&args.leader)).await
        }
        Command::Ticker { action } => {
            let _guard = init_cli_logging(cli.log_level.as_deref(), cli.log_dir.as_deref());
            ticker(action).await
        }
        Command::Screen { action } => {
            let _guard = init_cli_logging(cli.log_level.as_deref(), cli.log_dir.as_deref());
            screen(action).await
        }
    }
}

/// Admin commands only log warnings unless asked otherwise.
fn init_cli_logging(level: Option<&str>, dir: Option<&str>) -> Option<logging::WorkerGuard> {
    let config = LoggingConfig { level: "warn".into(), ..Default::default() }.with_overrides(level, dir);
    logging::init(&config, Process::Cli)
}

fn read_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => load_config(path),
        None => Ok(AppConfig::default()),
    }
}

async fn run_leader(config: AppConfig) -> Result<()> {
    let leader = Leader::new(config.leader).context("leader setup")?;

    let mut group = TaskGroup::new();
    group.spawn("signals", watch_os_signals(group.signal()));
    if let Err(e) = leader.start(&mut group).await {
        group.shutdown();
        let _ = group.wait().await;
        return Err(e);
    }

    info!("leader running; press Ctrl+C to stop");
    let result = group.wait().await;
    match &result {
        Ok(()) => info!("leader stopped"),
        Err(e) => error!("leader stopped: {e:#}"),
    }
    result
}

async fn run_follower(config: AppConfig, args: FollowerArgs) -> Result<()> {
    let settings = config.follower;
    let leader = args.leader.unwrap_or(settings.leader);
    let screen = Screen::new(
        args.width.unwrap_or(settings.screen_width),
        args.height.unwrap_or(settings.screen_height),
        args.index.unwrap_or(settings.screen_index),
    );
    info!("screen {} ({}x{}, index {}) following {leader}", screen.uuid, screen.width, screen.height, screen.index);

    let client = LeaderClient::new(&leader).with_idle_timeout(Duration::from_millis(settings.idle_timeout_ms));
    let follower = Follower::new(client, screen, Duration::from_millis(settings.max_backoff_ms));
    let mirror = follower.mirror();

    let mut group = TaskGroup::new();
    group.spawn("signals", watch_os_signals(group.signal()));
    let signal = group.signal();
    group.spawn("sync", async move { follower.run(signal).await });
    let frame_interval = Duration::from_millis(settings.frame_interval_ms.max(1));
    group.spawn("frames", tw_follower::frame::run_frame_loop(mirror, frame_interval, group.signal()));

    group.wait().await
}

async fn announce(args: AnnounceArgs) -> Result<()> {
    let client = LeaderClient::new(&args.leader.leader);
    let mut announcement = Announcement::new(args.message, args.lifespan);
    announcement.kind = args.kind;
    announcement.animation = args.animation;
    let sent = client.announce(&announcement).await?;
    println!("{}", serde_json::to_string_pretty(&sent)?);
    Ok(())
}

async fn update(args: UpdateArgs) -> Result<()> {
    let patch = args.patch();
    if patch.is_empty() {
        anyhow::bail!("nothing to update; pass at least one setting");
    }
    let settings = LeaderClient::new(&args.leader.leader).update_presentation_settings(&patch).await?;
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}

async fn ticker(action: TickerAction) -> Result<()> {
    match action {
        TickerAction::Add { symbol, leader } => {
            let ticker = LeaderClient::new(&leader.leader).add_ticker(&symbol).await?;
            println!("added {} (index {})", ticker.symbol, ticker.index);
        }
        TickerAction::Remove { symbol, leader } => {
            let ticker = LeaderClient::new(&leader.leader).remove_ticker(&symbol).await?;
            println!("removed {}", ticker.symbol);
        }
    }
    Ok(())
}

async fn screen(action: ScreenAction) -> Result<()> {
    match action {
        ScreenAction::Remove { uuid, leader } => {
            let screen = LeaderClient::new(&leader.leader).remove_screen(uuid).await?;
            println!("removed {} (index {})", screen.uuid, screen.index);
        }
    }
    Ok(())
}

async fn describe(client: &LeaderClient) -> Result<()> {
    let cluster = client.get_cluster().await?;
    let tickers = client.get_tickers().await?;
    let settings = &cluster.settings;

    println!("Global Viewport Size: {}", cluster.viewport_size());
    println!("Animation Duration:   {} ms", settings.animation_duration_ms);
    println!("Scroll Speed:         {} ms/px", settings.scroll_speed);
    println!("Ticker Box Width:     {}", settings.ticker_box_width);
    println!("Per-Tick Updates:     {}", settings.per_tick_updates);
    println!();
    println!("Screens ({}):", cluster.number_of_screens());
    for screen in &cluster.screens {
        println!("  {}  {}x{}  index {}", screen.uuid, screen.width, screen.height, screen.index);
    }
    println!();
    println!("Tickers ({}):", tickers.len());
    for ticker in &tickers {
        println!("  {:<6} {}", ticker.symbol, ticker.company_name);
    }
    Ok(())
}

/// Trigger `shutdown` on Ctrl+C or SIGTERM.
async fn watch_os_signals(shutdown: ShutdownSignal) -> Result<()> {
    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        sigterm.recv().await;
        Ok::<(), std::io::Error>(())
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<std::io::Result<()>>();

    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res.context("install Ctrl+C handler")?;
            info!("shutdown signal received");
        }
        res = terminate => {
            res.context("install SIGTERM handler")?;
            info!("SIGTERM received");
        }
        _ = shutdown.cancelled() => {}
    }
    shutdown.trigger();
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn announce_defaults() {
        let cli = Cli::try_parse_from(["tickerwall", "announce"]).unwrap();
        let Command::Announce(args) = cli.command else { panic!("expected announce") };
        assert_eq!(args.leader.leader, DEFAULT_LEADER);
        assert_eq!(args.message, "Announcement!");
        assert_eq!(args.kind, AnnouncementKind::Info);
        assert_eq!(args.animation, AnnouncementAnimation::Elastic);
        assert_eq!(args.lifespan, 2000);
    }

    #[test]
    fn update_builds_a_sparse_patch() {
        let cli = Cli::try_parse_from(["tickerwall", "update", "-s", "8", "--up-color", "0,255,0,255"]).unwrap();
        let Command::Update(args) = cli.command else { panic!("expected update") };
        let patch = args.patch();
        assert_eq!(patch.scroll_speed, Some(8));
        assert_eq!(patch.up_color, Some(Rgba::new(0, 255, 0, 255)));
        assert!(patch.ticker_box_width.is_none());
        assert!(!patch.is_empty());
    }

    #[test]
    fn screen_remove_takes_a_uuid() {
        let uuid = Uuid::new_v4().to_string();
        let cli = Cli::try_parse_from(["tickerwall", "screen", "remove", uuid.as_str(), "-l", "wall:6886"]).unwrap();
        let Command::Screen { action: ScreenAction::Remove { uuid: parsed, leader } } = cli.command else {
            panic!("expected screen remove")
        };
        assert_eq!(parsed.to_string(), uuid);
        assert_eq!(leader.leader, "wall:6886");
        assert!(Cli::try_parse_from(["tickerwall", "screen", "remove", "not-a-uuid"]).is_err());
    }

    #[test]
    fn bad_color_is_rejected() {
        assert!(Cli::try_parse_from(["tickerwall", "update", "--bg-color", "1,2,3"]).is_err());
    }

    #[test]
    fn follower_overrides_are_optional() {
        let cli = Cli::try_parse_from(["tickerwall", "--log-level", "debug", "follower", "--index", "3"]).unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        let Command::Follower(args) = cli.command else { panic!("expected follower") };
        assert_eq!(args.index, Some(3));
        assert!(args.config.is_none() && args.leader.is_none());
    }
}
