//! Zenamp - command-line audio player
//!
//! Plays files or an M3U playlist through the default (or named) output
//! device, and remembers the queue and position across runs.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use zenamp_common::session::{PlaylistFile, SessionPaths};
use zenamp_player::audio::{CpalOutput, SymphoniaDecoder};
use zenamp_player::config::PlayerConfig;
use zenamp_player::{Player, PlayerEvent};

/// Transport poll interval
const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Command-line arguments for zenamp
#[derive(Parser, Debug)]
#[command(name = "zenamp")]
#[command(about = "Audio player with varispeed and a three-band equalizer")]
#[command(version)]
struct Args {
    /// Audio files to queue
    files: Vec<PathBuf>,

    /// M3U playlist to queue (after any FILES)
    #[arg(short, long)]
    playlist: Option<PathBuf>,

    /// Wrap around at the ends of the queue
    #[arg(short, long)]
    repeat: bool,

    /// Volume in percent (0-500)
    #[arg(long, env = "ZENAMP_VOLUME")]
    volume: Option<u32>,

    /// Playback speed (0.1-4.0); pitch follows speed
    #[arg(long, env = "ZENAMP_SPEED")]
    speed: Option<f64>,

    /// Restore the queue and position saved by the last run
    #[arg(long)]
    resume: bool,

    /// Start at the first entry whose name or tags contain TEXT
    #[arg(short, long, value_name = "TEXT")]
    filter: Option<String>,

    /// Print output device names and exit
    #[arg(long)]
    list_devices: bool,

    /// Output device name
    #[arg(short, long, env = "ZENAMP_DEVICE")]
    device: Option<String>,

    /// Configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = PlayerConfig::resolve(args.config.as_deref())
        .context("Failed to load configuration")?
        .validated();

    // Initialize tracing
    let default_filter = format!(
        "zenamp={level},zenamp_player={level},zenamp_common={level}",
        level = config.logging.level
    );
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting zenamp {} (git {}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    if args.list_devices {
        for name in CpalOutput::list_devices().context("Failed to list audio devices")? {
            println!("{}", name);
        }
        return Ok(());
    }

    let device = args.device.clone().or_else(|| config.device.clone());
    let output = CpalOutput::new(device.as_deref(), config.buffer_frames)
        .context("Failed to initialize audio output")?;

    let mut options = config.player_options();
    if let Some(volume) = args.volume {
        options.volume_percent = volume;
    }
    if let Some(speed) = args.speed {
        options.speed = speed;
    }
    options.repeat |= args.repeat;

    let mut player = Player::new(Box::new(output), Arc::new(SymphoniaDecoder::new()), options);

    let session_paths = match SessionPaths::user_default() {
        Ok(paths) => Some(paths),
        Err(e) => {
            warn!("Session will not be saved: {}", e);
            None
        }
    };

    if args.resume {
        match &session_paths {
            Some(paths) => match player.restore_session(paths).await {
                Ok(count) => info!("Resumed {} entries", count),
                Err(e) => warn!("Could not resume session: {}", e),
            },
            None => warn!("No session directory; --resume ignored"),
        }
    }

    player.enqueue(args.files.clone()).await?;
    if let Some(playlist) = &args.playlist {
        let playlist = PlaylistFile::load(playlist)
            .with_context(|| format!("Failed to read playlist {}", playlist.display()))?;
        player.enqueue(playlist.entries).await?;
    }

    if player.queue().is_empty() {
        warn!("Nothing to play");
        return Ok(());
    }

    let mut events = player.subscribe();
    let started = match args.filter.as_deref() {
        Some(filter) => {
            // Search starts after the current entry; park on the last one so
            // the first match wins
            let last = player.queue().len() - 1;
            player.select(last);
            player.next_filtered(filter).await
        }
        None => player.play_current().await,
    };
    match started {
        Ok(true) => {}
        Ok(false) => match args.filter.as_deref() {
            Some(filter) if player.is_idle() => warn!("Nothing playable matches '{}'", filter),
            _ => warn!("Nothing playable at the start of the queue"),
        },
        Err(e) => error!("Failed to start playback: {}", e),
    }
    if player.is_idle() {
        save_session(&player, session_paths.as_ref());
        return Ok(());
    }

    let mut interval = tokio::time::interval(TICK_INTERVAL);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = player.tick().await {
                    error!("Playback error: {}", e);
                }
            }
            event = events.recv() => match event {
                Ok(PlayerEvent::QueueExhausted) => {
                    info!("Queue finished");
                    break;
                }
                Ok(PlayerEvent::DeviceError { message }) => {
                    // Nothing restarts playback without controls
                    error!("Output device failed: {}; stopping", message);
                    break;
                }
                Ok(event) => log_event(&player, &event),
                Err(RecvError::Lagged(skipped)) => warn!("Missed {} player events", skipped),
                Err(RecvError::Closed) => break,
            },
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
                break;
            }
        }
    }

    save_session(&player, session_paths.as_ref());

    info!("Shutdown complete");
    Ok(())
}

fn save_session(player: &Player, paths: Option<&SessionPaths>) {
    if let Some(paths) = paths {
        if let Err(e) = player.save_session(paths) {
            error!("Failed to save session: {}", e);
        }
    }
}

fn log_event(player: &Player, event: &PlayerEvent) {
    match event {
        PlayerEvent::TrackStarted {
            index,
            duration_seconds,
            ..
        } => {
            let name = player
                .queue()
                .get(*index)
                .map(|entry| entry.display_name())
                .unwrap_or_default();
            info!("▶ [{}] {} ({:.0}s)", index + 1, name, duration_seconds);
        }
        PlayerEvent::LoadFailed { path, reason, .. } => {
            warn!("Skipped {}: {}", path.display(), reason);
        }
        PlayerEvent::StateChanged { status } => info!("{}", status),
        PlayerEvent::TrackFinished { .. } | PlayerEvent::QueueExhausted | PlayerEvent::DeviceError { .. } => {}
    }
}
