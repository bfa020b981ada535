use std::{path::Path, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use clap::Parser;
use media_engine::{SimulatedEngineFactory, SimulatedMedia};
use player_core::{
    spawn_session, DetachedSurface, DurablePlaybackHistory, DurablePreferences, FsVideoRepository,
    PlaybackController, PlaybackHistoryRepository, PointerEvent, SessionCommand, SessionDeps,
};
use shared::domain::{StreamType, VideoSource};
use storage::Storage;
use tokio::time::Instant;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use url::Url;

mod config;

use config::load_settings;

/// Plays one source on the simulated engine, optionally replaying a pointer
/// trace, and prints the final session state as JSON.
#[derive(Parser, Debug)]
struct Args {
    /// Local file path or http(s)/rtsp URL.
    source: String,
    /// JSON-lines file of pointer events (`{"kind":"down","x":..,"y":..,"at_ms":..}`).
    #[arg(long)]
    trace: Option<String>,
    /// Start from the beginning even when history has a resume point.
    #[arg(long)]
    no_resume: bool,
    #[arg(long)]
    speed: Option<f32>,
    /// How long to keep playing after the trace finished.
    #[arg(long, default_value_t = 2_000)]
    play_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let settings = load_settings();
    let database_url = settings.database_url();
    let store = Storage::new(&database_url).await.map_err(|error| {
        error!(%database_url, %error, "failed to open SQLite database");
        error
    })?;
    store.health_check().await?;
    let history = Arc::new(DurablePlaybackHistory::new(store.clone()));
    let preferences = Arc::new(DurablePreferences::load(store).await?);

    let factory = Arc::new(SimulatedEngineFactory::new(SimulatedMedia::with_duration(
        settings.simulated_duration_ms,
    )));
    let deps = SessionDeps {
        controller: Arc::new(PlaybackController::new(factory)),
        videos: Arc::new(FsVideoRepository),
        history: history.clone(),
        preferences,
    };
    let session = spawn_session(settings.session_config(), deps, Arc::new(DetachedSurface));

    let source = parse_source(&args.source);
    info!(source = %source.encode(), "player: starting");
    session
        .send(SessionCommand::PlayVideo {
            source: source.clone(),
            resume: !args.no_resume,
        })
        .await?;
    if let Some(speed) = args.speed {
        session.send(SessionCommand::SetPlaybackSpeed(speed)).await?;
    }

    if let Some(trace) = &args.trace {
        let events = read_trace(Path::new(trace)).await?;
        info!(count = events.len(), "player: replaying pointer trace");
        let started = Instant::now();
        for event in events {
            tokio::time::sleep_until(started + Duration::from_millis(event_time(&event))).await;
            session.send(SessionCommand::Pointer(event)).await?;
        }
    }
    tokio::time::sleep(Duration::from_millis(args.play_ms)).await;

    let snapshot = session.snapshot();
    session.shutdown().await;

    if let Some(played) = &snapshot.video_source {
        if snapshot.playback.duration_ms > 0 {
            history
                .save_playback_history(
                    played,
                    played.display_name(),
                    snapshot.playback.current_position_ms,
                    snapshot.playback.duration_ms,
                )
                .await
                .context("failed to save final playback position")?;
        }
    }

    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

fn parse_source(raw: &str) -> VideoSource {
    let raw = raw.trim();
    if let Ok(url) = Url::parse(raw) {
        if url.scheme() == "file" {
            let path = url
                .to_file_path()
                .map(|path| path.to_string_lossy().into_owned())
                .unwrap_or_else(|_| url.path().to_string());
            return VideoSource::local(raw, path);
        }
        if url.scheme().len() > 1 {
            return VideoSource::remote(raw, stream_type_for(&url));
        }
    }

    let path = std::fs::canonicalize(raw).unwrap_or_else(|_| Path::new(raw).to_path_buf());
    let identifier = Url::from_file_path(&path)
        .map(String::from)
        .unwrap_or_else(|_| raw.to_string());
    VideoSource::local(identifier, path.to_string_lossy())
}

fn stream_type_for(url: &Url) -> StreamType {
    let path = url.path().to_ascii_lowercase();
    if path.ends_with(".m3u8") {
        StreamType::Hls
    } else if path.ends_with(".mpd") {
        StreamType::Dash
    } else {
        StreamType::Http
    }
}

async fn read_trace(path: &Path) -> Result<Vec<PointerEvent>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read trace '{}'", path.display()))?;
    raw.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            serde_json::from_str(line)
                .with_context(|| format!("invalid pointer event on trace line {}", index + 1))
        })
        .collect()
}

fn event_time(event: &PointerEvent) -> u64 {
    match *event {
        PointerEvent::Down { at_ms, .. }
        | PointerEvent::Move { at_ms, .. }
        | PointerEvent::Up { at_ms, .. } => at_ms,
    }
}
