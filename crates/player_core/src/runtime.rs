//! Runs a [`PlayerSession`] on its own task.
//!
//! Commands from the host, normalized engine events and the poll timer are
//! merged in one `select!` loop so the session is only ever touched by that
//! task.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use shared::{
    domain::{AspectRatio, VideoSource},
    state::SessionUiState,
};
use tokio::{
    sync::{broadcast::error::RecvError, mpsc, oneshot, watch, Mutex},
    task::JoinHandle,
    time::{self, Instant, MissedTickBehavior},
};
use tracing::{debug, info, warn};

use crate::{
    brightness::DisplaySurface,
    gesture::PointerEvent,
    session::{PlayerSession, SessionConfig, SessionDeps},
};

const COMMAND_CAPACITY: usize = 256;

#[derive(Clone)]
pub enum SessionCommand {
    PlayVideo { source: VideoSource, resume: bool },
    Pointer(PointerEvent),
    Play,
    Pause,
    TogglePlayPause,
    SeekTo(i64),
    SeekForward(u32),
    SeekBackward(u32),
    SetPlaybackSpeed(f32),
    SetVolume(f32),
    SetBrightness(f32),
    SetAspectRatio(AspectRatio),
    ToggleControls,
    SetControlsVisible(bool),
    ToggleSpeedMenu,
    SetSpeedMenuVisible(bool),
    ToggleAspectRatioMenu,
    SetAspectRatioMenuVisible(bool),
    ToggleVolumeOverlay,
    SetVolumeOverlayVisible(bool),
    ToggleBrightnessOverlay,
    SetBrightnessOverlayVisible(bool),
    ToggleFullscreen,
    SetFullscreen(bool),
    SetSurfaceWidth(f32),
    AttachSurface(Arc<dyn DisplaySurface>),
    SaveProgress,
    ClearError,
    RetryPlayback,
}

impl SessionCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::PlayVideo { .. } => "play_video",
            Self::Pointer(_) => "pointer",
            Self::Play => "play",
            Self::Pause => "pause",
            Self::TogglePlayPause => "toggle_play_pause",
            Self::SeekTo(_) => "seek_to",
            Self::SeekForward(_) => "seek_forward",
            Self::SeekBackward(_) => "seek_backward",
            Self::SetPlaybackSpeed(_) => "set_playback_speed",
            Self::SetVolume(_) => "set_volume",
            Self::SetBrightness(_) => "set_brightness",
            Self::SetAspectRatio(_) => "set_aspect_ratio",
            Self::ToggleControls => "toggle_controls",
            Self::SetControlsVisible(_) => "set_controls_visible",
            Self::ToggleSpeedMenu => "toggle_speed_menu",
            Self::SetSpeedMenuVisible(_) => "set_speed_menu_visible",
            Self::ToggleAspectRatioMenu => "toggle_aspect_ratio_menu",
            Self::SetAspectRatioMenuVisible(_) => "set_aspect_ratio_menu_visible",
            Self::ToggleVolumeOverlay => "toggle_volume_overlay",
            Self::SetVolumeOverlayVisible(_) => "set_volume_overlay_visible",
            Self::ToggleBrightnessOverlay => "toggle_brightness_overlay",
            Self::SetBrightnessOverlayVisible(_) => "set_brightness_overlay_visible",
            Self::ToggleFullscreen => "toggle_fullscreen",
            Self::SetFullscreen(_) => "set_fullscreen",
            Self::SetSurfaceWidth(_) => "set_surface_width",
            Self::AttachSurface(_) => "attach_surface",
            Self::SaveProgress => "save_progress",
            Self::ClearError => "clear_error",
            Self::RetryPlayback => "retry_playback",
        }
    }
}

struct RunningSession {
    shutdown: oneshot::Sender<()>,
    task: JoinHandle<()>,
}

/// Host-side handle to a running session.
pub struct SessionHandle {
    commands: mpsc::Sender<SessionCommand>,
    state: watch::Receiver<SessionUiState>,
    running: Mutex<Option<RunningSession>>,
}

impl SessionHandle {
    pub async fn send(&self, command: SessionCommand) -> Result<()> {
        let name = command.name();
        self.commands
            .send(command)
            .await
            .map_err(|_| anyhow!("session task stopped; command '{name}' dropped"))?;
        debug!(command = name, "queued session command");
        Ok(())
    }

    pub fn snapshot(&self) -> SessionUiState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionUiState> {
        self.state.clone()
    }

    /// Stops polling, drops the engine subscription and tears the session
    /// down. Safe to call more than once.
    pub async fn shutdown(&self) {
        let Some(running) = self.running.lock().await.take() else {
            return;
        };
        let _ = running.shutdown.send(());
        if let Err(err) = running.task.await {
            warn!("runtime: session task ended abnormally: {err}");
        }
    }
}

pub fn spawn_session(
    config: SessionConfig,
    deps: SessionDeps,
    surface: Arc<dyn DisplaySurface>,
) -> SessionHandle {
    let session = PlayerSession::new(config, deps.clone(), surface);
    let state = session.subscribe();
    let (commands, command_rx) = mpsc::channel(COMMAND_CAPACITY);
    let (shutdown, shutdown_rx) = oneshot::channel();
    let task = tokio::spawn(run_session(session, deps, command_rx, shutdown_rx));
    SessionHandle {
        commands,
        state,
        running: Mutex::new(Some(RunningSession { shutdown, task })),
    }
}

async fn run_session(
    mut session: PlayerSession,
    deps: SessionDeps,
    mut commands: mpsc::Receiver<SessionCommand>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut events = deps.controller.subscribe();
    session.start().await;

    let poll_interval = session.config().poll_interval;
    let mut ticker = time::interval_at(Instant::now() + poll_interval, poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_tick = Instant::now();
    let mut events_open = true;
    info!("runtime: session started");

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            command = commands.recv() => match command {
                Some(command) => apply_command(&mut session, command).await,
                None => break,
            },
            event = events.recv(), if events_open => match event {
                Ok(event) => session.handle_playback_event(event).await,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("runtime: session missed {skipped} playback events");
                    session.refresh_position().await;
                }
                Err(RecvError::Closed) => events_open = false,
            },
            now = ticker.tick() => {
                let elapsed = now.saturating_duration_since(last_tick);
                last_tick = now;
                session.poll_tick(elapsed).await;
            }
        }
    }

    drop(events);
    session.teardown();
    info!("runtime: session stopped");
}

async fn apply_command(session: &mut PlayerSession, command: SessionCommand) {
    debug!(command = command.name(), "applying session command");
    match command {
        SessionCommand::PlayVideo { source, resume } => session.play_video(source, resume).await,
        SessionCommand::Pointer(event) => {
            session.handle_pointer(event).await;
        }
        SessionCommand::Play => session.play().await,
        SessionCommand::Pause => session.pause().await,
        SessionCommand::TogglePlayPause => session.toggle_play_pause().await,
        SessionCommand::SeekTo(position_ms) => session.seek_to(position_ms).await,
        SessionCommand::SeekForward(seconds) => session.seek_forward(seconds).await,
        SessionCommand::SeekBackward(seconds) => session.seek_backward(seconds).await,
        SessionCommand::SetPlaybackSpeed(speed) => session.set_playback_speed(speed).await,
        SessionCommand::SetVolume(level) => session.set_volume(level).await,
        SessionCommand::SetBrightness(level) => session.set_brightness(level),
        SessionCommand::SetAspectRatio(ratio) => session.set_aspect_ratio(ratio),
        SessionCommand::ToggleControls => session.toggle_controls(),
        SessionCommand::SetControlsVisible(visible) => session.set_controls_visible(visible),
        SessionCommand::ToggleSpeedMenu => session.toggle_speed_menu(),
        SessionCommand::SetSpeedMenuVisible(visible) => session.set_speed_menu_visible(visible),
        SessionCommand::ToggleAspectRatioMenu => session.toggle_aspect_ratio_menu(),
        SessionCommand::SetAspectRatioMenuVisible(visible) => {
            session.set_aspect_ratio_menu_visible(visible)
        }
        SessionCommand::ToggleVolumeOverlay => session.toggle_volume_overlay(),
        SessionCommand::SetVolumeOverlayVisible(visible) => {
            session.set_volume_overlay_visible(visible)
        }
        SessionCommand::ToggleBrightnessOverlay => session.toggle_brightness_overlay(),
        SessionCommand::SetBrightnessOverlayVisible(visible) => {
            session.set_brightness_overlay_visible(visible)
        }
        SessionCommand::ToggleFullscreen => session.toggle_fullscreen(),
        SessionCommand::SetFullscreen(fullscreen) => session.set_fullscreen(fullscreen),
        SessionCommand::SetSurfaceWidth(width) => session.set_surface_width(width),
        SessionCommand::AttachSurface(surface) => session.attach_surface(surface),
        SessionCommand::SaveProgress => session.save_playback_progress().await,
        SessionCommand::ClearError => session.clear_error(),
        SessionCommand::RetryPlayback => session.retry_playback().await,
    }
}

#[cfg(test)]
#[path = "tests/runtime_tests.rs"]
mod tests;
