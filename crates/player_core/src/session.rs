//! The playback session: single owner of [`SessionUiState`].
//!
//! Gesture intents, engine events and poll ticks all funnel into one
//! `PlayerSession`, which applies player policy and issues transport commands
//! to the [`PlaybackController`]. Observers get cloned snapshots through a
//! watch channel. Nothing here returns an error to the caller; failures end up
//! in `SessionUiState::error` or in the log.

use std::{sync::Arc, time::Duration};

use shared::{
    domain::{AspectRatio, VideoSource},
    error::{PlaybackErrorKind, SessionError},
    state::{PlaybackState, SessionPhase, SessionUiState, DEFAULT_PLAYBACK_SPEED},
};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::{
    brightness::{BrightnessControl, DisplaySurface},
    controller::{PlaybackController, PlaybackEvent, PlaybackFault},
    gesture::{GestureConfig, GestureIntent, GestureRecognizer, PointerEvent},
    PlaybackHistoryRepository, PreferenceStore, VideoRepository,
};

/// Horizontal travel, in pixels, worth one seek step.
pub const SEEK_PIXELS_PER_STEP: f32 = 50.0;
pub const SEEK_SECONDS_PER_STEP: f32 = 5.0;
/// Vertical travel, in pixels, that spans the whole volume/brightness range.
pub const LEVEL_PIXELS_PER_UNIT: f32 = 500.0;
pub const DEFAULT_SEEK_STEP_SECONDS: u32 = 10;

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub poll_interval: Duration,
    pub history_save_interval: Duration,
    pub surface_width: f32,
    pub gesture: GestureConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(500),
            history_save_interval: Duration::from_secs(5),
            surface_width: 1920.0,
            gesture: GestureConfig::default(),
        }
    }
}

/// External collaborators a session talks to.
#[derive(Clone)]
pub struct SessionDeps {
    pub controller: Arc<PlaybackController>,
    pub videos: Arc<dyn VideoRepository>,
    pub history: Arc<dyn PlaybackHistoryRepository>,
    pub preferences: Arc<dyn PreferenceStore>,
}

/// Whole seconds to seek for a horizontal drag of `delta_pixels`.
pub fn seek_seconds_for_drag(delta_pixels: f32) -> i64 {
    (delta_pixels / SEEK_PIXELS_PER_STEP * SEEK_SECONDS_PER_STEP).round() as i64
}

/// Clamps to `[0, duration]`; an unknown (non-positive) duration only bounds below.
pub fn clamp_position(position_ms: i64, duration_ms: i64) -> i64 {
    if duration_ms > 0 {
        position_ms.clamp(0, duration_ms)
    } else {
        position_ms.max(0)
    }
}

pub fn session_error_for(fault: &PlaybackFault) -> SessionError {
    let detail = fault
        .message
        .clone()
        .unwrap_or_else(|| "unknown error".to_string());
    match fault.kind {
        PlaybackErrorKind::Network => SessionError::Network,
        PlaybackErrorKind::Server => SessionError::Server(detail),
        PlaybackErrorKind::ContainerMalformed => SessionError::ContainerMalformed,
        PlaybackErrorKind::SourceValidation => SessionError::SourceValidation(detail),
        PlaybackErrorKind::Unknown => SessionError::Playback(detail),
    }
}

pub struct PlayerSession {
    config: SessionConfig,
    deps: SessionDeps,
    recognizer: GestureRecognizer,
    brightness: BrightnessControl,
    state: watch::Sender<SessionUiState>,
    last_requested: Option<VideoSource>,
    since_last_save: Duration,
    torn_down: bool,
}

impl PlayerSession {
    pub fn new(config: SessionConfig, deps: SessionDeps, surface: Arc<dyn DisplaySurface>) -> Self {
        let brightness = BrightnessControl::new(surface);
        let initial = SessionUiState {
            current_brightness: brightness.ambient_brightness(),
            ..SessionUiState::default()
        };
        let (state, _) = watch::channel(initial);
        Self {
            recognizer: GestureRecognizer::new(config.gesture.clone(), config.surface_width),
            config,
            deps,
            brightness,
            state,
            last_requested: None,
            since_last_save: Duration::ZERO,
            torn_down: false,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionUiState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionUiState> {
        self.state.subscribe()
    }

    fn update(&self, apply: impl FnOnce(&mut SessionUiState)) {
        self.state.send_modify(apply);
    }

    /// Brings up the engine and re-applies a persisted speed.
    pub async fn start(&mut self) {
        if let Err(err) = self.deps.controller.initialize().await {
            self.fail(SessionError::Load(format!("{err:#}")));
            return;
        }
        self.restore_saved_speed().await;
    }

    pub fn attach_surface(&mut self, surface: Arc<dyn DisplaySurface>) {
        let ambient = self.brightness.attach(surface);
        self.update(|s| s.current_brightness = ambient);
    }

    pub fn set_surface_width(&mut self, width: f32) {
        self.recognizer.set_surface_width(width);
    }

    pub async fn play_video(&mut self, source: VideoSource, resume_from_history: bool) {
        info!("session: play source={}", source.encode());
        self.last_requested = Some(source.clone());
        self.update(|s| {
            s.phase = SessionPhase::Loading;
            s.is_loading = true;
            s.error = None;
        });

        let validated = match self.deps.videos.validate_video_source(&source).await {
            Ok(validated) => validated,
            Err(err) => {
                self.fail(SessionError::SourceValidation(format!("{err:#}")));
                return;
            }
        };

        if let Err(err) = self.deps.controller.load(&validated).await {
            self.fail(SessionError::Load(format!("{err:#}")));
            return;
        }

        let resume_at = if resume_from_history {
            self.resume_position(&validated).await
        } else {
            None
        };

        self.update(|s| {
            s.phase = SessionPhase::Ready;
            s.video_source = Some(validated);
            s.is_loading = false;
            s.playback = PlaybackState {
                speed: s.playback.speed,
                ..PlaybackState::default()
            };
        });

        if let Some(position_ms) = resume_at {
            debug!("session: resuming at position={position_ms}");
            self.deps.controller.seek_to(position_ms).await;
            self.update(|s| s.playback.current_position_ms = position_ms);
        }
        self.deps.controller.play().await;
    }

    async fn resume_position(&self, source: &VideoSource) -> Option<i64> {
        match self.deps.history.history_by_source(source).await {
            Ok(record) => record.and_then(|record| record.resume_position_ms()),
            Err(err) => {
                warn!("session: history lookup failed: {err:#}");
                None
            }
        }
    }

    fn fail(&mut self, failure: SessionError) {
        error!("session: playback failed kind={:?}: {failure}", failure.kind());
        self.update(|s| {
            s.phase = SessionPhase::Error;
            s.is_loading = false;
            s.playback.is_loading = false;
            s.error = Some(failure.into());
        });
    }

    pub async fn handle_pointer(&mut self, event: PointerEvent) -> Option<GestureIntent> {
        let intent = self.recognizer.handle(event)?;
        self.handle_intent(intent).await;
        Some(intent)
    }

    pub async fn handle_intent(&mut self, intent: GestureIntent) {
        match intent {
            GestureIntent::SingleTap => self.toggle_controls(),
            GestureIntent::DoubleTap => self.toggle_play_pause().await,
            GestureIntent::HorizontalDrag { delta_pixels } => {
                let seconds = seek_seconds_for_drag(delta_pixels);
                if seconds != 0 {
                    self.seek_by_seconds(seconds).await;
                }
            }
            GestureIntent::VerticalDrag {
                delta_pixels,
                is_left_half,
            } => {
                let delta = delta_pixels / LEVEL_PIXELS_PER_UNIT;
                let (brightness, volume) = {
                    let s = self.state.borrow();
                    (s.current_brightness, s.current_volume)
                };
                if is_left_half {
                    self.set_brightness(brightness - delta);
                    self.set_brightness_overlay_visible(true);
                } else {
                    self.set_volume(volume - delta).await;
                    self.set_volume_overlay_visible(true);
                }
            }
        }
    }

    pub async fn handle_playback_event(&mut self, event: PlaybackEvent) {
        match event {
            PlaybackEvent::PlayingChanged(playing) => {
                self.update(|s| s.playback.is_playing = playing);
            }
            PlaybackEvent::BufferingChanged(buffering) => {
                self.update(|s| {
                    s.is_loading = buffering;
                    s.playback.is_loading = buffering;
                });
            }
            PlaybackEvent::PositionDiscontinuity { .. } => self.refresh_position().await,
            PlaybackEvent::PlaybackError(fault) => {
                warn!(
                    "session: engine error code={} kind={:?}",
                    fault.code, fault.kind
                );
                self.fail(session_error_for(&fault));
            }
        }
    }

    /// One polling step. `elapsed` is the real time since the previous tick;
    /// progress is saved once every `history_save_interval` of accumulated time.
    pub async fn poll_tick(&mut self, elapsed: Duration) {
        self.refresh_position().await;

        self.since_last_save += elapsed;
        let interval = self.config.history_save_interval;
        if self.since_last_save >= interval {
            self.since_last_save = self.since_last_save.saturating_sub(interval);
            if self.since_last_save >= interval {
                self.since_last_save = Duration::ZERO;
            }
            self.save_playback_progress().await;
        }
    }

    pub async fn refresh_position(&mut self) {
        let Some(snapshot) = self.deps.controller.snapshot().await else {
            return;
        };
        self.update(|s| {
            s.playback.current_position_ms =
                clamp_position(snapshot.position_ms, snapshot.duration_ms);
            s.playback.duration_ms = snapshot.duration_ms;
            s.playback.buffered_position_ms = snapshot.buffered_ms.max(0);
        });
    }

    /// Writes progress for the current source in the background.
    pub async fn save_playback_progress(&self) {
        let source = self.state.borrow().video_source.clone();
        let Some(source) = source else {
            return;
        };
        let Some(snapshot) = self.deps.controller.snapshot().await else {
            return;
        };
        if snapshot.position_ms <= 0 || snapshot.duration_ms <= 0 {
            return;
        }

        let history = Arc::clone(&self.deps.history);
        tokio::spawn(async move {
            let title = source.display_name().to_string();
            if let Err(err) = history
                .save_playback_history(&source, &title, snapshot.position_ms, snapshot.duration_ms)
                .await
            {
                warn!("session: failed to save playback progress: {err:#}");
            }
        });
    }

    pub async fn restore_saved_speed(&mut self) {
        let speed = self.deps.preferences.playback_speed().await;
        if (speed - DEFAULT_PLAYBACK_SPEED).abs() > f32::EPSILON {
            debug!("session: re-applying saved speed={speed}");
            self.apply_speed(speed).await;
        }
    }

    async fn apply_speed(&mut self, speed: f32) {
        self.deps.controller.set_speed(speed).await;
        self.update(|s| s.playback.speed = speed);
    }

    pub async fn set_playback_speed(&mut self, speed: f32) {
        if !speed.is_finite() || speed <= 0.0 {
            warn!("session: ignoring invalid playback speed={speed}");
            return;
        }
        self.apply_speed(speed).await;

        let preferences = Arc::clone(&self.deps.preferences);
        tokio::spawn(async move {
            if let Err(err) = preferences.set_playback_speed(speed).await {
                warn!("session: failed to persist playback speed: {err:#}");
            }
        });
    }

    pub async fn play(&mut self) {
        self.deps.controller.play().await;
    }

    pub async fn pause(&mut self) {
        self.deps.controller.pause().await;
    }

    pub async fn toggle_play_pause(&mut self) {
        if self.deps.controller.is_playing().await {
            self.pause().await;
        } else {
            self.play().await;
        }
    }

    pub async fn seek_to(&mut self, position_ms: i64) {
        let Some(snapshot) = self.deps.controller.snapshot().await else {
            return;
        };
        let target = clamp_position(position_ms, snapshot.duration_ms);
        debug!("session: seek from={} to={target}", snapshot.position_ms);
        self.deps.controller.seek_to(target).await;
        self.update(|s| s.playback.current_position_ms = target);
    }

    pub async fn seek_by_seconds(&mut self, seconds: i64) {
        let Some(snapshot) = self.deps.controller.snapshot().await else {
            return;
        };
        let target = snapshot
            .position_ms
            .saturating_add(seconds.saturating_mul(1_000));
        self.seek_to(target).await;
    }

    pub async fn seek_forward(&mut self, seconds: u32) {
        self.seek_by_seconds(i64::from(seconds)).await;
    }

    pub async fn seek_backward(&mut self, seconds: u32) {
        self.seek_by_seconds(-i64::from(seconds)).await;
    }

    pub async fn set_volume(&mut self, level: f32) {
        let level = level.clamp(0.0, 1.0);
        self.deps.controller.set_volume(level).await;
        self.update(|s| s.current_volume = level);
    }

    pub fn set_brightness(&mut self, level: f32) {
        let level = self.brightness.set(level);
        self.update(|s| s.current_brightness = level);
    }

    pub fn set_aspect_ratio(&mut self, aspect_ratio: AspectRatio) {
        self.update(|s| s.aspect_ratio = aspect_ratio);
    }

    pub fn toggle_controls(&mut self) {
        self.update(|s| s.controls_visible = !s.controls_visible);
    }

    pub fn set_controls_visible(&mut self, visible: bool) {
        self.update(|s| s.controls_visible = visible);
    }

    pub fn toggle_speed_menu(&mut self) {
        self.update(|s| s.speed_menu_visible = !s.speed_menu_visible);
    }

    pub fn set_speed_menu_visible(&mut self, visible: bool) {
        self.update(|s| s.speed_menu_visible = visible);
    }

    pub fn toggle_aspect_ratio_menu(&mut self) {
        self.update(|s| s.aspect_ratio_menu_visible = !s.aspect_ratio_menu_visible);
    }

    pub fn set_aspect_ratio_menu_visible(&mut self, visible: bool) {
        self.update(|s| s.aspect_ratio_menu_visible = visible);
    }

    pub fn toggle_volume_overlay(&mut self) {
        self.update(|s| s.volume_overlay_visible = !s.volume_overlay_visible);
    }

    pub fn set_volume_overlay_visible(&mut self, visible: bool) {
        self.update(|s| s.volume_overlay_visible = visible);
    }

    pub fn toggle_brightness_overlay(&mut self) {
        self.update(|s| s.brightness_overlay_visible = !s.brightness_overlay_visible);
    }

    pub fn set_brightness_overlay_visible(&mut self, visible: bool) {
        self.update(|s| s.brightness_overlay_visible = visible);
    }

    pub fn toggle_fullscreen(&mut self) {
        self.update(|s| s.is_fullscreen = !s.is_fullscreen);
    }

    pub fn set_fullscreen(&mut self, fullscreen: bool) {
        self.update(|s| s.is_fullscreen = fullscreen);
    }

    /// Dismisses the error panel without retrying.
    pub fn clear_error(&mut self) {
        self.update(|s| {
            s.error = None;
            if s.phase == SessionPhase::Error {
                s.phase = SessionPhase::Ready;
            }
        });
    }

    /// Plays the most recently requested source again. No-op before the first
    /// `play_video`.
    pub async fn retry_playback(&mut self) {
        let Some(source) = self.last_requested.clone() else {
            debug!("session: retry ignored, nothing requested yet");
            return;
        };
        self.clear_error();
        self.play_video(source, true).await;
    }

    /// Restores brightness. The engine stays with its owner.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.brightness.restore();
        info!("session: torn down");
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
