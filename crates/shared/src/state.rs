use serde::{Deserialize, Serialize};

use crate::{
    domain::{AspectRatio, VideoSource},
    error::PlaybackFailure,
};

pub const DEFAULT_PLAYBACK_SPEED: f32 = 1.0;
pub const DEFAULT_BRIGHTNESS: f32 = 0.5;
pub const PLAYBACK_SPEEDS: [f32; 6] = [0.5, 0.75, 1.0, 1.25, 1.5, 2.0];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub is_playing: bool,
    pub current_position_ms: i64,
    pub duration_ms: i64,
    pub buffered_position_ms: i64,
    pub is_loading: bool,
    pub speed: f32,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            is_playing: false,
            current_position_ms: 0,
            duration_ms: 0,
            buffered_position_ms: 0,
            is_loading: false,
            speed: DEFAULT_PLAYBACK_SPEED,
        }
    }
}

impl PlaybackState {
    pub fn progress(&self) -> f32 {
        fraction_of(self.current_position_ms, self.duration_ms)
    }

    pub fn buffered_progress(&self) -> f32 {
        fraction_of(self.buffered_position_ms, self.duration_ms)
    }
}

fn fraction_of(position_ms: i64, duration_ms: i64) -> f32 {
    if duration_ms <= 0 {
        return 0.0;
    }
    (position_ms as f64 / duration_ms as f64).clamp(0.0, 1.0) as f32
}

/// Coarse lifecycle of a playback session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Idle,
    Loading,
    /// Media is loaded; playing vs. paused lives in `PlaybackState::is_playing`.
    Ready,
    Error,
}

/// Everything the player surface renders. Owned by the session; observers only
/// ever see cloned snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionUiState {
    pub phase: SessionPhase,
    pub video_source: Option<VideoSource>,
    pub playback: PlaybackState,
    pub is_loading: bool,
    pub error: Option<PlaybackFailure>,
    pub controls_visible: bool,
    pub speed_menu_visible: bool,
    pub aspect_ratio_menu_visible: bool,
    pub volume_overlay_visible: bool,
    pub brightness_overlay_visible: bool,
    pub is_fullscreen: bool,
    pub current_volume: f32,
    pub current_brightness: f32,
    pub aspect_ratio: AspectRatio,
}

impl Default for SessionUiState {
    fn default() -> Self {
        Self {
            phase: SessionPhase::Idle,
            video_source: None,
            playback: PlaybackState::default(),
            is_loading: false,
            error: None,
            controls_visible: true,
            speed_menu_visible: false,
            aspect_ratio_menu_visible: false,
            volume_overlay_visible: false,
            brightness_overlay_visible: false,
            is_fullscreen: false,
            current_volume: 1.0,
            current_brightness: DEFAULT_BRIGHTNESS,
            aspect_ratio: AspectRatio::Fit,
        }
    }
}

impl SessionUiState {
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|failure| failure.message.as_str())
    }
}
