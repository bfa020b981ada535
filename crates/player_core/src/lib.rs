//! Player core: pointer gestures, the playback controller wrapping a media
//! engine, and the session that owns everything the player surface shows.

use anyhow::Result;
use async_trait::async_trait;
use futures::stream::BoxStream;
use shared::domain::{HistoryId, HistoryRecord, VideoInfo, VideoSource};
use tokio::sync::watch;

pub mod brightness;
pub mod controller;
mod durable;
pub mod gesture;
pub mod runtime;
pub mod session;
mod validation;

pub use brightness::{BrightnessControl, DetachedSurface, DisplaySurface};
pub use controller::{EngineSnapshot, PlaybackController, PlaybackEvent, PlaybackFault};
pub use durable::{DurablePlaybackHistory, DurablePreferences, FOLLOW_SYSTEM_BRIGHTNESS};
pub use gesture::{GestureConfig, GestureIntent, GestureRecognizer, PointerEvent};
pub use runtime::{spawn_session, SessionCommand, SessionHandle};
pub use session::{PlayerSession, SessionConfig, SessionDeps};
pub use validation::{FsVideoRepository, SUPPORTED_STREAM_EXTENSIONS, SUPPORTED_VIDEO_EXTENSIONS};

#[async_trait]
pub trait VideoRepository: Send + Sync {
    /// Returns the source to play, or why it cannot be played.
    async fn validate_video_source(&self, source: &VideoSource) -> Result<VideoSource>;
    async fn video_info(&self, source: &VideoSource) -> Result<VideoInfo>;
}

#[async_trait]
pub trait PlaybackHistoryRepository: Send + Sync {
    async fn history_by_source(&self, source: &VideoSource) -> Result<Option<HistoryRecord>>;
    async fn save_playback_history(
        &self,
        source: &VideoSource,
        title: &str,
        position_ms: i64,
        duration_ms: i64,
    ) -> Result<()>;
    async fn delete_history(&self, id: HistoryId) -> Result<()>;
    async fn delete_all_history(&self) -> Result<()>;
    async fn recent_history(&self, limit: u32) -> Result<Vec<HistoryRecord>>;
    /// Yields the current list right away and again after every write.
    fn watch_recent_history(&self, limit: u32) -> BoxStream<'static, Vec<HistoryRecord>>;
}

#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn playback_speed(&self) -> f32;
    fn watch_playback_speed(&self) -> watch::Receiver<f32>;
    async fn set_playback_speed(&self, speed: f32) -> Result<()>;
}

#[cfg(test)]
#[path = "tests/support.rs"]
mod test_support;
