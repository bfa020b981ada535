use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use futures::{stream::BoxStream, StreamExt};
use shared::{
    domain::{HistoryId, HistoryRecord, VideoSource},
    state::DEFAULT_PLAYBACK_SPEED,
};
use storage::{HistoryUpdate, Storage, BRIGHTNESS_KEY, PLAYBACK_SPEED_KEY};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tracing::warn;

use crate::{PlaybackHistoryRepository, PreferenceStore};

/// Window brightness preference meaning "follow the system".
pub const FOLLOW_SYSTEM_BRIGHTNESS: i32 = -1;

/// Playback history kept in the SQLite store.
pub struct DurablePlaybackHistory {
    store: Storage,
    revision: watch::Sender<u64>,
}

impl DurablePlaybackHistory {
    pub fn new(store: Storage) -> Self {
        let (revision, _) = watch::channel(0);
        Self { store, revision }
    }

    pub async fn initialize(database_url: &str) -> Result<Self> {
        let store = Storage::new(database_url)
            .await
            .with_context(|| format!("failed to open history storage at '{database_url}'"))?;
        Ok(Self::new(store))
    }

    pub fn store(&self) -> &Storage {
        &self.store
    }

    pub async fn all_history(&self) -> Result<Vec<HistoryRecord>> {
        self.store.all_history().await
    }

    fn mark_changed(&self) {
        self.revision.send_modify(|revision| *revision = revision.wrapping_add(1));
    }
}

#[async_trait]
impl PlaybackHistoryRepository for DurablePlaybackHistory {
    async fn history_by_source(&self, source: &VideoSource) -> Result<Option<HistoryRecord>> {
        self.store.history_by_source(source).await
    }

    async fn save_playback_history(
        &self,
        source: &VideoSource,
        title: &str,
        position_ms: i64,
        duration_ms: i64,
    ) -> Result<()> {
        self.store
            .upsert_history(HistoryUpdate {
                video_source: source,
                title,
                position_ms,
                duration_ms,
                played_at: Utc::now(),
            })
            .await?;
        self.mark_changed();
        Ok(())
    }

    async fn delete_history(&self, id: HistoryId) -> Result<()> {
        if self.store.delete_history(id).await? {
            self.mark_changed();
        }
        Ok(())
    }

    async fn delete_all_history(&self) -> Result<()> {
        self.store.delete_all_history().await?;
        self.mark_changed();
        Ok(())
    }

    async fn recent_history(&self, limit: u32) -> Result<Vec<HistoryRecord>> {
        self.store.recent_history(limit).await
    }

    fn watch_recent_history(&self, limit: u32) -> BoxStream<'static, Vec<HistoryRecord>> {
        let store = self.store.clone();
        WatchStream::new(self.revision.subscribe())
            .then(move |_| {
                let store = store.clone();
                async move {
                    store.recent_history(limit).await.unwrap_or_else(|err| {
                        warn!("history: failed to reload recent history: {err:#}");
                        Vec::new()
                    })
                }
            })
            .boxed()
    }
}

/// User preferences kept in the SQLite store. The playback speed is cached in
/// a watch channel so observers see every change.
pub struct DurablePreferences {
    store: Storage,
    speed: watch::Sender<f32>,
}

impl DurablePreferences {
    pub async fn load(store: Storage) -> Result<Self> {
        let speed = match store.load_preference(PLAYBACK_SPEED_KEY).await? {
            Some(raw) => parse_speed(&raw),
            None => DEFAULT_PLAYBACK_SPEED,
        };
        let (speed, _) = watch::channel(speed);
        Ok(Self { store, speed })
    }

    /// Stored window brightness in percent, or [`FOLLOW_SYSTEM_BRIGHTNESS`].
    pub async fn brightness(&self) -> Result<i32> {
        let Some(raw) = self.store.load_preference(BRIGHTNESS_KEY).await? else {
            return Ok(FOLLOW_SYSTEM_BRIGHTNESS);
        };
        Ok(raw.parse().unwrap_or_else(|_| {
            warn!("preferences: ignoring unreadable brightness '{raw}'");
            FOLLOW_SYSTEM_BRIGHTNESS
        }))
    }

    pub async fn set_brightness(&self, brightness: i32) -> Result<()> {
        self.store
            .save_preference(BRIGHTNESS_KEY, &brightness.to_string())
            .await
    }
}

fn parse_speed(raw: &str) -> f32 {
    match raw.parse::<f32>() {
        Ok(speed) if speed.is_finite() && speed > 0.0 => speed,
        _ => {
            warn!("preferences: ignoring unreadable playback speed '{raw}'");
            DEFAULT_PLAYBACK_SPEED
        }
    }
}

#[async_trait]
impl PreferenceStore for DurablePreferences {
    async fn playback_speed(&self) -> f32 {
        *self.speed.borrow()
    }

    fn watch_playback_speed(&self) -> watch::Receiver<f32> {
        self.speed.subscribe()
    }

    async fn set_playback_speed(&self, speed: f32) -> Result<()> {
        self.store
            .save_preference(PLAYBACK_SPEED_KEY, &speed.to_string())
            .await?;
        self.speed.send_replace(speed);
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/durable_tests.rs"]
mod tests;
