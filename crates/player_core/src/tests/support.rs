//! Collaborator fakes shared by the session and runtime tests.

use std::{collections::HashMap, sync::Mutex};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use futures::{stream::BoxStream, StreamExt};
use shared::domain::{HistoryId, HistoryRecord, VideoInfo, VideoSource};
use tokio::sync::watch;

use crate::{DisplaySurface, PlaybackHistoryRepository, PreferenceStore, VideoRepository};

#[derive(Default)]
pub struct FakeVideos {
    pub reject_with: Mutex<Option<String>>,
    pub validated: Mutex<Vec<VideoSource>>,
}

#[async_trait]
impl VideoRepository for FakeVideos {
    async fn validate_video_source(&self, source: &VideoSource) -> Result<VideoSource> {
        self.validated.lock().expect("log").push(source.clone());
        match self.reject_with.lock().expect("reject").clone() {
            Some(reason) => Err(anyhow!(reason)),
            None => Ok(source.clone()),
        }
    }

    async fn video_info(&self, source: &VideoSource) -> Result<VideoInfo> {
        Ok(VideoInfo {
            title: source.display_name().to_string(),
            duration_ms: 0,
            width: 0,
            height: 0,
        })
    }
}

pub type SavedProgress = (VideoSource, String, i64, i64);

#[derive(Default)]
pub struct FakeHistory {
    pub records: Mutex<HashMap<VideoSource, HistoryRecord>>,
    pub saves: Mutex<Vec<SavedProgress>>,
}

impl FakeHistory {
    pub fn seed(&self, source: &VideoSource, last_position_ms: i64, duration_ms: i64) {
        self.records.lock().expect("records").insert(
            source.clone(),
            HistoryRecord {
                id: HistoryId(1),
                video_source: source.clone(),
                title: source.display_name().to_string(),
                last_position_ms,
                duration_ms,
                last_played_at_ms: 0,
                thumbnail_path: None,
            },
        );
    }

    pub fn saves(&self) -> Vec<SavedProgress> {
        self.saves.lock().expect("saves").clone()
    }
}

#[async_trait]
impl PlaybackHistoryRepository for FakeHistory {
    async fn history_by_source(&self, source: &VideoSource) -> Result<Option<HistoryRecord>> {
        Ok(self.records.lock().expect("records").get(source).cloned())
    }

    async fn save_playback_history(
        &self,
        source: &VideoSource,
        title: &str,
        position_ms: i64,
        duration_ms: i64,
    ) -> Result<()> {
        self.saves.lock().expect("saves").push((
            source.clone(),
            title.to_string(),
            position_ms,
            duration_ms,
        ));
        Ok(())
    }

    async fn delete_history(&self, _id: HistoryId) -> Result<()> {
        Ok(())
    }

    async fn delete_all_history(&self) -> Result<()> {
        self.records.lock().expect("records").clear();
        Ok(())
    }

    async fn recent_history(&self, _limit: u32) -> Result<Vec<HistoryRecord>> {
        Ok(self.records.lock().expect("records").values().cloned().collect())
    }

    fn watch_recent_history(&self, _limit: u32) -> BoxStream<'static, Vec<HistoryRecord>> {
        futures::stream::empty().boxed()
    }
}

pub struct FakePreferences {
    pub speed: watch::Sender<f32>,
    pub saved: Mutex<Vec<f32>>,
}

impl FakePreferences {
    pub fn new(speed: f32) -> Self {
        let (speed, _) = watch::channel(speed);
        Self {
            speed,
            saved: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl PreferenceStore for FakePreferences {
    async fn playback_speed(&self) -> f32 {
        *self.speed.borrow()
    }

    fn watch_playback_speed(&self) -> watch::Receiver<f32> {
        self.speed.subscribe()
    }

    async fn set_playback_speed(&self, speed: f32) -> Result<()> {
        self.saved.lock().expect("saved").push(speed);
        self.speed.send_replace(speed);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeSurface {
    pub system: Option<f32>,
    pub window: Mutex<Option<f32>>,
    pub writes: Mutex<Vec<Option<f32>>>,
}

impl DisplaySurface for FakeSurface {
    fn system_brightness(&self) -> Option<f32> {
        self.system
    }

    fn window_brightness(&self) -> Option<f32> {
        *self.window.lock().expect("window")
    }

    fn set_window_brightness(&self, level: Option<f32>) {
        *self.window.lock().expect("window") = level;
        self.writes.lock().expect("writes").push(level);
    }
}

