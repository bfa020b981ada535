use std::sync::Arc;

use anyhow::{Context, Result};
use media_engine::{
    error_codes, DiscontinuityReason, EngineEvent, EngineState, MediaEngine, MediaEngineFactory,
    NativeError,
};
use shared::{domain::VideoSource, error::PlaybackErrorKind};
use tokio::{
    sync::{broadcast, broadcast::error::RecvError, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

const EVENT_CAPACITY: usize = 256;

/// Native codes with a known classification. Codes missing here are
/// [`PlaybackErrorKind::Unknown`].
pub const ERROR_CODE_TABLE: &[(i32, PlaybackErrorKind)] = &[
    (
        error_codes::IO_NETWORK_CONNECTION_FAILED,
        PlaybackErrorKind::Network,
    ),
    (
        error_codes::IO_NETWORK_CONNECTION_TIMEOUT,
        PlaybackErrorKind::Network,
    ),
    (error_codes::IO_BAD_HTTP_STATUS, PlaybackErrorKind::Server),
    (
        error_codes::PARSING_CONTAINER_MALFORMED,
        PlaybackErrorKind::ContainerMalformed,
    ),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackFault {
    pub kind: PlaybackErrorKind,
    pub code: i32,
    pub message: Option<String>,
}

/// Engine callbacks in the player's own vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    PlayingChanged(bool),
    BufferingChanged(bool),
    PositionDiscontinuity {
        position_ms: i64,
        from_seek: bool,
    },
    PlaybackError(PlaybackFault),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSnapshot {
    pub is_playing: bool,
    pub position_ms: i64,
    /// Zero while the engine does not know the duration yet.
    pub duration_ms: i64,
    pub buffered_ms: i64,
}

pub fn classify_native_error(error: &NativeError) -> PlaybackFault {
    let kind = ERROR_CODE_TABLE
        .iter()
        .find(|(code, _)| *code == error.code)
        .map(|(_, kind)| *kind)
        .unwrap_or(PlaybackErrorKind::Unknown);
    PlaybackFault {
        kind,
        code: error.code,
        message: error.message.clone(),
    }
}

pub fn translate_engine_event(event: EngineEvent) -> PlaybackEvent {
    match event {
        EngineEvent::IsPlayingChanged(playing) => PlaybackEvent::PlayingChanged(playing),
        EngineEvent::StateChanged(state) => {
            PlaybackEvent::BufferingChanged(state == EngineState::Buffering)
        }
        EngineEvent::PositionDiscontinuity {
            new_position_ms,
            reason,
            ..
        } => PlaybackEvent::PositionDiscontinuity {
            position_ms: new_position_ms,
            from_seek: reason == DiscontinuityReason::Seek,
        },
        EngineEvent::Error(error) => PlaybackEvent::PlaybackError(classify_native_error(&error)),
    }
}

struct ActiveEngine {
    engine: Arc<dyn MediaEngine>,
    event_task: JoinHandle<()>,
}

/// Owns at most one engine instance at a time. Every transport call made
/// without an engine is silently ignored.
pub struct PlaybackController {
    factory: Arc<dyn MediaEngineFactory>,
    active: Mutex<Option<ActiveEngine>>,
    events: broadcast::Sender<PlaybackEvent>,
}

impl PlaybackController {
    pub fn new(factory: Arc<dyn MediaEngineFactory>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            factory,
            active: Mutex::new(None),
            events,
        }
    }

    pub async fn initialize(&self) -> Result<()> {
        let mut active = self.active.lock().await;
        if active.is_some() {
            return Ok(());
        }
        let engine = self
            .factory
            .create()
            .context("failed to create media engine")?;
        let event_task = spawn_event_task(&engine, self.events.clone());
        *active = Some(ActiveEngine { engine, event_task });
        info!("controller: engine initialized");
        Ok(())
    }

    pub async fn release(&self) {
        let Some(active) = self.active.lock().await.take() else {
            return;
        };
        active.event_task.abort();
        active.engine.release();
        info!("controller: engine released");
    }

    pub async fn is_initialized(&self) -> bool {
        self.active.lock().await.is_some()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PlaybackEvent> {
        self.events.subscribe()
    }

    async fn engine(&self) -> Option<Arc<dyn MediaEngine>> {
        self.active
            .lock()
            .await
            .as_ref()
            .map(|active| Arc::clone(&active.engine))
    }

    pub async fn load(&self, source: &VideoSource) -> Result<()> {
        let Some(engine) = self.engine().await else {
            debug!("controller: load ignored, no engine");
            return Ok(());
        };
        let adaptive = source.is_hls();
        debug!("controller: load uri={} adaptive={adaptive}", source.to_uri());
        engine
            .load(source.to_uri(), adaptive)
            .with_context(|| format!("engine refused to load '{}'", source.to_uri()))
    }

    pub async fn play(&self) {
        if let Some(engine) = self.engine().await {
            engine.play();
        }
    }

    pub async fn pause(&self) {
        if let Some(engine) = self.engine().await {
            engine.pause();
        }
    }

    pub async fn seek_to(&self, position_ms: i64) {
        if let Some(engine) = self.engine().await {
            engine.seek_to(position_ms);
        }
    }

    pub async fn set_speed(&self, speed: f32) {
        if let Some(engine) = self.engine().await {
            engine.set_speed(speed);
        }
    }

    pub async fn set_volume(&self, level: f32) {
        if let Some(engine) = self.engine().await {
            engine.set_volume(level);
        }
    }

    pub async fn is_playing(&self) -> bool {
        match self.engine().await {
            Some(engine) => engine.is_playing(),
            None => false,
        }
    }

    pub async fn snapshot(&self) -> Option<EngineSnapshot> {
        let engine = self.engine().await?;
        Some(EngineSnapshot {
            is_playing: engine.is_playing(),
            position_ms: engine.current_position_ms(),
            duration_ms: engine.duration_ms().max(0),
            buffered_ms: engine.buffered_position_ms(),
        })
    }
}

fn spawn_event_task(
    engine: &Arc<dyn MediaEngine>,
    events: broadcast::Sender<PlaybackEvent>,
) -> JoinHandle<()> {
    let mut native = engine.subscribe_events();
    tokio::spawn(async move {
        loop {
            match native.recv().await {
                Ok(event) => {
                    let _ = events.send(translate_engine_event(event));
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("controller: dropped {skipped} engine events");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
