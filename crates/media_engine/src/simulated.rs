use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use anyhow::{anyhow, bail, Result};
use tokio::{runtime::Handle, sync::broadcast, time::Instant};
use tracing::debug;

use crate::{
    DiscontinuityReason, EngineEvent, EngineState, MediaEngine, MediaEngineFactory, NativeError,
    TIME_UNSET,
};

const BUFFER_AHEAD_MS: i64 = 15_000;
const EVENT_CAPACITY: usize = 256;

/// What the simulated engine pretends to find behind a URI.
#[derive(Debug, Clone)]
pub struct SimulatedMedia {
    pub duration_ms: i64,
    pub prepare_delay: Duration,
    pub failure: Option<NativeError>,
}

impl Default for SimulatedMedia {
    fn default() -> Self {
        Self {
            duration_ms: 120_000,
            prepare_delay: Duration::from_millis(100),
            failure: None,
        }
    }
}

impl SimulatedMedia {
    pub fn with_duration(duration_ms: i64) -> Self {
        Self {
            duration_ms,
            ..Self::default()
        }
    }

    pub fn failing(error: NativeError) -> Self {
        Self {
            failure: Some(error),
            ..Self::default()
        }
    }
}

struct Playback {
    generation: u64,
    loaded: Option<(String, bool)>,
    media: SimulatedMedia,
    state: EngineState,
    prepared: bool,
    play_when_ready: bool,
    playing_since: Option<Instant>,
    anchor_position_ms: i64,
    speed: f32,
    volume: f32,
    released: bool,
}

impl Playback {
    fn position_at(&self, now: Instant) -> i64 {
        let advanced = match self.playing_since {
            Some(since) => {
                let elapsed = now.saturating_duration_since(since).as_millis() as f64;
                self.anchor_position_ms + (elapsed * f64::from(self.speed)) as i64
            }
            None => self.anchor_position_ms,
        };
        if self.prepared {
            advanced.min(self.media.duration_ms)
        } else {
            advanced
        }
    }

    fn freeze(&mut self, now: Instant) {
        self.anchor_position_ms = self.position_at(now);
        if self.playing_since.is_some() {
            self.playing_since = Some(now);
        }
    }

    /// Stops the clock once playback runs past the end of the media.
    fn settle_end(&mut self, now: Instant, out: &mut Vec<EngineEvent>) {
        if self.playing_since.is_none() || !self.prepared {
            return;
        }
        if self.position_at(now) >= self.media.duration_ms {
            self.anchor_position_ms = self.media.duration_ms;
            self.playing_since = None;
            self.state = EngineState::Ended;
            out.push(EngineEvent::IsPlayingChanged(false));
            out.push(EngineEvent::StateChanged(EngineState::Ended));
        }
    }
}

/// Deterministic in-process engine. Time is read from the tokio clock, so a
/// paused test runtime drives playback exactly.
pub struct SimulatedEngine {
    inner: Arc<Mutex<Playback>>,
    events: broadcast::Sender<EngineEvent>,
    default_media: SimulatedMedia,
    catalog: HashMap<String, SimulatedMedia>,
}

impl SimulatedEngine {
    pub fn new(default_media: SimulatedMedia) -> Self {
        Self::with_catalog(default_media, HashMap::new())
    }

    fn with_catalog(
        default_media: SimulatedMedia,
        catalog: HashMap<String, SimulatedMedia>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Mutex::new(Playback {
                generation: 0,
                loaded: None,
                media: default_media.clone(),
                state: EngineState::Idle,
                prepared: false,
                play_when_ready: false,
                playing_since: None,
                anchor_position_ms: 0,
                speed: 1.0,
                volume: 1.0,
                released: false,
            })),
            events,
            default_media,
            catalog,
        }
    }

    /// Injects a native callback as if the engine raised it on its own thread.
    pub fn emit(&self, event: EngineEvent) {
        let _ = self.events.send(event);
    }

    pub fn loaded(&self) -> Option<(String, bool)> {
        self.state().loaded.clone()
    }

    pub fn volume(&self) -> f32 {
        self.state().volume
    }

    pub fn speed(&self) -> f32 {
        self.state().speed
    }

    pub fn is_released(&self) -> bool {
        self.state().released
    }

    fn state(&self) -> MutexGuard<'_, Playback> {
        lock(&self.inner)
    }

    fn publish(&self, out: Vec<EngineEvent>) {
        for event in out {
            let _ = self.events.send(event);
        }
    }
}

fn lock(inner: &Mutex<Playback>) -> MutexGuard<'_, Playback> {
    inner.lock().unwrap_or_else(PoisonError::into_inner)
}

fn finish_prepare(
    inner: &Mutex<Playback>,
    events: &broadcast::Sender<EngineEvent>,
    generation: u64,
) {
    let mut out = Vec::new();
    {
        let mut playback = lock(inner);
        if playback.released || playback.generation != generation {
            return;
        }
        if let Some(error) = playback.media.failure.clone() {
            playback.state = EngineState::Idle;
            out.push(EngineEvent::StateChanged(EngineState::Idle));
            out.push(EngineEvent::Error(error));
        } else {
            playback.state = EngineState::Ready;
            playback.prepared = true;
            out.push(EngineEvent::StateChanged(EngineState::Ready));
            if playback.play_when_ready {
                playback.playing_since = Some(Instant::now());
                out.push(EngineEvent::IsPlayingChanged(true));
            }
        }
    }
    for event in out {
        let _ = events.send(event);
    }
}

impl MediaEngine for SimulatedEngine {
    fn load(&self, uri: &str, adaptive: bool) -> Result<()> {
        let runtime = Handle::try_current()
            .map_err(|err| anyhow!("simulated engine needs a tokio runtime: {err}"))?;
        let media = self
            .catalog
            .get(uri)
            .cloned()
            .unwrap_or_else(|| self.default_media.clone());

        let mut out = Vec::new();
        let generation = {
            let mut playback = self.state();
            if playback.released {
                bail!("engine already released");
            }
            if playback.playing_since.take().is_some() {
                out.push(EngineEvent::IsPlayingChanged(false));
            }
            playback.generation += 1;
            playback.loaded = Some((uri.to_string(), adaptive));
            playback.media = media.clone();
            playback.state = EngineState::Buffering;
            playback.prepared = false;
            playback.anchor_position_ms = 0;
            playback.generation
        };
        out.push(EngineEvent::StateChanged(EngineState::Buffering));
        self.publish(out);
        debug!("engine: load uri={uri} adaptive={adaptive} generation={generation}");

        let inner = Arc::clone(&self.inner);
        let events = self.events.clone();
        runtime.spawn(async move {
            tokio::time::sleep(media.prepare_delay).await;
            finish_prepare(&inner, &events, generation);
        });
        Ok(())
    }

    fn play(&self) {
        let mut out = Vec::new();
        {
            let mut playback = self.state();
            if playback.released {
                return;
            }
            playback.play_when_ready = true;
            if playback.state == EngineState::Ready && playback.playing_since.is_none() {
                playback.playing_since = Some(Instant::now());
                out.push(EngineEvent::IsPlayingChanged(true));
            }
        }
        self.publish(out);
    }

    fn pause(&self) {
        let mut out = Vec::new();
        {
            let mut playback = self.state();
            if playback.released {
                return;
            }
            playback.play_when_ready = false;
            if playback.playing_since.is_some() {
                playback.freeze(Instant::now());
                playback.playing_since = None;
                out.push(EngineEvent::IsPlayingChanged(false));
            }
        }
        self.publish(out);
    }

    fn seek_to(&self, position_ms: i64) {
        let mut out = Vec::new();
        {
            let mut playback = self.state();
            if playback.released || playback.loaded.is_none() {
                return;
            }
            let now = Instant::now();
            let old_position_ms = playback.position_at(now);
            let upper = if playback.prepared {
                playback.media.duration_ms.max(0)
            } else {
                i64::MAX
            };
            let target = position_ms.clamp(0, upper);
            playback.anchor_position_ms = target;
            if playback.playing_since.is_some() {
                playback.playing_since = Some(now);
            }
            if playback.state == EngineState::Ended && target < playback.media.duration_ms {
                playback.state = EngineState::Ready;
                out.push(EngineEvent::StateChanged(EngineState::Ready));
                if playback.play_when_ready {
                    playback.playing_since = Some(now);
                    out.push(EngineEvent::IsPlayingChanged(true));
                }
            }
            out.insert(
                0,
                EngineEvent::PositionDiscontinuity {
                    old_position_ms,
                    new_position_ms: target,
                    reason: DiscontinuityReason::Seek,
                },
            );
        }
        self.publish(out);
    }

    fn set_speed(&self, speed: f32) {
        if speed.is_nan() || speed <= 0.0 {
            return;
        }
        let mut playback = self.state();
        playback.freeze(Instant::now());
        playback.speed = speed;
    }

    fn set_volume(&self, level: f32) {
        self.state().volume = level.clamp(0.0, 1.0);
    }

    fn release(&self) {
        let mut out = Vec::new();
        {
            let mut playback = self.state();
            if playback.released {
                return;
            }
            playback.released = true;
            playback.generation += 1;
            if playback.playing_since.take().is_some() {
                out.push(EngineEvent::IsPlayingChanged(false));
            }
            playback.state = EngineState::Idle;
            out.push(EngineEvent::StateChanged(EngineState::Idle));
        }
        self.publish(out);
    }

    fn is_playing(&self) -> bool {
        let mut out = Vec::new();
        let playing = {
            let mut playback = self.state();
            playback.settle_end(Instant::now(), &mut out);
            playback.playing_since.is_some()
        };
        self.publish(out);
        playing
    }

    fn current_position_ms(&self) -> i64 {
        let mut out = Vec::new();
        let position = {
            let mut playback = self.state();
            let now = Instant::now();
            playback.settle_end(now, &mut out);
            playback.position_at(now)
        };
        self.publish(out);
        position
    }

    fn duration_ms(&self) -> i64 {
        let playback = self.state();
        if playback.prepared {
            playback.media.duration_ms
        } else {
            TIME_UNSET
        }
    }

    fn buffered_position_ms(&self) -> i64 {
        let playback = self.state();
        if !playback.prepared {
            return 0;
        }
        let position = playback.position_at(Instant::now());
        (position + BUFFER_AHEAD_MS).min(playback.media.duration_ms)
    }

    fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }
}

/// Hands out [`SimulatedEngine`]s and keeps them reachable for inspection.
pub struct SimulatedEngineFactory {
    default_media: SimulatedMedia,
    catalog: HashMap<String, SimulatedMedia>,
    created: Mutex<Vec<Arc<SimulatedEngine>>>,
}

impl SimulatedEngineFactory {
    pub fn new(default_media: SimulatedMedia) -> Self {
        Self {
            default_media,
            catalog: HashMap::new(),
            created: Mutex::new(Vec::new()),
        }
    }

    pub fn with_media(mut self, uri: impl Into<String>, media: SimulatedMedia) -> Self {
        self.catalog.insert(uri.into(), media);
        self
    }

    pub fn created_count(&self) -> usize {
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn last_engine(&self) -> Option<Arc<SimulatedEngine>> {
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
    }
}

impl MediaEngineFactory for SimulatedEngineFactory {
    fn create(&self) -> Result<Arc<dyn MediaEngine>> {
        let engine = Arc::new(SimulatedEngine::with_catalog(
            self.default_media.clone(),
            self.catalog.clone(),
        ));
        self.created
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&engine));
        Ok(engine as Arc<dyn MediaEngine>)
    }
}
