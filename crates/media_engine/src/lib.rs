//! Contract between the player core and the component that actually decodes
//! and renders media. Engines report state changes asynchronously through a
//! broadcast channel using their own native vocabulary.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::broadcast;

mod simulated;

pub use simulated::{SimulatedEngine, SimulatedEngineFactory, SimulatedMedia};

/// Reported by an engine whose duration is not known yet.
pub const TIME_UNSET: i64 = -1;

/// Native error codes. Values follow the engine's own numbering; anything not
/// listed here is still delivered, just never classified beyond "unknown".
pub mod error_codes {
    pub const UNSPECIFIED: i32 = 1000;
    pub const IO_UNSPECIFIED: i32 = 2000;
    pub const IO_NETWORK_CONNECTION_FAILED: i32 = 2001;
    pub const IO_NETWORK_CONNECTION_TIMEOUT: i32 = 2002;
    pub const IO_INVALID_HTTP_CONTENT_TYPE: i32 = 2003;
    pub const IO_BAD_HTTP_STATUS: i32 = 2004;
    pub const IO_FILE_NOT_FOUND: i32 = 2005;
    pub const PARSING_CONTAINER_MALFORMED: i32 = 3001;
    pub const PARSING_MANIFEST_MALFORMED: i32 = 3002;
    pub const PARSING_CONTAINER_UNSUPPORTED: i32 = 3003;
    pub const DECODING_FAILED: i32 = 4001;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Buffering,
    Ready,
    Ended,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscontinuityReason {
    AutoTransition,
    Seek,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("engine error {code}: {}", message.as_deref().unwrap_or("unknown error"))]
pub struct NativeError {
    pub code: i32,
    pub message: Option<String>,
}

impl NativeError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    IsPlayingChanged(bool),
    StateChanged(EngineState),
    PositionDiscontinuity {
        old_position_ms: i64,
        new_position_ms: i64,
        reason: DiscontinuityReason,
    },
    Error(NativeError),
}

pub trait MediaEngine: Send + Sync {
    /// Starts asynchronous preparation of `uri`. `adaptive` selects the
    /// segmented-streaming strategy instead of progressive download.
    fn load(&self, uri: &str, adaptive: bool) -> anyhow::Result<()>;
    fn play(&self);
    fn pause(&self);
    /// Engines clamp the target to `[0, duration]`.
    fn seek_to(&self, position_ms: i64);
    fn set_speed(&self, speed: f32);
    fn set_volume(&self, level: f32);
    fn release(&self);
    fn is_playing(&self) -> bool;
    fn current_position_ms(&self) -> i64;
    /// [`TIME_UNSET`] until the media is prepared.
    fn duration_ms(&self) -> i64;
    fn buffered_position_ms(&self) -> i64;
    fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent>;
}

pub trait MediaEngineFactory: Send + Sync {
    fn create(&self) -> anyhow::Result<Arc<dyn MediaEngine>>;
}

#[cfg(test)]
#[path = "tests/simulated_tests.rs"]
mod tests;
