use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Closed classification of everything that can stop a video from playing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackErrorKind {
    /// The source failed validation (missing file, malformed URL).
    SourceValidation,
    /// Connection failure or timeout while fetching media.
    Network,
    /// A remote source answered with a bad HTTP status.
    Server,
    /// Unsupported or corrupt media container.
    ContainerMalformed,
    Unknown,
}

impl PlaybackErrorKind {
    /// Whether retrying the same source can succeed. The other kinds need a
    /// different source.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network | Self::Server | Self::Unknown)
    }
}

/// Classified failure as observed by the UI: a kind plus the message shown on
/// the error panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackFailure {
    pub kind: PlaybackErrorKind,
    pub message: String,
}

impl PlaybackFailure {
    pub fn new(kind: PlaybackErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Invalid video source: {0}")]
    SourceValidation(String),
    #[error("Network connection failed, check network settings")]
    Network,
    #[error("Server error: {0}")]
    Server(String),
    #[error("Unsupported video format or corrupted file")]
    ContainerMalformed,
    #[error("Playback error: {0}")]
    Playback(String),
    #[error("Playback failed: {0}")]
    Load(String),
}

impl SessionError {
    pub fn kind(&self) -> PlaybackErrorKind {
        match self {
            Self::SourceValidation(_) => PlaybackErrorKind::SourceValidation,
            Self::Network => PlaybackErrorKind::Network,
            Self::Server(_) => PlaybackErrorKind::Server,
            Self::ContainerMalformed => PlaybackErrorKind::ContainerMalformed,
            Self::Playback(_) | Self::Load(_) => PlaybackErrorKind::Unknown,
        }
    }
}

impl From<SessionError> for PlaybackFailure {
    fn from(value: SessionError) -> Self {
        Self {
            kind: value.kind(),
            message: value.to_string(),
        }
    }
}

/// Why a persisted `VideoSource` string could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceCodecError {
    #[error("encoded video source has too few segments")]
    MissingSegments,
    #[error("unknown video source tag '{0}'")]
    UnknownTag(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_errors_map_to_taxonomy() {
        assert_eq!(
            SessionError::SourceValidation("gone".into()).kind(),
            PlaybackErrorKind::SourceValidation
        );
        assert_eq!(SessionError::Network.kind(), PlaybackErrorKind::Network);
        assert_eq!(
            SessionError::Server("503".into()).kind(),
            PlaybackErrorKind::Server
        );
        assert_eq!(
            SessionError::ContainerMalformed.kind(),
            PlaybackErrorKind::ContainerMalformed
        );
        assert_eq!(
            SessionError::Load("boom".into()).kind(),
            PlaybackErrorKind::Unknown
        );
    }

    #[test]
    fn failure_carries_display_message() {
        let failure = PlaybackFailure::from(SessionError::Server("HTTP 404".into()));
        assert_eq!(failure.kind, PlaybackErrorKind::Server);
        assert_eq!(failure.message, "Server error: HTTP 404");
    }

    #[test]
    fn only_transient_kinds_are_retryable() {
        assert!(PlaybackErrorKind::Network.is_retryable());
        assert!(PlaybackErrorKind::Server.is_retryable());
        assert!(!PlaybackErrorKind::ContainerMalformed.is_retryable());
        assert!(!PlaybackErrorKind::SourceValidation.is_retryable());
    }
}
