use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::SourceCodecError;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(HistoryId);

const LOCAL_TAG: &str = "LOCAL";
const REMOTE_TAG: &str = "REMOTE";

/// Resume is only offered below this share of the total duration.
const RESUME_LIMIT_NUMERATOR: i64 = 9;
const RESUME_LIMIT_DENOMINATOR: i64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StreamType {
    Http,
    Hls,
    Dash,
}

impl StreamType {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Http => "HTTP",
            Self::Hls => "HLS",
            Self::Dash => "DASH",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "HTTP" => Some(Self::Http),
            "HLS" => Some(Self::Hls),
            "DASH" => Some(Self::Dash),
            _ => None,
        }
    }
}

/// Where a video comes from. Equality is structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VideoSource {
    Local { identifier: String, path: String },
    Remote { url: String, stream_type: StreamType },
}

impl VideoSource {
    pub fn local(identifier: impl Into<String>, path: impl Into<String>) -> Self {
        Self::Local {
            identifier: identifier.into(),
            path: path.into(),
        }
    }

    pub fn remote(url: impl Into<String>, stream_type: StreamType) -> Self {
        Self::Remote {
            url: url.into(),
            stream_type,
        }
    }

    /// Adaptive streams need the segmented loading strategy.
    pub fn is_hls(&self) -> bool {
        matches!(
            self,
            Self::Remote {
                stream_type: StreamType::Hls,
                ..
            }
        )
    }

    /// Address handed to the media engine.
    pub fn to_uri(&self) -> &str {
        match self {
            Self::Local { identifier, .. } => identifier,
            Self::Remote { url, .. } => url,
        }
    }

    /// Last `/` segment of the path or URL, used as the history title.
    pub fn display_name(&self) -> &str {
        let raw = match self {
            Self::Local { path, .. } => path.as_str(),
            Self::Remote { url, .. } => url.as_str(),
        };
        raw.rsplit('/').next().unwrap_or(raw)
    }

    /// Persisted text form: `LOCAL:<identifier>:<path>` or `REMOTE:<url>:<streamType>`.
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Inverse of [`VideoSource::encode`]; malformed input yields `None`.
    pub fn decode(value: &str) -> Option<Self> {
        value.parse().ok()
    }
}

impl fmt::Display for VideoSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local { identifier, path } => write!(f, "{LOCAL_TAG}:{identifier}:{path}"),
            Self::Remote { url, stream_type } => {
                write!(f, "{REMOTE_TAG}:{url}:{}", stream_type.name())
            }
        }
    }
}

impl FromStr for VideoSource {
    type Err = SourceCodecError;

    // The tag ends at the first ':' and the trailing field starts after the
    // last one, so identifiers and URLs may contain ':' themselves.
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let (tag, rest) = value
            .split_once(':')
            .ok_or(SourceCodecError::MissingSegments)?;
        if tag != LOCAL_TAG && tag != REMOTE_TAG {
            return Err(SourceCodecError::UnknownTag(tag.to_string()));
        }
        let (head, tail) = rest
            .rsplit_once(':')
            .ok_or(SourceCodecError::MissingSegments)?;

        if tag == LOCAL_TAG {
            Ok(Self::local(head, tail))
        } else {
            let stream_type = StreamType::from_name(tail).unwrap_or(StreamType::Http);
            Ok(Self::remote(head, stream_type))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AspectRatio {
    #[default]
    Fit,
    Original,
    SixteenNine,
    FourThree,
    Fill,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 5] = [
        Self::Fit,
        Self::Original,
        Self::SixteenNine,
        Self::FourThree,
        Self::Fill,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Fit => "Fit",
            Self::Original => "Original",
            Self::SixteenNine => "16:9",
            Self::FourThree => "4:3",
            Self::Fill => "Fill",
        }
    }

    /// Forced width/height ratio, if the mode imposes one.
    pub fn ratio(&self) -> Option<f32> {
        match self {
            Self::SixteenNine => Some(16.0 / 9.0),
            Self::FourThree => Some(4.0 / 3.0),
            Self::Fit | Self::Original | Self::Fill => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: HistoryId,
    pub video_source: VideoSource,
    pub title: String,
    pub last_position_ms: i64,
    pub duration_ms: i64,
    pub last_played_at_ms: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_path: Option<String>,
}

impl HistoryRecord {
    pub fn resume_position_ms(&self) -> Option<i64> {
        resume_position_ms(self.last_position_ms, self.duration_ms)
    }
}

/// Position to resume from, offered only when `0 < last < 0.9 * duration`.
pub fn resume_position_ms(last_position_ms: i64, duration_ms: i64) -> Option<i64> {
    let below_limit = (last_position_ms as i128) * (RESUME_LIMIT_DENOMINATOR as i128)
        < (duration_ms as i128) * (RESUME_LIMIT_NUMERATOR as i128);
    (last_position_ms > 0 && below_limit).then_some(last_position_ms)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub title: String,
    pub duration_ms: i64,
    pub width: u32,
    pub height: u32,
}
