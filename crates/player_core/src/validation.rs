use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use shared::domain::{VideoInfo, VideoSource};
use tracing::warn;
use url::Url;

use crate::VideoRepository;

pub const SUPPORTED_VIDEO_EXTENSIONS: &[&str] =
    &["mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "3gp", "m4v"];
pub const SUPPORTED_STREAM_EXTENSIONS: &[&str] = &["mp4", "m3u8", "mpd", "webm"];

const REMOTE_SCHEMES: &[&str] = &["http", "https", "rtsp"];
const LOCAL_FALLBACK_TITLE: &str = "Local video";
const REMOTE_FALLBACK_TITLE: &str = "Network video";

/// Checks local sources against the file system and remote sources against
/// URL syntax. Unfamiliar formats are accepted with a warning since the
/// engine may still decode them.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsVideoRepository;

#[async_trait]
impl VideoRepository for FsVideoRepository {
    async fn validate_video_source(&self, source: &VideoSource) -> Result<VideoSource> {
        match source {
            VideoSource::Local { identifier, path } => {
                let file_path = local_file_path(identifier, path);
                let is_file = tokio::fs::metadata(&file_path)
                    .await
                    .map(|meta| meta.is_file())
                    .unwrap_or(false);
                if !is_file {
                    bail!("video file does not exist: {identifier}");
                }
                if let Some(extension) = extension_of(&file_path) {
                    if !SUPPORTED_VIDEO_EXTENSIONS.contains(&extension.as_str()) {
                        warn!("validation: unfamiliar video format extension={extension}");
                    }
                }
            }
            VideoSource::Remote { url, .. } => {
                let parsed =
                    Url::parse(url).with_context(|| format!("invalid video URL: {url}"))?;
                if !REMOTE_SCHEMES.contains(&parsed.scheme()) {
                    bail!("invalid video URL: {url}");
                }
                let lower = url.to_ascii_lowercase();
                let looks_like_video = SUPPORTED_STREAM_EXTENSIONS
                    .iter()
                    .any(|extension| lower.contains(&format!(".{extension}")));
                if !looks_like_video {
                    warn!("validation: url may not point at a video url={url}");
                }
            }
        }
        Ok(source.clone())
    }

    async fn video_info(&self, source: &VideoSource) -> Result<VideoInfo> {
        let title = match source {
            VideoSource::Local { identifier, path } => local_file_path(identifier, path)
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .filter(|name| !name.is_empty())
                .unwrap_or_else(|| LOCAL_FALLBACK_TITLE.to_string()),
            VideoSource::Remote { url, .. } => {
                let last = url.rsplit('/').next().unwrap_or_default();
                let name = last.split('?').next().unwrap_or_default();
                if name.is_empty() {
                    REMOTE_FALLBACK_TITLE.to_string()
                } else {
                    name.to_string()
                }
            }
        };
        Ok(VideoInfo {
            title,
            duration_ms: 0,
            width: 0,
            height: 0,
        })
    }
}

/// `file://` identifiers point at the file directly; anything else falls
/// back to the stored path.
fn local_file_path(identifier: &str, path: &str) -> PathBuf {
    if identifier.starts_with("file://") {
        if let Some(file) = Url::parse(identifier)
            .ok()
            .and_then(|url| url.to_file_path().ok())
        {
            return file;
        }
    }
    PathBuf::from(path)
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .map(|extension| extension.to_string_lossy().to_ascii_lowercase())
        .filter(|extension| !extension.is_empty())
}

#[cfg(test)]
#[path = "tests/validation_tests.rs"]
mod tests;
