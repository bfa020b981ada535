use super::*;
use shared::domain::StreamType;

#[tokio::test]
async fn existing_local_file_is_accepted() {
    let dir = tempfile::tempdir().expect("tempdir");
    let file = dir.path().join("clip.mkv");
    std::fs::write(&file, b"not really a video").expect("write");
    let path = file.to_string_lossy().into_owned();

    let source = VideoSource::local(path.clone(), path);
    let validated = FsVideoRepository
        .validate_video_source(&source)
        .await
        .expect("valid");
    assert_eq!(validated, source);
}

#[tokio::test]
async fn file_uri_identifier_is_resolved() {
    let dir = tempfile::tempdir().expect("tempdir");
    let file = dir.path().join("movie.mp4");
    std::fs::write(&file, b"x").expect("write");
    let uri = Url::from_file_path(&file).expect("file url").to_string();

    let source = VideoSource::local(uri, "/elsewhere/movie.mp4");
    assert!(FsVideoRepository.validate_video_source(&source).await.is_ok());
}

#[tokio::test]
async fn missing_or_directory_local_source_is_rejected() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("gone.mp4").to_string_lossy().into_owned();
    let err = FsVideoRepository
        .validate_video_source(&VideoSource::local(missing.clone(), missing))
        .await
        .expect_err("missing file");
    assert!(err.to_string().contains("does not exist"), "{err:#}");

    let folder = dir.path().to_string_lossy().into_owned();
    assert!(FsVideoRepository
        .validate_video_source(&VideoSource::local(folder.clone(), folder))
        .await
        .is_err());
}

#[tokio::test]
async fn unfamiliar_extensions_are_still_accepted() {
    let dir = tempfile::tempdir().expect("tempdir");
    let file = dir.path().join("capture.ts");
    std::fs::write(&file, b"x").expect("write");
    let path = file.to_string_lossy().into_owned();
    assert!(FsVideoRepository
        .validate_video_source(&VideoSource::local(path.clone(), path))
        .await
        .is_ok());
}

#[tokio::test]
async fn remote_urls_need_a_streaming_scheme() {
    for url in [
        "https://cdn.example/live/index.m3u8",
        "http://10.0.0.2:8080/movie.mp4",
        "rtsp://camera.local/stream",
        "https://cdn.example/watch?v=42",
    ] {
        let source = VideoSource::remote(url, StreamType::Http);
        assert!(
            FsVideoRepository.validate_video_source(&source).await.is_ok(),
            "{url}"
        );
    }
    for url in ["not a url", "ftp://files.example/a.mp4", "/relative/a.mp4"] {
        let source = VideoSource::remote(url, StreamType::Http);
        let err = FsVideoRepository
            .validate_video_source(&source)
            .await
            .expect_err(url);
        assert!(err.to_string().contains("invalid video URL"), "{err:#}");
    }
}

#[tokio::test]
async fn video_info_titles_come_from_last_segment() {
    let remote = VideoSource::remote("https://cdn.example/a/show.m3u8?token=abc", StreamType::Hls);
    let info = FsVideoRepository.video_info(&remote).await.expect("info");
    assert_eq!(info.title, "show.m3u8");
    assert_eq!(info.duration_ms, 0);

    let bare = VideoSource::remote("https://cdn.example/", StreamType::Http);
    assert_eq!(
        FsVideoRepository.video_info(&bare).await.expect("info").title,
        "Network video"
    );

    let local = VideoSource::local("content://media/42", "/storage/movies/trip.mp4");
    assert_eq!(
        FsVideoRepository.video_info(&local).await.expect("info").title,
        "trip.mp4"
    );

    let unnamed = VideoSource::local("content://media/42", "");
    assert_eq!(
        FsVideoRepository.video_info(&unnamed).await.expect("info").title,
        "Local video"
    );
}
