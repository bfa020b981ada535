use super::*;
use chrono::TimeZone;
use shared::domain::StreamType;

fn at(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().expect("timestamp")
}

fn update<'a>(source: &'a VideoSource, position_ms: i64, played_at_ms: i64) -> HistoryUpdate<'a> {
    HistoryUpdate {
        video_source: source,
        title: source.display_name(),
        position_ms,
        duration_ms: 100_000,
        played_at: at(played_at_ms),
    }
}

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("history.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );
}

#[tokio::test]
async fn saves_and_finds_history_by_source() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let source = VideoSource::remote("https://cdn.example/show/ep1.m3u8", StreamType::Hls);

    assert!(storage
        .history_by_source(&source)
        .await
        .expect("lookup")
        .is_none());

    let id = storage
        .upsert_history(update(&source, 42_000, 1_000))
        .await
        .expect("save");
    let record = storage
        .history_by_source(&source)
        .await
        .expect("lookup")
        .expect("record");

    assert_eq!(record.id, id);
    assert_eq!(record.video_source, source);
    assert_eq!(record.title, "ep1.m3u8");
    assert_eq!(record.last_position_ms, 42_000);
    assert_eq!(record.last_played_at_ms, 1_000);
    assert_eq!(record.thumbnail_path, None);
}

#[tokio::test]
async fn upsert_keeps_id_and_refreshes_progress() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let source = VideoSource::local("file:///m/a.mp4", "/m/a.mp4");

    let first = storage
        .upsert_history(update(&source, 1_000, 10))
        .await
        .expect("first save");
    let second = storage
        .upsert_history(update(&source, 9_000, 20))
        .await
        .expect("second save");
    assert_eq!(first, second);

    let all = storage.all_history().await.expect("all");
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].last_position_ms, 9_000);
    assert_eq!(all[0].last_played_at_ms, 20);
}

#[tokio::test]
async fn recent_history_is_ordered_and_limited() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let a = VideoSource::local("a", "/v/a.mp4");
    let b = VideoSource::local("b", "/v/b.mp4");
    let c = VideoSource::local("c", "/v/c.mp4");
    storage.upsert_history(update(&a, 1, 100)).await.expect("a");
    storage.upsert_history(update(&b, 1, 300)).await.expect("b");
    storage.upsert_history(update(&c, 1, 200)).await.expect("c");

    let recent = storage.recent_history(2).await.expect("recent");
    let titles: Vec<_> = recent.iter().map(|r| r.title.as_str()).collect();
    assert_eq!(titles, vec!["b.mp4", "c.mp4"]);
}

#[tokio::test]
async fn deletes_single_and_all_history() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let a = VideoSource::local("a", "/v/a.mp4");
    let b = VideoSource::local("b", "/v/b.mp4");
    let id_a = storage.upsert_history(update(&a, 1, 1)).await.expect("a");
    storage.upsert_history(update(&b, 1, 2)).await.expect("b");

    assert!(storage.delete_history(id_a).await.expect("delete"));
    assert!(!storage.delete_history(id_a).await.expect("delete again"));
    assert!(storage.history_by_id(id_a).await.expect("by id").is_none());

    assert_eq!(storage.delete_all_history().await.expect("clear"), 1);
    assert!(storage.all_history().await.expect("all").is_empty());
}

#[tokio::test]
async fn thumbnail_path_can_be_attached() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    let source = VideoSource::local("a", "/v/a.mp4");
    let id = storage.upsert_history(update(&source, 1, 1)).await.expect("save");

    assert!(storage
        .set_thumbnail_path(id, Some("/thumbs/a.jpg"))
        .await
        .expect("thumbnail"));
    let record = storage.history_by_id(id).await.expect("by id").expect("record");
    assert_eq!(record.thumbnail_path.as_deref(), Some("/thumbs/a.jpg"));
}

#[tokio::test]
async fn preferences_round_trip_and_overwrite() {
    let storage = Storage::new("sqlite::memory:").await.expect("db");
    assert_eq!(
        storage.load_preference(PLAYBACK_SPEED_KEY).await.expect("load"),
        None
    );

    storage
        .save_preference(PLAYBACK_SPEED_KEY, "1.5")
        .await
        .expect("save");
    storage
        .save_preference(PLAYBACK_SPEED_KEY, "2")
        .await
        .expect("overwrite");

    assert_eq!(
        storage
            .load_preference(PLAYBACK_SPEED_KEY)
            .await
            .expect("load")
            .as_deref(),
        Some("2")
    );
}

#[test]
fn memory_urls_have_no_file_path() {
    assert_eq!(sqlite_path("sqlite::memory:"), None);
    assert_eq!(
        sqlite_path("sqlite://./data/history.db?mode=rwc"),
        Some(PathBuf::from("./data/history.db"))
    );
}

#[test]
fn normalizes_plain_paths_to_sqlite_urls() {
    assert_eq!(
        normalize_database_url("./data/player.db").as_deref(),
        Some("sqlite://./data/player.db")
    );
    assert_eq!(
        normalize_database_url(r"sqlite:data\player.db").as_deref(),
        Some("sqlite://data/player.db")
    );
    assert_eq!(
        normalize_database_url(" sqlite://x.db?mode=rwc ").as_deref(),
        Some("sqlite://x.db?mode=rwc")
    );
    assert_eq!(
        normalize_database_url("sqlite::memory:").as_deref(),
        Some("sqlite::memory:")
    );
    assert_eq!(normalize_database_url("   "), None);
}
