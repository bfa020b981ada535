use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tracing::warn;

use shared::domain::{HistoryId, HistoryRecord, VideoSource};

pub const PLAYBACK_SPEED_KEY: &str = "playback_speed";
pub const BRIGHTNESS_KEY: &str = "brightness";

const HISTORY_COLUMNS: &str = "id, video_source, video_title, last_position_ms, duration_ms, \
     last_played_at_ms, thumbnail_path";

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

/// Progress snapshot written for one source.
#[derive(Debug, Clone)]
pub struct HistoryUpdate<'a> {
    pub video_source: &'a VideoSource,
    pub title: &'a str,
    pub position_ms: i64,
    pub duration_ms: i64,
    pub played_at: DateTime<Utc>,
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // Every connection to an in-memory database sees its own empty database.
        let pool_options = if is_memory_url(database_url) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = pool_options.connect_with(connect_options).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    pub async fn history_by_source(&self, source: &VideoSource) -> Result<Option<HistoryRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {HISTORY_COLUMNS} FROM playback_history WHERE video_source = ? LIMIT 1"
        ))
        .bind(source.encode())
        .fetch_optional(&self.pool)
        .await
        .context("failed to look up playback history by source")?;
        row.map(|r| history_from_row(&r)).transpose()
    }

    pub async fn history_by_id(&self, id: HistoryId) -> Result<Option<HistoryRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {HISTORY_COLUMNS} FROM playback_history WHERE id = ?"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| history_from_row(&r)).transpose()
    }

    /// Inserts or refreshes the record for `update.video_source`, keeping its id.
    pub async fn upsert_history(&self, update: HistoryUpdate<'_>) -> Result<HistoryId> {
        let rec = sqlx::query(
            "INSERT INTO playback_history
                 (video_source, video_title, last_position_ms, duration_ms, last_played_at_ms)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT(video_source) DO UPDATE SET
                 video_title = excluded.video_title,
                 last_position_ms = excluded.last_position_ms,
                 duration_ms = excluded.duration_ms,
                 last_played_at_ms = excluded.last_played_at_ms
             RETURNING id",
        )
        .bind(update.video_source.encode())
        .bind(update.title)
        .bind(update.position_ms)
        .bind(update.duration_ms)
        .bind(update.played_at.timestamp_millis())
        .fetch_one(&self.pool)
        .await
        .with_context(|| {
            format!(
                "failed to save playback history for '{}'",
                update.video_source.encode()
            )
        })?;
        Ok(HistoryId(rec.get::<i64, _>(0)))
    }

    pub async fn set_thumbnail_path(&self, id: HistoryId, path: Option<&str>) -> Result<bool> {
        let result = sqlx::query("UPDATE playback_history SET thumbnail_path = ? WHERE id = ?")
            .bind(path)
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_history(&self, id: HistoryId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM playback_history WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await
            .context("failed to delete playback history record")?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_all_history(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM playback_history")
            .execute(&self.pool)
            .await
            .context("failed to clear playback history")?;
        Ok(result.rows_affected())
    }

    /// Most recently played first.
    pub async fn recent_history(&self, limit: u32) -> Result<Vec<HistoryRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {HISTORY_COLUMNS} FROM playback_history
             ORDER BY last_played_at_ms DESC, id DESC LIMIT ?"
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await?;
        Ok(decode_rows(rows))
    }

    pub async fn all_history(&self) -> Result<Vec<HistoryRecord>> {
        let rows = sqlx::query(&format!(
            "SELECT {HISTORY_COLUMNS} FROM playback_history
             ORDER BY last_played_at_ms DESC, id DESC"
        ))
        .fetch_all(&self.pool)
        .await?;
        Ok(decode_rows(rows))
    }

    pub async fn load_preference(&self, key: &str) -> Result<Option<String>> {
        let row = sqlx::query("SELECT value FROM preferences WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<String, _>(0)))
    }

    pub async fn save_preference(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            "INSERT INTO preferences (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to save preference '{key}'"))?;
        Ok(())
    }
}

fn history_from_row(row: &SqliteRow) -> Result<HistoryRecord> {
    let raw_source: String = row.try_get("video_source")?;
    let video_source = VideoSource::decode(&raw_source)
        .ok_or_else(|| anyhow!("corrupt video_source column '{raw_source}'"))?;
    Ok(HistoryRecord {
        id: HistoryId(row.try_get("id")?),
        video_source,
        title: row.try_get("video_title")?,
        last_position_ms: row.try_get("last_position_ms")?,
        duration_ms: row.try_get("duration_ms")?,
        last_played_at_ms: row.try_get("last_played_at_ms")?,
        thumbnail_path: row.try_get("thumbnail_path")?,
    })
}

fn decode_rows(rows: Vec<SqliteRow>) -> Vec<HistoryRecord> {
    rows.iter()
        .filter_map(|row| match history_from_row(row) {
            Ok(record) => Some(record),
            Err(err) => {
                warn!("storage: skipping unreadable history row: {err:#}");
                None
            }
        })
        .collect()
}

/// Turns a bare file path into a `sqlite://` URL and keeps full URLs as
/// they are. Blank input yields `None`.
pub fn normalize_database_url(raw_database_url: &str) -> Option<String> {
    let raw_database_url = raw_database_url.trim();
    if raw_database_url.is_empty() {
        return None;
    }
    if raw_database_url.contains("://") || is_memory_url(raw_database_url) {
        return Some(raw_database_url.to_string());
    }
    let path = raw_database_url
        .strip_prefix("sqlite:")
        .unwrap_or(raw_database_url);
    Some(format!("sqlite://{}", path.replace('\\', "/")))
}

fn is_memory_url(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if is_memory_url(database_url) || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
