use std::{collections::HashMap, fs, time::Duration};

use player_core::SessionConfig;
use storage::normalize_database_url;
use tracing::warn;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub database_url: String,
    pub surface_width: f32,
    pub poll_interval_ms: u64,
    pub history_save_interval_ms: u64,
    pub simulated_duration_ms: i64,
}

impl Default for Settings {
    fn default() -> Self {
        let session = SessionConfig::default();
        Self {
            database_url: "sqlite://./data/player.db".into(),
            surface_width: session.surface_width,
            poll_interval_ms: session.poll_interval.as_millis() as u64,
            history_save_interval_ms: session.history_save_interval.as_millis() as u64,
            simulated_duration_ms: 120_000,
        }
    }
}

impl Settings {
    /// Database URL handed to `Storage::new`, which creates missing parent
    /// directories. A blank setting falls back to the default location.
    pub fn database_url(&self) -> String {
        normalize_database_url(&self.database_url)
            .unwrap_or_else(|| Settings::default().database_url)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms.max(1)),
            history_save_interval: Duration::from_millis(self.history_save_interval_ms),
            surface_width: self.surface_width,
            ..SessionConfig::default()
        }
    }
}

pub fn load_settings() -> Settings {
    let mut settings = Settings::default();
    if let Ok(raw) = fs::read_to_string("player.toml") {
        apply_file_overrides(&mut settings, &raw);
    }
    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    settings
}

fn apply_file_overrides(settings: &mut Settings, raw: &str) {
    let file_cfg = match toml::from_str::<HashMap<String, String>>(raw) {
        Ok(file_cfg) => file_cfg,
        Err(err) => {
            warn!("config: ignoring unreadable player.toml: {err}");
            return;
        }
    };
    if let Some(v) = file_cfg.get("database_url") {
        settings.database_url = v.clone();
    }
    set_parsed(&mut settings.surface_width, file_cfg.get("surface_width"));
    set_parsed(&mut settings.poll_interval_ms, file_cfg.get("poll_interval_ms"));
    set_parsed(
        &mut settings.history_save_interval_ms,
        file_cfg.get("history_save_interval_ms"),
    );
    set_parsed(
        &mut settings.simulated_duration_ms,
        file_cfg.get("simulated_duration_ms"),
    );
}

fn apply_env_overrides(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("PLAYER_DATABASE_URL") {
        settings.database_url = v;
    }
    if let Some(v) = var("APP__DATABASE_URL") {
        settings.database_url = v;
    }
    set_parsed(&mut settings.surface_width, var("APP__SURFACE_WIDTH").as_ref());
    set_parsed(
        &mut settings.poll_interval_ms,
        var("APP__POLL_INTERVAL_MS").as_ref(),
    );
    set_parsed(
        &mut settings.history_save_interval_ms,
        var("APP__HISTORY_SAVE_INTERVAL_MS").as_ref(),
    );
    set_parsed(
        &mut settings.simulated_duration_ms,
        var("APP__SIMULATED_DURATION_MS").as_ref(),
    );
}

fn set_parsed<T: std::str::FromStr>(slot: &mut T, raw: Option<&String>) {
    let Some(raw) = raw else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(parsed) => *slot = parsed,
        Err(_) => warn!("config: ignoring unparsable value '{raw}'"),
    }
}
