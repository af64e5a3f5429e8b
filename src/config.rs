//! Persistent configuration model and defaults.

use std::path::{Path, PathBuf};

use log::info;

use crate::error::ConfigError;

/// Root configuration persisted to `trackmeta.toml`.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct Config {
    #[serde(default)]
    /// Track accessor preferences.
    pub tracks: TrackConfig,
    #[serde(default)]
    /// Live-stream tag handling.
    pub stream: StreamConfig,
    #[serde(default)]
    /// Log output preferences.
    pub logging: LoggingConfig,
}

/// Track accessor preferences.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct TrackConfig {
    /// Number of steps on the user-facing rating scale.
    #[serde(default = "default_rating_steps")]
    pub rating_steps: u32,
}

/// How change notifications are emitted while a stream burst is applied.
#[derive(Debug, Clone, Copy, serde::Deserialize, serde::Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StreamNotifyPolicy {
    /// One notification per tag written, like any other edit.
    #[default]
    PerTag,
    /// No notifications for stream updates.
    Suppressed,
    /// Nothing during the burst, then one notification per changed tag.
    Coalesced,
}

/// Live-stream tag handling.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct StreamConfig {
    #[serde(default)]
    pub notify_policy: StreamNotifyPolicy,
    /// Extensions whose streams use `comment` for something other than the album.
    #[serde(default = "default_mp3_only")]
    pub comment_overload_extensions: Vec<String>,
    /// Extensions whose streams carry the full title in one field.
    #[serde(default = "default_mp3_only")]
    pub unsplit_title_extensions: Vec<String>,
}

/// Log output preferences.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct LoggingConfig {
    /// One of `off`, `error`, `warn`, `info`, `debug`, `trace`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for TrackConfig {
    fn default() -> Self {
        Self {
            rating_steps: default_rating_steps(),
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            notify_policy: StreamNotifyPolicy::default(),
            comment_overload_extensions: default_mp3_only(),
            unsplit_title_extensions: default_mp3_only(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl LoggingConfig {
    /// Parsed level filter; unknown names fall back to `Info`.
    pub fn level_filter(&self) -> log::LevelFilter {
        self.level
            .trim()
            .parse::<log::LevelFilter>()
            .unwrap_or(log::LevelFilter::Info)
    }
}

fn default_rating_steps() -> u32 {
    5
}

fn default_mp3_only() -> Vec<String> {
    vec!["mp3".to_string()]
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Clamps values that would break accessors and lower-cases extension lists.
pub fn sanitize_config(mut config: Config) -> Config {
    config.tracks.rating_steps = config.tracks.rating_steps.max(1);
    for list in [
        &mut config.stream.comment_overload_extensions,
        &mut config.stream.unsplit_title_extensions,
    ] {
        for ext in list.iter_mut() {
            *ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
        }
        list.retain(|ext| !ext.is_empty());
    }
    config
}

/// Default location of `trackmeta.toml` in the user's config directory.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join("trackmeta.toml"))
        .ok_or(ConfigError::NoConfigDir)
}

/// Reads the config at `path`, writing defaults first when the file is missing.
pub fn load_or_create_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        info!(
            "Config file not found. Creating default config. path={}",
            path.display()
        );
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string(&Config::default())?)?;
    }

    let content = std::fs::read_to_string(path)?;
    let config = toml::from_str::<Config>(&content)?;
    Ok(sanitize_config(config))
}
