use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::platform;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub player: PlayerConfig,
    #[serde(default)]
    pub metadata: MetadataConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// External player launch and control settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Explicit path to the mpv binary; searched beside the exe and on PATH when unset.
    #[serde(default)]
    pub binary: Option<PathBuf>,
    #[serde(default = "default_volume")]
    pub default_volume: u8,
    #[serde(default = "default_volume_step")]
    pub volume_step: u8,
    #[serde(default = "default_demuxer_max_bytes")]
    pub demuxer_max_bytes: String,
    #[serde(default = "default_audio_buffer_secs")]
    pub audio_buffer_secs: f32,
    #[serde(default = "default_start_timeout_ms")]
    pub start_timeout_ms: u64,
    #[serde(default = "default_stop_timeout_ms")]
    pub stop_timeout_ms: u64,
}

/// In-band metadata and statistics polling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_retry_backoff_secs")]
    pub retry_backoff_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_stats_interval_secs")]
    pub stats_interval_secs: u64,
    #[serde(default = "default_stats_warmup_secs")]
    pub stats_warmup_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// Force the plain line-oriented surface even on a capable terminal.
    #[serde(default)]
    pub plain: bool,
    #[serde(default = "default_true")]
    pub notifications: bool,
    #[serde(default = "default_frame_ms")]
    pub frame_ms: u64,
    #[serde(default = "default_timer_ms")]
    pub timer_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_history_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            binary: None,
            default_volume: default_volume(),
            volume_step: default_volume_step(),
            demuxer_max_bytes: default_demuxer_max_bytes(),
            audio_buffer_secs: default_audio_buffer_secs(),
            start_timeout_ms: default_start_timeout_ms(),
            stop_timeout_ms: default_stop_timeout_ms(),
        }
    }
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
            retry_backoff_secs: default_retry_backoff_secs(),
            user_agent: default_user_agent(),
            stats_interval_secs: default_stats_interval_secs(),
            stats_warmup_secs: default_stats_warmup_secs(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            plain: false,
            notifications: true,
            frame_ms: default_frame_ms(),
            timer_ms: default_timer_ms(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_history_path(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            filter: default_log_filter(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_volume() -> u8 {
    50
}

fn default_volume_step() -> u8 {
    5
}

fn default_demuxer_max_bytes() -> String {
    "1M".to_string()
}

fn default_audio_buffer_secs() -> f32 {
    0.1
}

fn default_start_timeout_ms() -> u64 {
    2000
}

fn default_stop_timeout_ms() -> u64 {
    2000
}

fn default_request_timeout_secs() -> u64 {
    3
}

fn default_retry_backoff_secs() -> u64 {
    2
}

fn default_user_agent() -> String {
    format!("radio-m3u/{}", env!("CARGO_PKG_VERSION"))
}

fn default_stats_interval_secs() -> u64 {
    2
}

fn default_stats_warmup_secs() -> u64 {
    3
}

fn default_frame_ms() -> u64 {
    100
}

fn default_timer_ms() -> u64 {
    1000
}

fn default_history_path() -> PathBuf {
    platform::data_dir().join("history.tsv")
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Config {
    /// Load the user config, writing a default file on first run.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            let config = Self::default();
            config.save_to(&config_path)?;
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        platform::config_dir().join("config.toml")
    }
}
