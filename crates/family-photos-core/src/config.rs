use config::{Config, ConfigError, Environment, File as ConfigFile};
use serde::Deserialize;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub storage_root: String,
    pub database_path: String,
    #[serde(default)]
    pub scan: ScanConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where and how much the binary logs. `TRACING_LEVEL` in the environment
/// overrides `level`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Directory of the log file, created when missing.
    pub directory: String,
    pub file_name: String,
    pub rotation: LogRotation,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: "./logs".to_string(),
            file_name: "family-photos.log".to_string(),
            rotation: LogRotation::Never,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    Never,
    Daily,
    Hourly,
}

/// Knobs for the startup scan and timestamp inference.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Size of the resolution worker pool.
    pub workers: usize,
    /// Upper bound for inferring one file's timestamp.
    pub resolve_timeout_secs: u64,
    /// Unit of `timestamp` values inside sidecar files.
    pub sidecar_timestamp_unit: TimestampUnit,
    /// Read capture times from EXIF headers of images.
    pub exif_times: bool,
    /// Fall back to OS creation/modified times.
    pub filesystem_times: bool,
    /// Fall back to the stored time of an already cataloged file with the same name.
    pub catalog_lookup: bool,
    pub insert_batch_size: usize,
    /// Glob patterns for files the scanner must not catalog.
    pub ignore_patterns: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            workers: thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            resolve_timeout_secs: 8,
            sidecar_timestamp_unit: TimestampUnit::Seconds,
            exif_times: true,
            filesystem_times: true,
            catalog_lookup: true,
            insert_batch_size: 512,
            ignore_patterns: Vec::new(),
        }
    }
}

impl ScanConfig {
    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_secs(self.resolve_timeout_secs)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampUnit {
    Seconds,
    Millis,
}

impl TimestampUnit {
    /// Converts a raw value in this unit to epoch milliseconds.
    pub fn to_millis(self, value: i64) -> Option<i64> {
        match self {
            TimestampUnit::Seconds => value.checked_mul(1000),
            TimestampUnit::Millis => Some(value),
        }
    }
}

pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .set_default("storage_root", "./storage")?
        .set_default("database_path", "family_photos.db")?
        .add_source(ConfigFile::with_name("Config").required(false))
        .add_source(
            Environment::with_prefix("FAMILY_PHOTOS")
                .prefix_separator("__")
                .separator("__"),
        )
        .build()?;
    builder.try_deserialize::<AppConfig>()
}
