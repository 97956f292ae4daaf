use family_photos_core::{LogRotation, LoggingConfig};
use std::env;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// Logs to stdout and to a file under `config.directory`. Keep the guard
/// alive until exit or buffered file output is lost.
pub fn init_logger(config: &LoggingConfig) -> Result<WorkerGuard, InitError> {
    let filter_layer = EnvFilter::new(level(config));
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender(config)?);

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(std::io::stdout)
                .pretty()
                .with_file(false)
                .without_time()
                .with_ansi(true),
        )
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .with(filter_layer)
        .init();

    info!(
        "Logging to stdout and {}/{}",
        config.directory, config.file_name
    );
    Ok(guard)
}

fn level(config: &LoggingConfig) -> String {
    env::var("TRACING_LEVEL").unwrap_or_else(|_| config.level.clone())
}

fn file_appender(config: &LoggingConfig) -> Result<RollingFileAppender, InitError> {
    let rotation = match config.rotation {
        LogRotation::Never => Rotation::NEVER,
        LogRotation::Daily => Rotation::DAILY,
        LogRotation::Hourly => Rotation::HOURLY,
    };
    RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(&config.file_name)
        .build(&config.directory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_appender_writes_into_configured_directory() {
        let dir = tempdir().unwrap();
        let directory = dir.path().join("nested/logs");
        let config = LoggingConfig {
            directory: directory.to_string_lossy().into_owned(),
            file_name: "sync.log".to_string(),
            ..LoggingConfig::default()
        };

        let mut appender = file_appender(&config).unwrap();
        appender.write_all(b"hello\n").unwrap();
        appender.flush().unwrap();

        let written = std::fs::read_to_string(directory.join("sync.log")).unwrap();
        assert_eq!(written, "hello\n");
    }

    #[test]
    fn test_daily_rotation_suffixes_the_file_name() {
        let dir = tempdir().unwrap();
        let config = LoggingConfig {
            directory: dir.path().to_string_lossy().into_owned(),
            file_name: "sync.log".to_string(),
            rotation: LogRotation::Daily,
            ..LoggingConfig::default()
        };

        let mut appender = file_appender(&config).unwrap();
        appender.write_all(b"x").unwrap();
        appender.flush().unwrap();

        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names.len(), 1);
        assert!(names[0].starts_with("sync.log."));
    }
}
