use std::env;
use std::ffi::OsString;
use std::path::PathBuf;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const DEFAULT_LEVEL: &str = "info";
const DEFAULT_LOG_FILE: &str = "./logs/ihc.log";

/// Log level and file location, from `TRACING_LEVEL` and `LOG_FILE_PATH`.
#[derive(Debug, PartialEq)]
struct LogSettings {
    level: String,
    directory: PathBuf,
    file_name: OsString,
}

impl LogSettings {
    fn from_env() -> Self {
        Self::from_values(env::var("TRACING_LEVEL").ok(), env::var("LOG_FILE_PATH").ok())
    }

    fn from_values(level: Option<String>, log_file: Option<String>) -> Self {
        let level = level
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LEVEL.to_string());
        let path = PathBuf::from(
            log_file
                .filter(|p| !p.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_LOG_FILE.to_string()),
        );

        let file_name = path
            .file_name()
            .map(OsString::from)
            .unwrap_or_else(|| OsString::from("ihc.log"));
        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        Self {
            level,
            directory,
            file_name,
        }
    }

    fn file_path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }
}

/// Install a compact stdout layer and a plain-text file layer. Keep the
/// returned guard alive until exit so buffered file output is flushed.
pub fn init_logger() -> WorkerGuard {
    let settings = LogSettings::from_env();
    let filter =
        EnvFilter::try_new(&settings.level).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL));

    let appender = tracing_appender::rolling::never(&settings.directory, &settings.file_name);
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stdout)
                .compact()
                .with_target(false),
        )
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .init();

    info!(
        "Logging at '{}' to stdout and {}",
        settings.level,
        settings.file_path().display()
    );

    guard
}
