//! Logging setup
//!
//! Installs a global `tracing` subscriber with local-time timestamps, on
//! stderr or in a timestamped file.

use std::fs::File;
use std::path::{Path, PathBuf};

use time::{format_description::parse, OffsetDateTime, UtcOffset};
use tracing::{subscriber::set_global_default, Level};
use tracing_subscriber::fmt::{time::OffsetTime, writer::BoxMakeWriter};
use tracing_subscriber::FmtSubscriber;

use crate::error::{ArenaError, Result};

const TIME_FORMAT: &str = "[year]-[month]-[day] [hour]:[minute]:[second]";

fn install(level: Level, writer: BoxMakeWriter) -> Result<()> {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    let format = parse(TIME_FORMAT).map_err(|e| ArenaError::Logger(e.to_string()))?;
    let timer = OffsetTime::new(offset, format);

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_ansi(false)
        .with_timer(timer)
        .with_writer(writer)
        .finish();

    set_global_default(subscriber).map_err(|_| {
        ArenaError::Logger(
            "a global tracing subscriber is already set; skip init_logger if you install your own"
                .into(),
        )
    })
}

/// Log to stderr at `level` and above, with local timestamps.
pub fn init_logger(level: Level) -> Result<()> {
    install(level, BoxMakeWriter::new(std::io::stderr))
}

/// Log to a new timestamped file in `dir` and return its path.
pub fn init_file_logger(level: Level, dir: impl AsRef<Path>) -> Result<PathBuf> {
    let path = dir.as_ref().join(log_file_name()?);
    let file = File::create(&path)?;
    install(level, BoxMakeWriter::new(file))?;
    Ok(path)
}

fn log_file_name() -> Result<String> {
    let format = parse("[year]-[month]-[day]_[hour]-[minute]-[second]_arena.log")
        .map_err(|e| ArenaError::Logger(e.to_string()))?;
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    now.format(&format)
        .map_err(|e| ArenaError::Logger(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_file_name() {
        let name = log_file_name().unwrap();
        assert!(name.ends_with("_arena.log"));
        assert!(!name.contains(':'));
    }

    #[test]
    fn test_file_logger_then_second_install_fails() {
        // one global subscriber per process: both installs share this test
        let dir = tempfile::tempdir().unwrap();
        let installed = init_file_logger(Level::WARN, dir.path());

        let log_file = std::fs::read_dir(dir.path())
            .unwrap()
            .next()
            .unwrap()
            .unwrap()
            .path();
        assert!(log_file.to_string_lossy().ends_with("_arena.log"));
        if let Ok(path) = installed {
            assert_eq!(path, log_file);
            tracing::warn!("file logger installed");
            let text = std::fs::read_to_string(&path).unwrap();
            assert!(text.contains("file logger installed"));
        }

        assert!(matches!(init_logger(Level::WARN), Err(ArenaError::Logger(_))));
    }
}
