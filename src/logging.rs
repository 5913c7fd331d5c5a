//! File logging for the hooks.
//!
//! Hooks run detached from any terminal the user watches, so everything
//! goes to a daily-rotated file. Logging is best effort: when no log
//! directory is usable the hook still runs, silently.

use crate::config::HookConfig;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const SYSTEM_LOG_DIR: &str = "/var/log/claude_hooks";
const FILE_PREFIX: &str = "hookrelay";

/// Keeps the background writer alive; pending lines are flushed on drop.
pub struct LoggingGuard {
    _guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

/// Candidate directories in priority order.
pub fn candidate_dirs(config: &HookConfig) -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    dirs.extend(config.log_dir.clone());
    dirs.extend(config.settings.log_dir.clone());
    dirs.push(PathBuf::from(SYSTEM_LOG_DIR));
    dirs.push(std::env::temp_dir().join("claude_hooks"));
    dirs
}

fn appender_in(dir: &Path, retention_days: usize) -> Option<RollingFileAppender> {
    fs::create_dir_all(dir).ok()?;
    RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(FILE_PREFIX)
        .filename_suffix("log")
        .max_log_files(retention_days.max(1))
        .build(dir)
        .ok()
}

/// Install the global subscriber writing to the first usable directory.
pub fn init(config: &HookConfig) -> LoggingGuard {
    let retention = config.settings.log_retention_days;
    let Some((dir, appender)) = candidate_dirs(config)
        .into_iter()
        .find_map(|d| appender_in(&d, retention).map(|a| (d, a)))
    else {
        return LoggingGuard { _guard: None };
    };
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.settings.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true);

    if tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .try_init()
        .is_err()
    {
        return LoggingGuard { _guard: None };
    }

    tracing::debug!(log_dir = %dir.display(), "logging initialized");
    LoggingGuard {
        _guard: Some(guard),
    }
}

/// Initialize logging for tests (captured per test).
#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
