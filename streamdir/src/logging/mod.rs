//! Console and rolling-file logging.
//!
//! - `EnvFilter` from `RUST_LOG`, falling back to [`DEFAULT_LOG_FILTER`]
//! - daily-rotated files under the log directory, written off-thread
//! - local-timezone timestamps on both outputs
//! - a daily task that deletes files older than [`LOG_RETENTION_DAYS`]

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{Local, NaiveDate, Utc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::Writer, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::utils::fs;

pub const DEFAULT_LOG_FILTER: &str = "streamdir=info,platforms_api=info,tower_http=info";

/// Log files older than this are deleted.
pub const LOG_RETENTION_DAYS: i64 = 7;

const LOG_FILE_PREFIX: &str = "streamdir.log";

/// Timestamps in the server's local timezone.
#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

/// Keeps the file writer alive; drop it last so buffered lines are flushed.
pub struct LoggingHandle {
    _guard: WorkerGuard,
    log_dir: PathBuf,
}

impl LoggingHandle {
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }

    /// Spawn the daily retention cleanup.
    pub fn start_retention_cleanup(&self, cancel: CancellationToken) {
        let log_dir = self.log_dir.clone();
        tokio::spawn(async move {
            let interval = Duration::from_secs(24 * 60 * 60);
            loop {
                if let Err(e) = cleanup_old_logs(&log_dir, LOG_RETENTION_DAYS).await {
                    warn!(error = %e, "Failed to clean up old logs");
                }
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Log retention task shutting down");
                        break;
                    }
                    _ = tokio::time::sleep(interval) => {}
                }
            }
        });
    }
}

/// Install the global subscriber.
pub fn init_logging(log_dir: impl Into<PathBuf>) -> crate::Result<LoggingHandle> {
    let log_dir = log_dir.into();
    fs::ensure_dir_all_sync(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_ansi(true).with_timer(LocalTimer))
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_timer(LocalTimer),
        )
        .try_init()
        .map_err(|e| crate::Error::Other(format!("Failed to set global subscriber: {e}")))?;

    Ok(LoggingHandle {
        _guard: guard,
        log_dir,
    })
}

/// Delete `streamdir.log.YYYY-MM-DD` files dated before the cutoff.
async fn cleanup_old_logs(log_dir: &Path, retention_days: i64) -> std::io::Result<usize> {
    let cutoff = Utc::now().date_naive() - chrono::Duration::days(retention_days);

    let mut entries = tokio::fs::read_dir(log_dir).await?;
    let mut deleted = 0;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(date) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(log_file_date)
        else {
            continue;
        };

        if date < cutoff {
            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    deleted += 1;
                    debug!(path = %path.display(), "Deleted old log file");
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to delete old log file"),
            }
        }
    }

    if deleted > 0 {
        info!(count = deleted, "Cleaned up old log files");
    }
    Ok(deleted)
}

fn log_file_date(file_name: &str) -> Option<NaiveDate> {
    let date = file_name.strip_prefix(LOG_FILE_PREFIX)?.strip_prefix('.')?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_default_filter() {
        assert!(DEFAULT_LOG_FILTER.contains("streamdir=info"));
        assert!(DEFAULT_LOG_FILTER.contains("platforms_api=info"));
    }

    #[test]
    fn test_log_file_date() {
        assert_eq!(
            log_file_date("streamdir.log.2024-05-01"),
            NaiveDate::from_ymd_opt(2024, 5, 1)
        );
        assert_eq!(log_file_date("streamdir.log"), None);
        assert_eq!(log_file_date("other.log.2024-05-01"), None);
    }

    #[tokio::test]
    async fn test_cleanup_keeps_recent_files() {
        let temp = TempDir::new().unwrap();
        let today = Utc::now().date_naive();
        let old = today - chrono::Duration::days(30);

        let recent = temp.path().join(format!("streamdir.log.{}", today.format("%Y-%m-%d")));
        let stale = temp.path().join(format!("streamdir.log.{}", old.format("%Y-%m-%d")));
        let unrelated = temp.path().join("notes.txt");
        for path in [&recent, &stale, &unrelated] {
            std::fs::write(path, "x").unwrap();
        }

        let deleted = cleanup_old_logs(temp.path(), LOG_RETENTION_DAYS).await.unwrap();
        assert_eq!(deleted, 1);
        assert!(recent.exists());
        assert!(!stale.exists());
        assert!(unrelated.exists());
    }
}
