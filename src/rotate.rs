//! Compression of stale log files.
//!
//! A log whose age exceeds the retention window is compressed with zstd into
//! `original + rotated_suffix` and the original is removed. The compressed bytes are first
//! written to a hidden temp file beside the log and renamed into place only once complete, so
//! a failed rotation leaves the original untouched and no partial artifact behind.

use crate::cancel::CancellationToken;
use crate::config::Config;
use crate::error::{Result, ZsiftError};
use crate::walker::TreeWalk;
use async_compression::tokio::write::ZstdEncoder;
use async_compression::Level;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufReader, BufWriter};

/// Rotation state of a log file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogState {
    /// Within the retention window; left alone
    Fresh,
    /// Older than the retention window; rotated
    Stale,
}

/// A log file considered for rotation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFile {
    pub path: PathBuf,
    pub modified: SystemTime,
    /// Time since last modification; zero for timestamps in the future
    pub age: Duration,
}

impl LogFile {
    pub fn new(path: PathBuf, modified: SystemTime, now: SystemTime) -> Self {
        let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
        Self {
            path,
            modified,
            age,
        }
    }

    /// Stale only when strictly older than the window
    pub fn state(&self, retention: Duration) -> LogState {
        if self.age > retention {
            LogState::Stale
        } else {
            LogState::Fresh
        }
    }
}

/// Counters for one rotation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RotationSummary {
    /// Files carrying the log suffix
    pub examined: usize,
    pub rotated: usize,
    pub fresh: usize,
    pub failed: usize,
    pub cancelled: bool,
}

/// Finds and compresses stale logs under a root
#[derive(Debug, Clone)]
pub struct LogRotator {
    retention: Duration,
    log_suffix: String,
    rotated_suffix: String,
    level: Level,
    sort_entries: bool,
    cancel: CancellationToken,
}

impl LogRotator {
    pub fn new(config: &Config, cancel: CancellationToken) -> Self {
        Self {
            retention: config.retention,
            log_suffix: config.log_suffix.clone(),
            rotated_suffix: config.rotated_suffix.clone(),
            level: config.zstd_level.map_or(Level::Default, Level::Precise),
            sort_entries: config.sort_entries,
            cancel,
        }
    }

    /// Path of the compressed replacement for `log`
    pub fn rotated_path(&self, log: &Path) -> PathBuf {
        let mut name = OsString::from(log.as_os_str());
        name.push(&self.rotated_suffix);
        PathBuf::from(name)
    }

    fn is_log(&self, path: &Path) -> bool {
        path.file_name()
            .map(|name| name.to_string_lossy().ends_with(self.log_suffix.as_str()))
            .unwrap_or(false)
    }

    /// Rotate every stale log under `root`
    pub async fn rotate_all(&self, root: &Path) -> Result<RotationSummary> {
        let mut walk = TreeWalk::new(root, self.sort_entries).await?;
        let mut summary = RotationSummary::default();
        let now = SystemTime::now();

        while let Some(entry) = walk.next_entry().await {
            if self.cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    log::warn!("{}", e);
                    continue;
                }
            };

            if !self.is_log(&entry.path) {
                continue;
            }
            summary.examined += 1;

            let modified = match entry.metadata.modified() {
                Ok(modified) => modified,
                Err(e) => {
                    log::warn!(
                        "cannot read modification time of {}: {}",
                        entry.path.display(),
                        e
                    );
                    summary.failed += 1;
                    continue;
                }
            };

            let log_file = LogFile::new(entry.path, modified, now);
            if log_file.state(self.retention) == LogState::Fresh {
                summary.fresh += 1;
                continue;
            }

            log::info!(
                "compressing and deleting old log file: {}",
                log_file.path.display()
            );
            match self.rotate_file(&log_file.path).await {
                Ok(_) => summary.rotated += 1,
                Err(e) => {
                    log::warn!("{}", e);
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Compress one log and remove the original, returning the compressed path
    pub async fn rotate_file(&self, log: &Path) -> Result<PathBuf> {
        let target = self.rotated_path(log);
        let dir = match log.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let input = File::open(log)
            .await
            .map_err(|e| ZsiftError::rotation(log, "cannot open log", e))?;

        let staging = tempfile::Builder::new()
            .prefix(".zsift-rotate-")
            .suffix(".partial")
            .tempfile_in(&dir)
            .map_err(|e| ZsiftError::rotation(log, "cannot create compressed output", e))?;
        let handle = staging
            .as_file()
            .try_clone()
            .map_err(|e| ZsiftError::rotation(log, "cannot open compressed output", e))?;

        let mut encoder =
            ZstdEncoder::with_quality(BufWriter::new(File::from_std(handle)), self.level);
        tokio::io::copy(&mut BufReader::new(input), &mut encoder)
            .await
            .map_err(|e| ZsiftError::rotation(log, "compression failed", e))?;
        // Finishes the zstd frame and flushes the buffered writer
        encoder
            .shutdown()
            .await
            .map_err(|e| ZsiftError::rotation(log, "compression failed", e))?;
        encoder
            .into_inner()
            .into_inner()
            .sync_all()
            .await
            .map_err(|e| ZsiftError::rotation(log, "cannot sync compressed output", e))?;

        // Until this rename succeeds, dropping `staging` removes the partial output
        staging.persist(&target).map_err(|e| {
            ZsiftError::rotation(log, "cannot move compressed output into place", e.error)
        })?;

        tokio::fs::remove_file(log).await.map_err(|e| {
            ZsiftError::rotation(log, "compressed copy written but original not removed", e)
        })?;

        Ok(target)
    }
}
