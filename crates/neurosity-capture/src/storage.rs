//! # Session Storage
//!
//! Each run writes into its own directory under the output root:
//!
//! ```text
//! <output root>/
//! └── session_20240309-141502/
//!     ├── raw.txt
//!     ├── raw_unfiltered.txt
//!     ├── ...
//!     └── focus.txt
//! ```
//!
//! Metric logs are append-only. Every append opens the file, writes one
//! complete line and closes it again, so a crash between events never
//! damages lines already on disk.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};

use crate::error::{CaptureError, CaptureResult};
use crate::event::CapturedEvent;
use crate::metric::Metric;

/// Directory name prefix for a run.
const SESSION_DIR_PREFIX: &str = "session_";

/// Upper bound on `-N` suffixes tried when runs start within the same second.
const MAX_NAME_ATTEMPTS: u32 = 1000;

/// A freshly created, exclusively owned output directory for one run.
#[derive(Debug, Clone)]
pub struct SessionDirectory {
    path: PathBuf,
}

impl SessionDirectory {
    /// Create `session_YYYYMMDD-HHMMSS` under `root` using the local clock.
    ///
    /// # Errors
    /// Returns an I/O error if the root or the session directory cannot be
    /// created.
    pub fn allocate(root: impl AsRef<Path>) -> CaptureResult<Self> {
        Self::allocate_at(root, Local::now().naive_local())
    }

    /// Create a session directory named after `started`.
    ///
    /// An existing directory is never reused: if the name is taken, `-1`,
    /// `-2`, ... are appended until an unused name is found.
    ///
    /// # Errors
    /// Returns an I/O error if the directory cannot be created.
    pub fn allocate_at(root: impl AsRef<Path>, started: NaiveDateTime) -> CaptureResult<Self> {
        let root = root.as_ref();
        fs::create_dir_all(root)?;

        let base = format!("{SESSION_DIR_PREFIX}{}", started.format("%Y%m%d-%H%M%S"));
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let name = if attempt == 0 {
                base.clone()
            } else {
                format!("{base}-{attempt}")
            };
            let path = root.join(name);
            match fs::create_dir(&path) {
                Ok(()) => {
                    tracing::info!(path = %path.display(), "Session directory created");
                    return Ok(Self { path });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(e.into()),
            }
        }

        Err(CaptureError::Io(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!(
                "no free session directory name for '{base}' under {}",
                root.display()
            ),
        )))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Log file handle for `metric` inside this directory.
    #[must_use]
    pub fn metric_log(&self, metric: Metric) -> MetricLog {
        MetricLog {
            path: self.path.join(metric.file_name()),
        }
    }
}

/// Append-only JSON-lines log for a single metric.
#[derive(Debug, Clone)]
pub struct MetricLog {
    path: PathBuf,
}

impl MetricLog {
    /// Log at an explicit path, for writing outside a [`SessionDirectory`].
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `event` as one line. The file is created on first use and
    /// closed again before returning.
    ///
    /// # Errors
    /// Returns an I/O error if the file cannot be opened or written, or a
    /// JSON error if the payload cannot be serialized.
    pub fn append(&self, event: &CapturedEvent) -> CaptureResult<()> {
        let line = event.to_line()?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// [`append`](Self::append) run on the blocking thread pool, for callers
    /// inside the async runtime.
    ///
    /// # Errors
    /// As [`append`](Self::append); a write that panics is reported as
    /// [`CaptureError::TaskFailed`].
    pub async fn append_blocking(&self, event: CapturedEvent) -> CaptureResult<()> {
        let metric = event.metric;
        let log = self.clone();
        tokio::task::spawn_blocking(move || log.append(&event))
            .await
            .map_err(|e| CaptureError::TaskFailed {
                metric: metric.name().to_string(),
                reason: format!("log write task failed: {e}"),
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn started() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 9)
            .unwrap()
            .and_hms_opt(14, 15, 2)
            .unwrap()
    }

    #[test]
    fn test_allocate_names_directory_after_start_time() {
        let root = tempfile::tempdir().unwrap();
        let dir = SessionDirectory::allocate_at(root.path(), started()).unwrap();

        assert!(dir.path().is_dir());
        assert_eq!(
            dir.path().file_name().unwrap().to_str().unwrap(),
            "session_20240309-141502"
        );
    }

    #[test]
    fn test_allocate_creates_missing_root() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("a").join("b");
        let dir = SessionDirectory::allocate_at(&nested, started()).unwrap();
        assert!(dir.path().starts_with(&nested));
    }

    #[test]
    fn test_allocate_never_reuses_a_directory() {
        let root = tempfile::tempdir().unwrap();
        let first = SessionDirectory::allocate_at(root.path(), started()).unwrap();
        let second = SessionDirectory::allocate_at(root.path(), started()).unwrap();
        let third = SessionDirectory::allocate_at(root.path(), started()).unwrap();

        assert_ne!(first.path(), second.path());
        assert_ne!(second.path(), third.path());
        assert!(second.path().ends_with("session_20240309-141502-1"));
        assert!(third.path().ends_with("session_20240309-141502-2"));
    }

    #[test]
    fn test_metric_log_path() {
        let root = tempfile::tempdir().unwrap();
        let dir = SessionDirectory::allocate_at(root.path(), started()).unwrap();
        let log = dir.metric_log(Metric::PowerByBand);
        assert_eq!(log.path(), dir.path().join("power_by_band.txt"));
    }

    #[test]
    fn test_append_preserves_existing_lines() {
        let root = tempfile::tempdir().unwrap();
        let log = MetricLog::new(root.path().join("calm.txt"));

        log.append(&CapturedEvent::now(Metric::Calm, serde_json::json!({"p": 1})))
            .unwrap();
        log.append(&CapturedEvent::now(Metric::Calm, serde_json::json!({"p": 2})))
            .unwrap();

        let contents = fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        let second: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(first["collected"]["p"], 1);
        assert_eq!(second["collected"]["p"], 2);
    }

    #[test]
    fn test_append_into_missing_directory_fails() {
        let root = tempfile::tempdir().unwrap();
        let log = MetricLog::new(root.path().join("gone").join("raw.txt"));
        let err = log
            .append(&CapturedEvent::now(Metric::Raw, serde_json::json!([])))
            .unwrap_err();
        assert!(matches!(err, CaptureError::Io(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_append_blocking_writes_off_the_runtime() {
        let root = tempfile::tempdir().unwrap();
        let log = MetricLog::new(root.path().join("focus.txt"));

        for p in 0..3 {
            log.append_blocking(CapturedEvent::now(
                Metric::Focus,
                serde_json::json!({"probability": p}),
            ))
            .await
            .unwrap();
        }
        assert_eq!(fs::read_to_string(log.path()).unwrap().lines().count(), 3);

        let missing = MetricLog::new(root.path().join("gone").join("focus.txt"));
        let err = missing
            .append_blocking(CapturedEvent::now(Metric::Focus, serde_json::json!({})))
            .await
            .unwrap_err();
        assert!(matches!(err, CaptureError::Io(_)));
    }
}
