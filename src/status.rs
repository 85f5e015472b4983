/// Status file: writes `linkwatch.status` as JSON on every state transition.
///
/// Uses atomic write pattern: write to temp file then rename.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Watchdog states written to the status file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStateKind {
    Idle,
    Failing,
    ShuttingDown,
}

impl std::fmt::Display for LinkStateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LinkStateKind::Idle => "idle",
            LinkStateKind::Failing => "failing",
            LinkStateKind::ShuttingDown => "shutting_down",
        };
        f.write_str(name)
    }
}

/// The JSON payload written to `linkwatch.status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchStatus {
    pub pid: u32,
    pub state: LinkStateKind,
    pub target: String,
    /// Wall-clock time of the first failure in the current episode, if any.
    pub failing_since: Option<DateTime<Utc>>,
    /// Whether a shutdown command is believed to be scheduled.
    pub shutdown_active: bool,
    pub last_update: DateTime<Utc>,
}

/// Errors from reading or writing the status file.
#[derive(Debug)]
pub enum StatusError {
    Serialize {
        source: serde_json::Error,
    },
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    Rename {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl std::fmt::Display for StatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusError::Serialize { source } => {
                write!(f, "failed to serialize status: {source}")
            }
            StatusError::Write { path, source } => {
                write!(f, "failed to write {}: {}", path.display(), source)
            }
            StatusError::Rename { from, to, source } => {
                write!(
                    f,
                    "failed to rename {} to {}: {}",
                    from.display(),
                    to.display(),
                    source
                )
            }
            StatusError::Read { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            StatusError::Parse { path, source } => {
                write!(f, "failed to parse {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for StatusError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StatusError::Serialize { source } => Some(source),
            StatusError::Write { source, .. } => Some(source),
            StatusError::Rename { source, .. } => Some(source),
            StatusError::Read { source, .. } => Some(source),
            StatusError::Parse { source, .. } => Some(source),
        }
    }
}

/// Manages the status file lifecycle.
pub struct StatusFile {
    path: PathBuf,
}

impl StatusFile {
    /// Create a new StatusFile writer for the given path.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Atomically write status data to the status file.
    ///
    /// Writes to a temporary file in the same directory, then renames
    /// to ensure readers never see a partial write.
    pub fn write(&self, data: &WatchStatus) -> Result<(), StatusError> {
        let json =
            serde_json::to_string_pretty(data).map_err(|e| StatusError::Serialize { source: e })?;

        let dir = self.path.parent().unwrap_or(Path::new("."));
        let tmp_path = dir.join(format!(".linkwatch.status.tmp.{}", std::process::id()));

        std::fs::write(&tmp_path, json.as_bytes()).map_err(|e| StatusError::Write {
            path: tmp_path.clone(),
            source: e,
        })?;

        std::fs::rename(&tmp_path, &self.path).map_err(|e| StatusError::Rename {
            from: tmp_path,
            to: self.path.clone(),
            source: e,
        })?;

        Ok(())
    }

    /// Read and parse a status file (for `--status`).
    pub fn read(path: &Path) -> Result<WatchStatus, StatusError> {
        let contents = std::fs::read_to_string(path).map_err(|e| StatusError::Read {
            path: path.to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&contents).map_err(|e| StatusError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Remove the status file (on clean shutdown).
    pub fn remove(&self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(state: LinkStateKind) -> WatchStatus {
        WatchStatus {
            pid: std::process::id(),
            state,
            target: "10.7.1.1".to_string(),
            failing_since: None,
            shutdown_active: false,
            last_update: Utc::now(),
        }
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("linkwatch.status");
        let file = StatusFile::new(path.clone());

        file.write(&sample(LinkStateKind::Failing)).unwrap();

        let status = StatusFile::read(&path).unwrap();
        assert_eq!(status.state, LinkStateKind::Failing);
        assert_eq!(status.target, "10.7.1.1");
        assert_eq!(status.pid, std::process::id());
    }

    #[test]
    fn test_write_replaces_previous_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("linkwatch.status");
        let file = StatusFile::new(path.clone());

        file.write(&sample(LinkStateKind::Idle)).unwrap();
        file.write(&sample(LinkStateKind::ShuttingDown)).unwrap();

        let status = StatusFile::read(&path).unwrap();
        assert_eq!(status.state, LinkStateKind::ShuttingDown);
    }

    #[test]
    fn test_write_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("linkwatch.status");
        let file = StatusFile::new(path);

        file.write(&sample(LinkStateKind::Idle)).unwrap();

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains("tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_read_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = StatusFile::read(&dir.path().join("absent")).unwrap_err();
        assert!(matches!(err, StatusError::Read { .. }));
    }

    #[test]
    fn test_read_garbage_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("linkwatch.status");
        std::fs::write(&path, "not json").unwrap();
        let err = StatusFile::read(&path).unwrap_err();
        assert!(matches!(err, StatusError::Parse { .. }));
    }

    #[test]
    fn test_remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("linkwatch.status");
        let file = StatusFile::new(path.clone());

        file.write(&sample(LinkStateKind::Idle)).unwrap();
        file.remove();
        assert!(!path.exists());
        file.remove();
    }

    #[test]
    fn test_state_kind_serializes_snake_case() {
        let json = serde_json::to_string(&LinkStateKind::ShuttingDown).unwrap();
        assert_eq!(json, "\"shutting_down\"");
    }
}
