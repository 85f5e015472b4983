use fs2::FileExt;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Manages the `.linkwatch/` directory layout.
///
/// Runtime artifacts (status file, instance lock) live under a single data
/// directory so a service install stays self-contained.
#[derive(Debug, Clone)]
pub struct DataDir {
    root: PathBuf,
}

impl DataDir {
    /// Create a new DataDir referencing the given root path.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory (e.g. `.linkwatch/`).
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path to the watchdog status file.
    pub fn status(&self) -> PathBuf {
        self.root.join("linkwatch.status")
    }

    /// Path to the singleton lock file.
    pub fn lock(&self) -> PathBuf {
        self.root.join("lock")
    }

    /// Create the directory tree if missing.
    pub fn ensure(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.root)
    }

    /// Take the single-instance lock, held for the life of the returned
    /// guard. A second instance fails fast instead of double-driving the
    /// host's shutdown state.
    pub fn acquire_lock(&self) -> Result<InstanceLock, LockError> {
        let path = self.lock();
        let file = File::create(&path).map_err(|e| LockError::Open {
            path: path.clone(),
            source: e,
        })?;
        file.try_lock_exclusive()
            .map_err(|e| LockError::Held { path, source: e })?;
        Ok(InstanceLock { _file: file })
    }
}

/// Holds the exclusive lock file open; dropping it releases the lock.
#[derive(Debug)]
pub struct InstanceLock {
    _file: File,
}

/// Errors acquiring the single-instance lock.
#[derive(Debug)]
pub enum LockError {
    Open {
        path: PathBuf,
        source: std::io::Error,
    },
    Held {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl std::fmt::Display for LockError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LockError::Open { path, source } => {
                write!(
                    f,
                    "failed to open lock file {}: {}",
                    path.display(),
                    source
                )
            }
            LockError::Held { path, source } => {
                write!(
                    f,
                    "another linkwatch instance holds {}: {}",
                    path.display(),
                    source
                )
            }
        }
    }
}

impl std::error::Error for LockError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LockError::Open { source, .. } => Some(source),
            LockError::Held { source, .. } => Some(source),
        }
    }
}
