use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Error reading the settings file. The previous snapshot stays in effect.
#[derive(Debug)]
pub enum SettingsError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsError::Read { path, source } => {
                write!(
                    f,
                    "failed to read settings file {}: {}",
                    path.display(),
                    source
                )
            }
        }
    }
}

impl std::error::Error for SettingsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SettingsError::Read { source, .. } => Some(source),
        }
    }
}

/// One fully-formed configuration snapshot, as observed by a single tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Probe destination, `host` or `host:port`.
    pub target: String,
    /// How long connectivity must stay down before a shutdown is scheduled.
    pub failure_timeout: Duration,
    /// Delay between polls.
    pub poll_interval: Duration,
}

/// Re-reads the `key=value` settings file and hands out whole snapshots.
///
/// Keys are case-insensitive; recognized keys are `IPAddress`, `Timeout`
/// (seconds) and `PollIntervalMs`. Malformed lines and unknown keys are
/// ignored. Each reload starts from the configured defaults, so a deleted
/// key reverts instead of lingering. A failed read keeps the previous
/// snapshot untouched.
pub struct SettingsStore {
    path: PathBuf,
    defaults: Snapshot,
    current: Snapshot,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>, defaults: Snapshot) -> Self {
        let current = defaults.clone();
        Self {
            path: path.into(),
            defaults,
            current,
        }
    }

    /// The snapshot from the most recent successful reload.
    pub fn current(&self) -> &Snapshot {
        &self.current
    }

    /// Re-read the settings file, replacing the current snapshot on success.
    pub fn reload(&mut self) -> Result<(), SettingsError> {
        let contents =
            std::fs::read_to_string(&self.path).map_err(|e| SettingsError::Read {
                path: self.path.clone(),
                source: e,
            })?;
        self.current = parse_settings(&contents, &self.defaults);
        Ok(())
    }
}

/// Overlay `key=value` lines onto the default snapshot.
fn parse_settings(contents: &str, defaults: &Snapshot) -> Snapshot {
    let mut snapshot = defaults.clone();
    for line in contents.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            debug!(line, "ignoring settings line without '='");
            continue;
        };
        let value = value.trim();
        match key.trim().to_ascii_lowercase().as_str() {
            "ipaddress" if !value.is_empty() => snapshot.target = value.to_string(),
            "timeout" => match value.parse::<u64>() {
                Ok(secs) => snapshot.failure_timeout = Duration::from_secs(secs),
                Err(_) => debug!(line, "ignoring malformed Timeout value"),
            },
            "pollintervalms" => match value.parse::<u64>() {
                Ok(ms) if ms > 0 => snapshot.poll_interval = Duration::from_millis(ms),
                _ => debug!(line, "ignoring malformed PollIntervalMs value"),
            },
            _ => debug!(line, "ignoring unrecognized settings key"),
        }
    }
    snapshot
}
