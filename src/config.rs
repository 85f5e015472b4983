use crate::settings::Snapshot;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration loaded from linkwatch.toml.
#[derive(Debug, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct ServiceConfig {
    pub watch: WatchConfig,
    pub probe: ProbeConfig,
    pub storage: StorageConfig,
}

/// Defaults for the hot-reloadable snapshot plus the settings file location.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Hot-reloaded `key=value` settings file, re-read every tick.
    pub settings_file: PathBuf,
    /// Probe destination used when the settings file does not override it.
    pub target: String,
    /// Seconds of continuous failure before a shutdown is scheduled.
    pub timeout_secs: u64,
    /// Delay between polls, in milliseconds.
    pub poll_interval_ms: u64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// Upper bound for a single probe, in milliseconds.
    pub timeout_ms: u64,
    /// Port probed when the target does not name one.
    pub default_port: u16,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for runtime artifacts (status file, instance lock).
    pub data_dir: PathBuf,
}

// --- Default implementations ---

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            settings_file: PathBuf::from("settings.txt"),
            target: "10.7.1.1".to_string(),
            timeout_secs: 60,
            poll_interval_ms: 1000,
        }
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 1000,
            default_port: 53,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".linkwatch"),
        }
    }
}

impl ServiceConfig {
    /// The default snapshot handed to the settings store; the settings file
    /// overlays it every tick.
    pub fn default_snapshot(&self) -> Snapshot {
        Snapshot {
            target: self.watch.target.clone(),
            failure_timeout: Duration::from_secs(self.watch.timeout_secs),
            poll_interval: Duration::from_millis(self.watch.poll_interval_ms),
        }
    }

    /// Upper bound for a single probe.
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe.timeout_ms)
    }

    /// Apply CLI overrides on top of the file values.
    pub fn apply_overrides(
        &mut self,
        target: Option<&str>,
        timeout_secs: Option<u64>,
        poll_interval_ms: Option<u64>,
    ) {
        if let Some(target) = target {
            self.watch.target = target.to_string();
        }
        if let Some(secs) = timeout_secs {
            self.watch.timeout_secs = secs;
        }
        if let Some(ms) = poll_interval_ms {
            self.watch.poll_interval_ms = ms;
        }
    }

    /// Reject values the watchdog cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.watch.target.trim().is_empty() {
            return Err("watch.target must not be empty".to_string());
        }
        if self.watch.poll_interval_ms == 0 {
            return Err("watch.poll_interval_ms must be greater than zero".to_string());
        }
        if self.probe.timeout_ms == 0 {
            return Err("probe.timeout_ms must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// Errors loading the service configuration at startup.
#[derive(Debug)]
pub enum ConfigError {
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read { path, source } => {
                write!(f, "failed to read config {}: {}", path.display(), source)
            }
            ConfigError::Parse { path, source } => {
                write!(f, "failed to parse config {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Read { source, .. } => Some(source),
            ConfigError::Parse { source, .. } => Some(source),
        }
    }
}

/// Load config from the given path, or defaults when the file is absent.
///
/// A present-but-broken config is a startup error, not a silent fallback.
pub fn load_config(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Ok(ServiceConfig::default());
        }
        Err(e) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };
    toml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}
