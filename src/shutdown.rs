use async_trait::async_trait;
use std::process::ExitStatus;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::process::Command;

/// Errors from driving the platform shutdown command.
#[derive(Debug)]
pub enum ShutdownCommandError {
    /// The shutdown binary could not be spawned.
    Spawn { source: std::io::Error },
    /// The shutdown command ran but reported failure (e.g. insufficient
    /// privilege, or a cancel with nothing scheduled).
    CommandFailed { status: ExitStatus },
}

impl std::fmt::Display for ShutdownCommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ShutdownCommandError::Spawn { source } => {
                write!(f, "failed to spawn shutdown command: {source}")
            }
            ShutdownCommandError::CommandFailed { status } => {
                write!(f, "shutdown command failed with {status}")
            }
        }
    }
}

impl std::error::Error for ShutdownCommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ShutdownCommandError::Spawn { source } => Some(source),
            ShutdownCommandError::CommandFailed { .. } => None,
        }
    }
}

/// Interface to the host's pending-shutdown mechanism.
///
/// `is_active` reflects this process's own bookkeeping only: a shutdown
/// scheduled before the process started is invisible to it.
#[async_trait]
pub trait ShutdownController: Send + Sync {
    /// Schedule a system shutdown after `delay`.
    async fn initiate(&self, delay: Duration) -> Result<(), ShutdownCommandError>;

    /// Retract a previously scheduled shutdown.
    async fn cancel(&self) -> Result<(), ShutdownCommandError>;

    /// Whether this controller believes a shutdown is currently scheduled.
    fn is_active(&self) -> bool;
}

const SHUTDOWN_BIN: &str = "shutdown";

/// Arguments to schedule a halt after `delay`.
///
/// Unix `shutdown(8)` takes the delay in whole minutes, so the delay is
/// rounded up; `+0` halts immediately.
#[cfg(unix)]
fn initiate_args(delay: Duration) -> Vec<String> {
    let minutes = delay.as_secs().div_ceil(60);
    vec!["-h".to_string(), format!("+{minutes}")]
}

#[cfg(unix)]
fn cancel_args() -> Vec<String> {
    vec!["-c".to_string()]
}

#[cfg(windows)]
fn initiate_args(delay: Duration) -> Vec<String> {
    vec![
        "/s".to_string(),
        "/t".to_string(),
        delay.as_secs().to_string(),
    ]
}

#[cfg(windows)]
fn cancel_args() -> Vec<String> {
    vec!["/a".to_string()]
}

/// Drives the platform `shutdown` command and tracks whether one is pending.
pub struct SystemShutdown {
    active: AtomicBool,
}

impl SystemShutdown {
    pub fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
        }
    }

    async fn run(args: &[String]) -> Result<(), ShutdownCommandError> {
        let status = Command::new(SHUTDOWN_BIN)
            .args(args)
            .status()
            .await
            .map_err(|e| ShutdownCommandError::Spawn { source: e })?;
        if status.success() {
            Ok(())
        } else {
            Err(ShutdownCommandError::CommandFailed { status })
        }
    }
}

impl Default for SystemShutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ShutdownController for SystemShutdown {
    async fn initiate(&self, delay: Duration) -> Result<(), ShutdownCommandError> {
        Self::run(&initiate_args(delay)).await?;
        self.active.store(true, Ordering::SeqCst);
        Ok(())
    }

    /// The active flag is cleared even when the command fails: it tracks the
    /// watchdog's belief, not confirmed OS state.
    async fn cancel(&self) -> Result<(), ShutdownCommandError> {
        let result = Self::run(&cancel_args()).await;
        self.active.store(false, Ordering::SeqCst);
        result
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn test_initiate_args_rounds_up_to_minutes() {
        assert_eq!(initiate_args(Duration::from_secs(60)), vec!["-h", "+1"]);
        assert_eq!(initiate_args(Duration::from_secs(61)), vec!["-h", "+2"]);
        assert_eq!(initiate_args(Duration::from_secs(90)), vec!["-h", "+2"]);
        assert_eq!(initiate_args(Duration::from_secs(600)), vec!["-h", "+10"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_initiate_args_zero_delay_is_immediate() {
        assert_eq!(initiate_args(Duration::from_secs(0)), vec!["-h", "+0"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_cancel_args() {
        assert_eq!(cancel_args(), vec!["-c"]);
    }

    #[cfg(windows)]
    #[test]
    fn test_initiate_args_keeps_seconds() {
        assert_eq!(
            initiate_args(Duration::from_secs(90)),
            vec!["/s", "/t", "90"]
        );
    }

    #[test]
    fn test_new_controller_is_inactive() {
        let controller = SystemShutdown::new();
        assert!(!controller.is_active());
    }
}
