use crate::probe::Prober;
use crate::settings::{SettingsStore, Snapshot};
use crate::shutdown::ShutdownController;
use crate::status::{LinkStateKind, StatusFile, WatchStatus};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::select;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Connectivity state tracked across ticks.
///
/// `since` is the instant of the first failed probe of the current episode;
/// it is never reset while probes keep failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Connectivity is up; no failure episode in progress.
    Idle,
    /// Probes have been failing since `since`; no shutdown scheduled yet.
    Failing { since: Instant },
    /// A shutdown command was issued for the episode that began at `since`.
    ShuttingDown { since: Instant },
}

impl LinkState {
    fn kind(self) -> LinkStateKind {
        match self {
            LinkState::Idle => LinkStateKind::Idle,
            LinkState::Failing { .. } => LinkStateKind::Failing,
            LinkState::ShuttingDown { .. } => LinkStateKind::ShuttingDown,
        }
    }
}

/// How long `stop` waits for the loop to wind down before aborting it.
const STOP_GRACE: Duration = Duration::from_secs(5);

/// The polling loop: probe the target, track how long connectivity has been
/// down, and drive the shutdown controller.
pub struct Watchdog {
    prober: Arc<dyn Prober>,
    controller: Arc<dyn ShutdownController>,
    settings: SettingsStore,
    probe_timeout: Duration,
    status: Option<StatusFile>,
}

impl Watchdog {
    pub fn new(
        prober: Arc<dyn Prober>,
        controller: Arc<dyn ShutdownController>,
        settings: SettingsStore,
        probe_timeout: Duration,
        status: Option<StatusFile>,
    ) -> Self {
        Self {
            prober,
            controller,
            settings,
            probe_timeout,
            status,
        }
    }

    /// Evaluate one poll tick: run the probe and apply the state transition.
    ///
    /// Every probe error, including an elapsed timeout, counts as a failed
    /// probe; the tick never propagates an error or panics the loop.
    pub async fn tick(&self, state: LinkState, snapshot: &Snapshot, now: Instant) -> LinkState {
        let up = match tokio::time::timeout(
            self.probe_timeout,
            self.prober.probe(&snapshot.target),
        )
        .await
        {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                warn!(probe_target = %snapshot.target, error = %e, "probe failed");
                false
            }
            Err(_) => {
                warn!(
                    probe_target = %snapshot.target,
                    timeout_ms = self.probe_timeout.as_millis() as u64,
                    "probe timed out"
                );
                false
            }
        };

        if up {
            self.on_success(state).await
        } else {
            self.on_failure(state, snapshot, now).await
        }
    }

    async fn on_success(&self, state: LinkState) -> LinkState {
        match state {
            LinkState::Idle => LinkState::Idle,
            LinkState::Failing { since } => {
                info!(
                    down_for_secs = since.elapsed().as_secs(),
                    "connection restored"
                );
                LinkState::Idle
            }
            LinkState::ShuttingDown { .. } => {
                // Cancellation is best-effort: local state returns to Idle
                // even if the cancel command failed.
                match self.controller.cancel().await {
                    Ok(()) => info!("connection restored, shutdown cancelled"),
                    Err(e) => error!(error = %e, "shutdown cancel failed"),
                }
                LinkState::Idle
            }
        }
    }

    async fn on_failure(&self, state: LinkState, snapshot: &Snapshot, now: Instant) -> LinkState {
        match state {
            LinkState::Idle => {
                warn!(probe_target = %snapshot.target, "connection failure detected");
                LinkState::Failing { since: now }
            }
            LinkState::Failing { since } => {
                let elapsed = now.saturating_duration_since(since);
                if elapsed < snapshot.failure_timeout {
                    return LinkState::Failing { since };
                }
                match self.controller.initiate(snapshot.failure_timeout).await {
                    Ok(()) => {
                        warn!(
                            down_for_secs = elapsed.as_secs(),
                            delay_secs = snapshot.failure_timeout.as_secs(),
                            "connection lost, shutdown initiated"
                        );
                        LinkState::ShuttingDown { since }
                    }
                    Err(e) => {
                        // Stay Failing so the next tick retries initiation.
                        error!(error = %e, "shutdown initiate failed");
                        LinkState::Failing { since }
                    }
                }
            }
            // At most one initiate per failure episode.
            LinkState::ShuttingDown { since } => LinkState::ShuttingDown { since },
        }
    }

    /// Spawn the polling loop onto the runtime and return its handle.
    pub fn spawn(self) -> WatchdogHandle {
        let (stop_tx, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(self.run(stop_rx));
        WatchdogHandle {
            stop_tx: Some(stop_tx),
            handle,
        }
    }

    async fn run(mut self, mut stop_rx: oneshot::Receiver<()>) {
        let mut state = LinkState::Idle;
        info!(
            probe_target = %self.settings.current().target,
            timeout_secs = self.settings.current().failure_timeout.as_secs(),
            poll_interval_ms = self.settings.current().poll_interval.as_millis() as u64,
            "watchdog started"
        );
        self.publish(state);

        loop {
            if let Err(e) = self.settings.reload() {
                warn!(error = %e, "settings reload failed, keeping previous snapshot");
            }
            let snapshot = self.settings.current().clone();

            let next = self.tick(state, &snapshot, Instant::now()).await;
            if next.kind() != state.kind() {
                self.publish(next);
            }
            state = next;

            select! {
                _ = tokio::time::sleep(snapshot.poll_interval) => {}
                _ = &mut stop_rx => break,
            }
        }

        if let LinkState::ShuttingDown { .. } = state {
            // One best-effort cancel before exiting.
            match self.controller.cancel().await {
                Ok(()) => info!("pending shutdown cancelled on stop"),
                Err(e) => error!(error = %e, "shutdown cancel on stop failed"),
            }
        }
        if let Some(status) = &self.status {
            status.remove();
        }
        info!("watchdog stopped");
    }

    fn publish(&self, state: LinkState) {
        let Some(status) = &self.status else {
            return;
        };
        let failing_since = match state {
            LinkState::Idle => None,
            LinkState::Failing { since } | LinkState::ShuttingDown { since } => {
                chrono::Duration::from_std(since.elapsed())
                    .ok()
                    .map(|d| Utc::now() - d)
            }
        };
        let data = WatchStatus {
            pid: std::process::id(),
            state: state.kind(),
            target: self.settings.current().target.clone(),
            failing_since,
            shutdown_active: self.controller.is_active(),
            last_update: Utc::now(),
        };
        if let Err(e) = status.write(&data) {
            warn!(error = %e, "failed to write status file");
        }
    }
}

/// Owns the background loop; `stop` is the bounded shutdown path.
pub struct WatchdogHandle {
    stop_tx: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl WatchdogHandle {
    /// Signal the loop to stop and wait for it, aborting after `STOP_GRACE`.
    pub async fn stop(mut self) {
        if let Some(tx) = self.stop_tx.take() {
            let _ = tx.send(());
        }
        if tokio::time::timeout(STOP_GRACE, &mut self.handle)
            .await
            .is_err()
        {
            warn!("watchdog did not stop within grace period, aborting");
            self.handle.abort();
        }
    }
}
