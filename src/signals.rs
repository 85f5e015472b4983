use tracing::info;

/// Wait for the next stop signal.
///
/// Resolves on SIGINT or SIGTERM on Unix, ctrl-c elsewhere. Callers decide
/// what a second signal means (main treats it as an immediate exit).
pub async fn wait_for_stop() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("received SIGINT"),
            _ = sigterm.recv() => info!("received SIGTERM"),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("received ctrl-c");
    }
    Ok(())
}
