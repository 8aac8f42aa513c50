use anyhow::Result;

/// Resolves on the first SIGTERM or SIGINT (Ctrl-C elsewhere).
pub async fn wait_for_shutdown() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;
        tokio::select! {
            _ = sigterm.recv() => tracing::info!(signal = "SIGTERM", "shutdown requested"),
            _ = sigint.recv() => tracing::info!(signal = "SIGINT", "shutdown requested"),
        }
        Ok(())
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        tracing::info!(signal = "ctrl_c", "shutdown requested");
        Ok(())
    }
}
