//! Process signal handling

use log::info;
use std::io;
use tokio::signal;

/// Resolves once Ctrl+C (or SIGTERM on Unix) is received.
pub async fn shutdown_signal() -> io::Result<()> {
    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = signal::ctrl_c() => {
                result?;
                info!("Received Ctrl+C, initiating graceful shutdown...");
            }
            _ = terminate.recv() => info!("Received SIGTERM, initiating graceful shutdown..."),
        }
    }

    #[cfg(not(unix))]
    {
        signal::ctrl_c().await?;
        info!("Received Ctrl+C, initiating graceful shutdown...");
    }

    Ok(())
}
