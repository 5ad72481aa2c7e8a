//! Ctrl-C handling.
//!
//! The first interrupt cancels the run's [`CancellationToken`]: downloads
//! abort and the processor drains whatever results still arrive. A second
//! interrupt is left to the default handler.

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Cancel `token` when the process receives an interrupt.
pub fn install_signal_handlers(token: CancellationToken) {
    tokio::spawn(async move {
        tokio::select! {
            result = wait_for_signal() => match result {
                Ok(()) => {
                    info!("Interrupt received, cancelling outstanding work");
                    token.cancel();
                }
                Err(e) => warn!(error = %e, "Failed to install signal handler"),
            },
            () = token.cancelled() => {}
        }
    });
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result,
        _ = sigterm.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
