//! OS signal handling.
//!
//! SIGINT and SIGTERM trigger graceful shutdown.

use crate::lifecycle::Shutdown;

/// Resolve on the first SIGINT (or SIGTERM on unix).
pub async fn wait_for_signal() -> &'static str {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => tokio::select! {
                _ = tokio::signal::ctrl_c() => "SIGINT",
                _ = terminate.recv() => "SIGTERM",
            },
            Err(err) => {
                tracing::warn!(error = %err, "SIGTERM handler unavailable");
                ctrl_c().await
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c().await
    }
}

async fn ctrl_c() -> &'static str {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "SIGINT handler unavailable");
        std::future::pending::<()>().await;
    }
    "SIGINT"
}

/// Spawn a task that triggers `shutdown` when a signal arrives.
pub fn spawn_signal_listener(shutdown: Shutdown) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let signal = wait_for_signal().await;
        tracing::info!(signal, "received signal");
        shutdown.trigger();
    })
}
