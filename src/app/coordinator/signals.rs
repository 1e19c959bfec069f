//! Signal handling for graceful shutdown
//!
//! CTRL-C (and SIGTERM on unix) cancels the run token. Workers stop taking new
//! partitions, in-flight ones race the token, and anything already on disk stays
//! resumable.

use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Cancels a run token when the process is interrupted
pub struct SignalHandler {
    cancel: CancellationToken,
}

impl SignalHandler {
    pub fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    /// Spawn the background task that watches for signals
    ///
    /// The task also exits quietly when the token is cancelled for any other
    /// reason, so it never outlives the run.
    pub fn setup(&self) -> JoinHandle<()> {
        let cancel = self.cancel.clone();

        tokio::spawn(async move {
            let ctrl_c = async {
                if let Err(e) = signal::ctrl_c().await {
                    warn!("Failed to listen for Ctrl+C: {}", e);
                    std::future::pending::<()>().await;
                }
            };

            #[cfg(unix)]
            let terminate = async {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut stream) => {
                        stream.recv().await;
                    }
                    Err(e) => {
                        warn!("Failed to install SIGTERM handler: {}", e);
                        std::future::pending::<()>().await;
                    }
                }
            };

            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();

            tokio::select! {
                _ = ctrl_c => {
                    info!("Received Ctrl+C, cancelling outstanding partitions");
                },
                _ = terminate => {
                    info!("Received terminate signal, cancelling outstanding partitions");
                },
                _ = cancel.cancelled() => return,
            }

            cancel.cancel();
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_handler_exits_when_run_is_cancelled() {
        let cancel = CancellationToken::new();
        let handle = SignalHandler::new(cancel.clone()).setup();

        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("signal task should stop with the run")
            .unwrap();
    }
}
