use tokio::sync::broadcast;
use tracing::{info, warn};

/// Fans a single stop signal out to every listener loop.
///
/// Listeners stop accepting as soon as the signal arrives; sessions already
/// spawned are left to finish or be dropped with the runtime.
#[derive(Debug, Clone)]
pub struct GracefulShutdown {
    shutdown_tx: broadcast::Sender<()>,
}

impl GracefulShutdown {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self { shutdown_tx }
    }

    /// Get a shutdown receiver for a listener to select on
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub fn trigger(&self) {
        info!("Initiating shutdown");
        if self.shutdown_tx.send(()).is_err() {
            warn!("Shutdown requested but no listener is running");
        }
    }

    /// Waits for SIGINT / Ctrl-C, then signals every subscriber.
    pub async fn trigger_on_ctrl_c(&self) -> std::io::Result<()> {
        tokio::signal::ctrl_c().await?;
        self.trigger();
        Ok(())
    }
}

impl Default for GracefulShutdown {
    fn default() -> Self {
        Self::new()
    }
}
