use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{error, info, warn};

/// Graceful shutdown coordinator
///
/// Listeners subscribe for the stop signal; `shutdown` broadcasts it and
/// waits for the registered tasks to finish.
pub struct GracefulShutdown {
    shutdown_tx: broadcast::Sender<()>,
    tasks: Vec<(String, JoinHandle<()>)>,
    drain_timeout: Duration,
}

impl GracefulShutdown {
    pub fn new(drain_timeout: Duration) -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            shutdown_tx,
            tasks: Vec::new(),
            drain_timeout,
        }
    }

    /// Get a shutdown receiver for a component to listen on
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Track a task that should finish once the signal is sent
    pub fn register(&mut self, name: impl Into<String>, handle: JoinHandle<()>) {
        self.tasks.push((name.into(), handle));
    }

    /// Wait for Ctrl-C, then shut down
    pub async fn wait_for_ctrl_c(self) {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl-C"),
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
        self.shutdown().await;
    }

    /// Signal every subscriber and wait for registered tasks
    pub async fn shutdown(self) {
        info!("Initiating graceful shutdown...");
        if let Err(e) = self.shutdown_tx.send(()) {
            warn!("Failed to send shutdown signal: {}", e);
        }

        for (name, handle) in self.tasks {
            match timeout(self.drain_timeout, handle).await {
                Ok(Ok(())) => info!("Component '{}' shut down successfully", name),
                Ok(Err(e)) => error!("Component '{}' task panicked: {}", name, e),
                Err(_) => warn!("Component '{}' shutdown timed out", name),
            }
        }

        info!("Graceful shutdown completed");
    }
}
