use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::infrastructure::queue::channel::{NotificationChannel, RawMessage};
use crate::jobs::event::JobStatusEvent;
use crate::jobs::registry::HandlerRegistry;

#[derive(Debug, Clone, Copy)]
pub struct PollerSettings {
    /// Pause after an empty batch.
    pub idle_backoff: Duration,
    /// Pause after a failed receive.
    pub error_backoff: Duration,
}

/// Background task draining the notification channel into the registry.
pub struct NotificationPoller {
    running: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl NotificationPoller {
    pub fn start(
        channel: Arc<dyn NotificationChannel>,
        registry: Arc<HandlerRegistry>,
        settings: PollerSettings,
    ) -> Self {
        let running = Arc::new(AtomicBool::new(true));
        let task = tokio::spawn(run(channel, registry, settings, running.clone()));

        Self { running, task }
    }

    /// Asks the loop to stop after the current receive cycle.
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire) && !self.task.is_finished()
    }

    /// Waits for the loop to exit. Call [`shutdown`](Self::shutdown) first.
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            error!("Notification poller task failed: {}", e);
        }
    }
}

async fn run(
    channel: Arc<dyn NotificationChannel>,
    registry: Arc<HandlerRegistry>,
    settings: PollerSettings,
    running: Arc<AtomicBool>,
) {
    info!("📨 Notification poller started");

    while running.load(Ordering::Acquire) {
        match channel.receive().await {
            Ok(batch) if batch.is_empty() => tokio::time::sleep(settings.idle_backoff).await,
            Ok(batch) => {
                process_batch(channel.as_ref(), &registry, batch).await;

                let pruned = registry.prune_finished();
                if pruned > 0 {
                    debug!(pruned, remaining = registry.handler_count(), "Pruned finished handlers");
                }
            }
            Err(e) => {
                error!("❌ Failed to receive notifications: {:#}", e);
                tokio::time::sleep(settings.error_backoff).await;
            }
        }
    }

    info!("📨 Notification poller stopped");
}

/// Parses, dispatches and deletes every message, in batch order.
async fn process_batch(
    channel: &dyn NotificationChannel,
    registry: &HandlerRegistry,
    batch: Vec<RawMessage>,
) {
    debug!(messages = batch.len(), "Received notification batch");

    for message in batch {
        match JobStatusEvent::parse(&message.body) {
            Ok(event) => registry.dispatch(&event).await,
            Err(e) => warn!(
                delivery_tag = message.delivery_tag,
                "Dropping malformed notification: {}", e
            ),
        }

        if let Err(e) = channel.delete(&message).await {
            error!(delivery_tag = message.delivery_tag, "Failed to delete notification: {:#}", e);
        }
    }
}
