//! Process-wide owner of the handler registry and the notification poller.
//!
//! Requests share a single poller. Each in-flight request holds a
//! [`PollerLease`]; the first lease starts the poller and dropping the last
//! one shuts it down.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::info;

use super::registry::{HandlerRegistry, JobStatusHandler};
use crate::infrastructure::queue::channel::NotificationChannel;
use crate::workers::notification_poller::{NotificationPoller, PollerSettings};

#[derive(Default)]
struct PollerSlot {
    leases: usize,
    poller: Option<NotificationPoller>,
}

fn lock(slot: &Mutex<PollerSlot>) -> MutexGuard<'_, PollerSlot> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

pub struct JobCoordinator {
    registry: Arc<HandlerRegistry>,
    channel: Arc<dyn NotificationChannel>,
    settings: PollerSettings,
    slot: Arc<Mutex<PollerSlot>>,
}

impl JobCoordinator {
    pub fn new(channel: Arc<dyn NotificationChannel>, settings: PollerSettings) -> Self {
        Self {
            registry: Arc::new(HandlerRegistry::new()),
            channel,
            settings,
            slot: Arc::default(),
        }
    }

    /// Makes sure the shared poller is running for as long as the lease lives.
    pub fn acquire_poller(&self) -> PollerLease {
        let mut slot = lock(&self.slot);
        slot.leases += 1;

        let running = slot.poller.as_ref().is_some_and(NotificationPoller::is_running);
        if !running {
            if let Some(stale) = slot.poller.take() {
                stale.shutdown();
            }
            info!(leases = slot.leases, "Starting shared notification poller");
            slot.poller = Some(NotificationPoller::start(
                Arc::clone(&self.channel),
                Arc::clone(&self.registry),
                self.settings,
            ));
        }

        PollerLease {
            slot: Arc::clone(&self.slot),
        }
    }

    pub async fn register(&self, handler: Arc<dyn JobStatusHandler>) {
        self.registry.add_handler(handler).await;
    }

    #[cfg(test)]
    pub fn is_polling(&self) -> bool {
        lock(&self.slot)
            .poller
            .as_ref()
            .is_some_and(NotificationPoller::is_running)
    }

    #[cfg(test)]
    pub fn active_leases(&self) -> usize {
        lock(&self.slot).leases
    }

    /// Stops the poller and waits for it to exit, regardless of open leases.
    pub async fn shutdown(&self) {
        let poller = lock(&self.slot).poller.take();
        if let Some(poller) = poller {
            poller.shutdown();
            poller.join().await;
        }
    }
}

/// Keeps the shared poller alive. See [`JobCoordinator::acquire_poller`].
pub struct PollerLease {
    slot: Arc<Mutex<PollerSlot>>,
}

impl Drop for PollerLease {
    fn drop(&mut self) {
        let mut slot = lock(&self.slot);
        slot.leases = slot.leases.saturating_sub(1);

        if slot.leases == 0 {
            if let Some(poller) = slot.poller.take() {
                info!("No requests waiting, stopping notification poller");
                poller.shutdown();
            }
        }
    }
}
