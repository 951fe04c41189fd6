//! Handler registry and fan-out dispatch of job-status events.

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures_util::FutureExt;
use tracing::{debug, error};

use super::event::JobStatusEvent;

const DEFAULT_REPLAY_CAPACITY: usize = 256;

/// Something interested in job-status events.
///
/// Every handler sees every event; relevance is decided by the handler.
#[async_trait]
pub trait JobStatusHandler: Send + Sync {
    async fn handle(&self, event: &JobStatusEvent) -> anyhow::Result<()>;

    /// A finished handler ignores all further events and may be pruned.
    fn is_finished(&self) -> bool {
        false
    }
}

struct Inner {
    handlers: Vec<Arc<dyn JobStatusHandler>>,
    recent_terminal: VecDeque<JobStatusEvent>,
}

/// Insertion-ordered list of handlers shared between the poller and request
/// tasks.
///
/// Appends and dispatch snapshots are taken under one lock; handlers are
/// invoked outside of it. The registry also keeps a bounded window of recent
/// terminal events which is replayed to each newly added handler, so a
/// waiter registered after its job already finished still fires.
pub struct HandlerRegistry {
    inner: Mutex<Inner>,
    replay_capacity: usize,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::with_replay_capacity(DEFAULT_REPLAY_CAPACITY)
    }

    pub fn with_replay_capacity(replay_capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                handlers: Vec::new(),
                recent_terminal: VecDeque::with_capacity(replay_capacity),
            }),
            replay_capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends `handler`. Every event dispatched after this returns reaches it.
    pub async fn add_handler(&self, handler: Arc<dyn JobStatusHandler>) {
        let replay: Vec<JobStatusEvent> = {
            let mut inner = self.lock();
            inner.handlers.push(Arc::clone(&handler));
            inner.recent_terminal.iter().cloned().collect()
        };

        for event in &replay {
            invoke(&handler, event).await;
        }
    }

    /// Invokes every registered handler with `event`, in insertion order.
    pub async fn dispatch(&self, event: &JobStatusEvent) {
        let snapshot: Vec<Arc<dyn JobStatusHandler>> = {
            let mut inner = self.lock();
            if event.is_terminal() && self.replay_capacity > 0 {
                if inner.recent_terminal.len() == self.replay_capacity {
                    inner.recent_terminal.pop_front();
                }
                inner.recent_terminal.push_back(event.clone());
            }
            inner.handlers.clone()
        };

        debug!(
            job_id = %event.job_id,
            state = %event.state,
            pipeline_id = event.pipeline_id.as_deref().unwrap_or("-"),
            handlers = snapshot.len(),
            "Dispatching event"
        );

        for handler in &snapshot {
            invoke(handler, event).await;
        }
    }

    /// Drops handlers that report themselves finished. Returns how many were removed.
    pub fn prune_finished(&self) -> usize {
        let mut inner = self.lock();
        let before = inner.handlers.len();
        inner.handlers.retain(|handler| !handler.is_finished());
        before - inner.handlers.len()
    }

    pub fn handler_count(&self) -> usize {
        self.lock().handlers.len()
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// One misbehaving handler must not starve the rest.
async fn invoke(handler: &Arc<dyn JobStatusHandler>, event: &JobStatusEvent) {
    match AssertUnwindSafe(handler.handle(event)).catch_unwind().await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!(job_id = %event.job_id, "Job status handler failed: {:#}", e),
        Err(_) => error!(job_id = %event.job_id, "Job status handler panicked"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::event::JobState;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    type Log = Arc<Mutex<Vec<(usize, String)>>>;

    struct Recording {
        index: usize,
        log: Log,
    }

    #[async_trait]
    impl JobStatusHandler for Recording {
        async fn handle(&self, event: &JobStatusEvent) -> anyhow::Result<()> {
            self.log.lock().unwrap().push((self.index, event.job_id.clone()));
            Ok(())
        }
    }

    struct Failing;

    #[async_trait]
    impl JobStatusHandler for Failing {
        async fn handle(&self, _event: &JobStatusEvent) -> anyhow::Result<()> {
            anyhow::bail!("boom")
        }
    }

    struct Panicking;

    #[async_trait]
    impl JobStatusHandler for Panicking {
        async fn handle(&self, _event: &JobStatusEvent) -> anyhow::Result<()> {
            panic!("handler exploded")
        }
    }

    struct Counting {
        seen: AtomicUsize,
        finished: AtomicBool,
    }

    impl Counting {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                seen: AtomicUsize::new(0),
                finished: AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl JobStatusHandler for Counting {
        async fn handle(&self, _event: &JobStatusEvent) -> anyhow::Result<()> {
            self.seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn is_finished(&self) -> bool {
            self.finished.load(Ordering::SeqCst)
        }
    }

    #[tokio::test]
    async fn every_handler_sees_every_event_in_insertion_order() {
        let registry = HandlerRegistry::new();
        let log: Log = Arc::default();

        registry.add_handler(Arc::new(Recording { index: 0, log: log.clone() })).await;
        registry.add_handler(Arc::new(Failing)).await;
        registry.add_handler(Arc::new(Recording { index: 1, log: log.clone() })).await;
        registry.add_handler(Arc::new(Panicking)).await;
        registry.add_handler(Arc::new(Recording { index: 2, log: log.clone() })).await;

        registry.dispatch(&JobStatusEvent::new("a", JobState::Progressing)).await;
        registry.dispatch(&JobStatusEvent::new("b", JobState::Progressing)).await;

        let log = log.lock().unwrap().clone();
        let expected: Vec<(usize, String)> = ["a", "b"]
            .iter()
            .flat_map(|id| (0..3).map(move |i| (i, id.to_string())))
            .collect();
        assert_eq!(log, expected);
    }

    #[tokio::test]
    async fn late_handler_receives_recent_terminal_events() {
        let registry = HandlerRegistry::new();
        registry.dispatch(&JobStatusEvent::new("job-1", JobState::Progressing)).await;
        registry.dispatch(&JobStatusEvent::new("job-1", JobState::Completed)).await;

        let log: Log = Arc::default();
        registry.add_handler(Arc::new(Recording { index: 0, log: log.clone() })).await;

        assert_eq!(*log.lock().unwrap(), vec![(0, "job-1".to_string())]);
    }

    #[tokio::test]
    async fn replay_window_is_bounded() {
        let registry = HandlerRegistry::with_replay_capacity(2);
        for id in ["a", "b", "c"] {
            registry.dispatch(&JobStatusEvent::new(id, JobState::Completed)).await;
        }

        let log: Log = Arc::default();
        registry.add_handler(Arc::new(Recording { index: 0, log: log.clone() })).await;

        let ids: Vec<String> = log.lock().unwrap().iter().map(|(_, id)| id.clone()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_appends_are_never_lost() {
        let registry = Arc::new(HandlerRegistry::with_replay_capacity(0));
        let handlers: Vec<Arc<Counting>> = (0..64).map(|_| Counting::new()).collect();

        let dispatcher = {
            let registry = registry.clone();
            tokio::spawn(async move {
                for _ in 0..200 {
                    registry.dispatch(&JobStatusEvent::new("noise", JobState::Progressing)).await;
                    tokio::task::yield_now().await;
                }
            })
        };

        let adders: Vec<_> = handlers
            .iter()
            .cloned()
            .map(|handler| {
                let registry = registry.clone();
                tokio::spawn(async move { registry.add_handler(handler).await })
            })
            .collect();

        for adder in adders {
            adder.await.unwrap();
        }
        dispatcher.await.unwrap();

        assert_eq!(registry.handler_count(), 64);

        let before: Vec<usize> = handlers.iter().map(|h| h.seen.load(Ordering::SeqCst)).collect();
        registry.dispatch(&JobStatusEvent::new("final", JobState::Progressing)).await;
        for (handler, seen) in handlers.iter().zip(before) {
            assert_eq!(handler.seen.load(Ordering::SeqCst), seen + 1);
        }
    }

    #[tokio::test]
    async fn prune_removes_only_finished_handlers() {
        let registry = HandlerRegistry::new();
        let done = Counting::new();
        let live = Counting::new();
        registry.add_handler(done.clone()).await;
        registry.add_handler(live.clone()).await;

        done.finished.store(true, Ordering::SeqCst);
        assert_eq!(registry.prune_finished(), 1);
        assert_eq!(registry.handler_count(), 1);

        registry.dispatch(&JobStatusEvent::new("x", JobState::Submitted)).await;
        assert_eq!(done.seen.load(Ordering::SeqCst), 0);
        assert_eq!(live.seen.load(Ordering::SeqCst), 1);
    }
}
