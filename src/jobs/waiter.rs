//! Per-request correlation of one job id to one waiting caller.

use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::BoxFuture;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::event::JobStatusEvent;
use super::registry::JobStatusHandler;

type CompletionAction<T> = Box<dyn FnOnce(JobStatusEvent) -> BoxFuture<'static, T> + Send>;

#[derive(Debug, Error)]
pub enum WaitError {
    #[error("timed out after {after:?} waiting for job {job_id}")]
    TimedOut { job_id: String, after: Duration },
    #[error("waiter for job {job_id} was dropped before it fired")]
    Abandoned { job_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaiterState {
    Armed,
    Fired,
}

struct Armed<T> {
    on_complete: CompletionAction<T>,
    release: oneshot::Sender<T>,
}

/// Handler that waits for the terminal event of a single job.
///
/// The first terminal event for `job_id` starts the completion action on a
/// separate task and hands its result to the [`WaitHandle`]. Anything after
/// that is a no-op.
pub struct JobWaiter<T> {
    job_id: String,
    armed: Mutex<Option<Armed<T>>>,
}

impl<T: Send + 'static> JobWaiter<T> {
    /// Creates the waiter together with its release side.
    ///
    /// The gate exists before the waiter is registered anywhere, so a release
    /// that happens before [`WaitHandle::wait`] is entered is kept.
    pub fn arm<F, Fut>(job_id: impl Into<String>, on_complete: F) -> (Arc<Self>, WaitHandle<T>)
    where
        F: FnOnce(JobStatusEvent) -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let job_id = job_id.into();
        let (release, gate) = oneshot::channel();
        let on_complete: CompletionAction<T> = Box::new(move |event| Box::pin(on_complete(event)));

        let waiter = Arc::new(Self {
            job_id: job_id.clone(),
            armed: Mutex::new(Some(Armed { on_complete, release })),
        });

        (waiter, WaitHandle { job_id, gate })
    }

    pub fn state(&self) -> WaiterState {
        let armed = self.armed.lock().unwrap_or_else(PoisonError::into_inner);
        if armed.is_some() {
            WaiterState::Armed
        } else {
            WaiterState::Fired
        }
    }
}

#[async_trait]
impl<T: Send + 'static> JobStatusHandler for JobWaiter<T> {
    async fn handle(&self, event: &JobStatusEvent) -> anyhow::Result<()> {
        if event.job_id != self.job_id {
            return Ok(());
        }

        if !event.is_terminal() {
            info!(job_id = %self.job_id, state = %event.state, "Job status update");
            return Ok(());
        }

        // Taking the armed half is the Armed -> Fired transition.
        let armed = self
            .armed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let Some(Armed { on_complete, release }) = armed else {
            debug!(job_id = %self.job_id, state = %event.state, "Ignoring repeated terminal event");
            return Ok(());
        };

        info!(job_id = %self.job_id, state = %event.state, "Job reached terminal state");
        debug!(job_id = %self.job_id, payload = %event.raw, "Terminal notification");

        // Off the dispatch path. A panic drops `release`, which the caller
        // sees as `WaitError::Abandoned`.
        let job_id = self.job_id.clone();
        let event = event.clone();
        tokio::spawn(async move {
            let outcome = on_complete(event).await;
            if release.send(outcome).is_err() {
                warn!(job_id = %job_id, "Caller stopped waiting before the job finished");
            }
        });

        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.state() == WaiterState::Fired
    }
}

/// The blocking side of a [`JobWaiter`].
pub struct WaitHandle<T> {
    job_id: String,
    gate: oneshot::Receiver<T>,
}

impl<T> WaitHandle<T> {
    /// Waits until the waiter fires.
    ///
    /// `None` waits with no bound at all, which hangs for as long as the
    /// remote job never reports a terminal state.
    pub async fn wait(self, deadline: Option<Duration>) -> Result<T, WaitError> {
        let Self { job_id, gate } = self;

        let released = match deadline {
            None => gate.await,
            Some(after) => match tokio::time::timeout(after, gate).await {
                Ok(released) => released,
                Err(_) => return Err(WaitError::TimedOut { job_id, after }),
            },
        };

        released.map_err(|_| WaitError::Abandoned { job_id })
    }
}
