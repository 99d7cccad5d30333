//! Unique named background work.
//!
//! Enqueuing under a name that is already scheduled keeps the existing work
//! and does nothing. Work is stopped by name through its cancellation token.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Result of [`WorkScheduler::enqueue_unique`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueOutcome {
    /// New work was spawned.
    Enqueued,
    /// Work with this name is still running; it was kept.
    AlreadyScheduled,
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("no work scheduled under '{0}'")]
    NotScheduled(String),

    #[error("work '{name}' did not stop within {timeout:?}")]
    StopTimeout { name: String, timeout: Duration },

    #[error("work '{name}' panicked: {reason}")]
    Panicked { name: String, reason: String },
}

struct ScheduledWork {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

/// Registry of named background tasks, at most one per name.
#[derive(Default)]
pub struct WorkScheduler {
    jobs: Mutex<HashMap<String, ScheduledWork>>,
}

impl WorkScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn `work` under `name` unless live work already holds that name.
    ///
    /// `work` receives the token that [`cancel`](Self::cancel) triggers.
    pub fn enqueue_unique<F, Fut>(&self, name: &str, work: F) -> EnqueueOutcome
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut jobs = self.lock();
        if let Some(existing) = jobs.get(name)
            && !existing.handle.is_finished()
        {
            debug!(name, "Work already scheduled, keeping existing");
            return EnqueueOutcome::AlreadyScheduled;
        }

        let token = CancellationToken::new();
        let handle = tokio::spawn(work(token.clone()));
        jobs.insert(name.to_string(), ScheduledWork { token, handle });
        info!(name, "Work enqueued");
        EnqueueOutcome::Enqueued
    }

    /// Whether live (unfinished) work is held under `name`.
    pub fn is_scheduled(&self, name: &str) -> bool {
        self.lock()
            .get(name)
            .is_some_and(|w| !w.handle.is_finished())
    }

    /// Signal the work under `name` to stop. Returns `false` if none exists.
    pub fn cancel(&self, name: &str) -> bool {
        match self.lock().get(name) {
            Some(work) => {
                work.token.cancel();
                info!(name, "Work cancellation requested");
                true
            }
            None => false,
        }
    }

    /// Wait for the work under `name` to finish and forget it.
    ///
    /// If it does not finish within `timeout`, it is aborted; its drop guards
    /// still run.
    pub async fn join(&self, name: &str, timeout: Duration) -> Result<(), SchedulerError> {
        let work = self
            .lock()
            .remove(name)
            .ok_or_else(|| SchedulerError::NotScheduled(name.to_string()))?;

        let mut handle = work.handle;
        match tokio::time::timeout(timeout, &mut handle).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) if e.is_cancelled() => Ok(()),
            Ok(Err(e)) => Err(SchedulerError::Panicked {
                name: name.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => {
                warn!(name, ?timeout, "Work did not stop in time, aborting");
                handle.abort();
                let _ = handle.await;
                Err(SchedulerError::StopTimeout {
                    name: name.to_string(),
                    timeout,
                })
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, ScheduledWork>> {
        // A poisoned map is still structurally valid.
        self.jobs
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl std::fmt::Debug for WorkScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<String> = self.lock().keys().cloned().collect();
        f.debug_struct("WorkScheduler").field("jobs", &names).finish()
    }
}
