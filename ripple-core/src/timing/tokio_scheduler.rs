//! Real timers on a tokio runtime.

use std::sync::{Arc, OnceLock};
use std::time::Duration;

use dashmap::DashMap;
use tokio::runtime::{Handle, Runtime};
use tokio::task::AbortHandle;
use tracing::trace;

use super::{Scheduler, Task, TimerId};

/// Runtime used when timers are requested outside of any tokio runtime.
static BACKGROUND: OnceLock<Runtime> = OnceLock::new();

fn background_handle() -> Handle {
    BACKGROUND
        .get_or_init(|| {
            tokio::runtime::Builder::new_multi_thread()
                .worker_threads(1)
                .thread_name("ripple-timer")
                .enable_time()
                .build()
                .expect("failed to start ripple timer runtime")
        })
        .handle()
        .clone()
}

/// A [`Scheduler`] backed by `tokio::time`.
///
/// Each scheduled task is a spawned future that sleeps and then runs the task.
/// Cancelling aborts the future.
#[derive(Clone)]
pub struct TokioScheduler {
    handle: Handle,
    timers: Arc<DashMap<TimerId, AbortHandle>>,
}

impl TokioScheduler {
    /// Schedule on the given runtime.
    pub fn new(handle: Handle) -> Self {
        Self {
            handle,
            timers: Arc::new(DashMap::new()),
        }
    }

    /// Schedule on the runtime of the calling context.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a tokio runtime.
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// Schedule on the calling context's runtime if there is one, otherwise
    /// on a shared background runtime.
    pub fn ambient() -> Self {
        Self::new(Handle::try_current().unwrap_or_else(|_| background_handle()))
    }

    /// Number of timers that have neither fired nor been cancelled.
    pub fn pending(&self) -> usize {
        self.timers.len()
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> TimerId {
        let id = TimerId::next();
        let timers = Arc::clone(&self.timers);

        let join = self.handle.spawn(async move {
            tokio::time::sleep(delay).await;
            timers.remove(&id);
            task();
        });

        self.timers.insert(id, join.abort_handle());
        if join.is_finished() {
            self.timers.remove(&id);
        }
        trace!(?id, ?delay, "timer scheduled");
        id
    }

    fn cancel(&self, timer: TimerId) {
        if let Some((_, abort)) = self.timers.remove(&timer) {
            abort.abort();
        }
    }
}
