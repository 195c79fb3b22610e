//! Timing
//!
//! Deferred execution for rate limiting. Everything that waits goes through
//! the [`Scheduler`] trait, a "run this after a delay" / "forget that"
//! capability, so the same primitives run against real timers in production
//! and a manual clock in tests.
//!
//! # Ambient scheduler
//!
//! Cells and primitives pick up the scheduler installed on the current thread
//! when they are created. [`enter`] installs one for the lifetime of the
//! returned guard; guards nest. With nothing installed, timers run on tokio:
//! the ambient runtime if there is one, otherwise a small background runtime
//! started on first use.

mod primitives;
mod tokio_scheduler;
mod virtual_clock;

pub use primitives::{debounce, throttle, Debounce, NotifyCallback, RateLimit, Throttle};
pub use tokio_scheduler::TokioScheduler;
pub use virtual_clock::VirtualScheduler;

use std::cell::RefCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Identifies a scheduled task so that it can be cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

impl TimerId {
    /// Allocate a new process-unique timer ID.
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

/// A host facility for running tasks after a delay.
pub trait Scheduler: Send + Sync {
    /// Run `task` once, no earlier than `delay` from now.
    fn schedule(&self, delay: Duration, task: Task) -> TimerId;

    /// Forget a scheduled task. Cancelling a task that already ran, or was
    /// already cancelled, does nothing.
    fn cancel(&self, timer: TimerId);
}

thread_local! {
    static SCHEDULER_STACK: RefCell<Vec<Arc<dyn Scheduler>>> = const { RefCell::new(Vec::new()) };
}

/// Guard returned by [`enter`]. Uninstalls the scheduler when dropped.
pub struct SchedulerGuard {
    depth: usize,
}

impl Drop for SchedulerGuard {
    fn drop(&mut self) {
        SCHEDULER_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            debug_assert_eq!(stack.len(), self.depth, "scheduler guards dropped out of order");
            stack.pop();
        });
    }
}

/// Install `scheduler` as the current thread's scheduler.
pub fn enter(scheduler: Arc<dyn Scheduler>) -> SchedulerGuard {
    let depth = SCHEDULER_STACK.with(|stack| {
        let mut stack = stack.borrow_mut();
        stack.push(scheduler);
        stack.len()
    });
    SchedulerGuard { depth }
}

/// The scheduler new cells and primitives on this thread should use.
pub fn current_scheduler() -> Arc<dyn Scheduler> {
    let installed = SCHEDULER_STACK.with(|stack| stack.borrow().last().cloned());
    installed.unwrap_or_else(|| Arc::new(TokioScheduler::ambient()))
}

/// Convert a millisecond count to a delay.
///
/// Negative and NaN inputs become zero, matching how host timers clamp them.
pub fn millis(ms: f64) -> Duration {
    if ms.is_nan() || ms <= 0.0 {
        Duration::ZERO
    } else {
        Duration::from_nanos((ms * 1_000_000.0).round() as u64)
    }
}
