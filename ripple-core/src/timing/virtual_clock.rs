//! Manual clock.
//!
//! Time only moves when [`VirtualScheduler::advance`] is called. Due tasks run
//! on the advancing thread in deadline order, ties broken by scheduling order.
//! A task scheduled while advancing runs in the same call if it falls due
//! before the advance target.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::trace;

use super::{Scheduler, Task, TimerId};

#[derive(Default)]
struct ClockState {
    now: Duration,
    queue: BTreeMap<(Duration, TimerId), Task>,
    deadlines: HashMap<TimerId, Duration>,
}

/// A [`Scheduler`] driven by an explicit virtual clock.
#[derive(Default)]
pub struct VirtualScheduler {
    state: Mutex<ClockState>,
}

impl VirtualScheduler {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Time elapsed on this clock.
    pub fn now(&self) -> Duration {
        self.state.lock().now
    }

    /// Number of tasks waiting to run.
    pub fn pending(&self) -> usize {
        self.state.lock().queue.len()
    }

    /// Move the clock forward by `by`, running every task that falls due.
    ///
    /// Returns the number of tasks run.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.state.lock().now + by;
        let mut ran = 0;

        while let Some(task) = self.pop_due(target) {
            task();
            ran += 1;
        }

        let mut state = self.state.lock();
        if state.now < target {
            state.now = target;
        }
        ran
    }

    /// Advance by a number of milliseconds.
    pub fn advance_ms(&self, ms: u64) -> usize {
        self.advance(Duration::from_millis(ms))
    }

    /// Run tasks until none remain, moving the clock to each deadline.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while let Some(task) = self.pop_due(Duration::MAX) {
            task();
            ran += 1;
        }
        ran
    }

    fn pop_due(&self, target: Duration) -> Option<Task> {
        let mut state = self.state.lock();
        let (&(deadline, id), _) = state.queue.first_key_value()?;
        if deadline > target {
            return None;
        }
        let task = state.queue.remove(&(deadline, id))?;
        state.deadlines.remove(&id);
        state.now = deadline;
        Some(task)
    }
}

impl Scheduler for VirtualScheduler {
    fn schedule(&self, delay: Duration, task: Task) -> TimerId {
        let id = TimerId::next();
        let mut state = self.state.lock();
        let deadline = state.now + delay;
        trace!(?id, ?deadline, "virtual timer scheduled");
        state.queue.insert((deadline, id), task);
        state.deadlines.insert(id, deadline);
        id
    }

    fn cancel(&self, timer: TimerId) {
        let mut state = self.state.lock();
        if let Some(deadline) = state.deadlines.remove(&timer) {
            state.queue.remove(&(deadline, timer));
        }
    }
}
