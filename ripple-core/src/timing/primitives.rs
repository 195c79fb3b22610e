//! Rate-limiting primitives.
//!
//! Both primitives wrap a callback and hand out a `trigger`. Each holds at
//! most one pending invocation at a time.
//!
//! - [`Throttle`]: the first trigger while idle schedules the callback after
//!   `delay`; triggers while busy are dropped. At most one run per window.
//! - [`Debounce`]: every trigger cancels the pending run and schedules a new
//!   one, so the callback runs once, `delay` after the last trigger.
//!
//! The callback always runs outside the primitive's lock, so it may trigger
//! the same primitive again.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use super::{current_scheduler, Scheduler, Task, TimerId};

/// The callback a rate limiter eventually runs.
pub type NotifyCallback = Arc<dyn Fn() + Send + Sync>;

/// A callback wrapper that delays and coalesces invocations.
pub trait RateLimit: Send + Sync {
    /// Request an invocation of the wrapped callback.
    fn trigger(&self);

    /// Drop the pending invocation, if any.
    fn cancel(&self);

    /// Whether an invocation is scheduled.
    fn is_pending(&self) -> bool;
}

/// Wrap `callback` in a [`Throttle`] on the current thread's scheduler.
pub fn throttle<F>(callback: F, delay: Duration) -> Throttle
where
    F: Fn() + Send + Sync + 'static,
{
    Throttle::with_scheduler(Arc::new(callback), delay, current_scheduler())
}

/// Wrap `callback` in a [`Debounce`] on the current thread's scheduler.
pub fn debounce<F>(callback: F, delay: Duration) -> Debounce
where
    F: Fn() + Send + Sync + 'static,
{
    Debounce::with_scheduler(Arc::new(callback), delay, current_scheduler())
}

/// The one pending invocation of a primitive.
#[derive(Default)]
struct TimerState {
    timer: Option<TimerId>,
    /// Bumped on every schedule and cancel. A timer whose generation is stale
    /// was superseded, and does nothing if its scheduler still runs it.
    generation: u64,
}

impl TimerState {
    /// Build the task for the timer scheduled at `generation`.
    fn fire(state: &Arc<Mutex<TimerState>>, generation: u64, callback: &NotifyCallback) -> Task {
        let state = Arc::clone(state);
        let callback = Arc::clone(callback);
        Box::new(move || {
            {
                let mut state = state.lock();
                if state.generation != generation {
                    return;
                }
                state.timer = None;
            }
            callback();
        })
    }

    /// Forget the pending timer and invalidate it.
    fn clear(&mut self, scheduler: &dyn Scheduler) {
        self.generation += 1;
        if let Some(timer) = self.timer.take() {
            scheduler.cancel(timer);
        }
    }
}

// ----------------------------------------------------------------------------
// Throttle
// ----------------------------------------------------------------------------

/// Runs its callback at most once per `delay`, at the end of the window.
pub struct Throttle {
    callback: NotifyCallback,
    delay: Duration,
    scheduler: Arc<dyn Scheduler>,
    state: Arc<Mutex<TimerState>>,
}

impl Throttle {
    pub fn with_scheduler(
        callback: NotifyCallback,
        delay: Duration,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Self {
            callback,
            delay,
            scheduler,
            state: Arc::new(Mutex::new(TimerState::default())),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl RateLimit for Throttle {
    fn trigger(&self) {
        let mut state = self.state.lock();
        if state.timer.is_some() {
            return;
        }
        state.generation += 1;

        let task = TimerState::fire(&self.state, state.generation, &self.callback);
        state.timer = Some(self.scheduler.schedule(self.delay, task));
    }

    fn cancel(&self) {
        self.state.lock().clear(&*self.scheduler);
    }

    fn is_pending(&self) -> bool {
        self.state.lock().timer.is_some()
    }
}

// ----------------------------------------------------------------------------
// Debounce
// ----------------------------------------------------------------------------

/// Runs its callback once triggers have stopped for `delay`.
pub struct Debounce {
    callback: NotifyCallback,
    delay: Duration,
    scheduler: Arc<dyn Scheduler>,
    state: Arc<Mutex<TimerState>>,
}

impl Debounce {
    pub fn with_scheduler(
        callback: NotifyCallback,
        delay: Duration,
        scheduler: Arc<dyn Scheduler>,
    ) -> Self {
        Self {
            callback,
            delay,
            scheduler,
            state: Arc::new(Mutex::new(TimerState::default())),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl RateLimit for Debounce {
    fn trigger(&self) {
        let mut state = self.state.lock();
        state.clear(&*self.scheduler);

        let task = TimerState::fire(&self.state, state.generation, &self.callback);
        state.timer = Some(self.scheduler.schedule(self.delay, task));
    }

    fn cancel(&self) {
        self.state.lock().clear(&*self.scheduler);
    }

    fn is_pending(&self) -> bool {
        self.state.lock().timer.is_some()
    }
}
