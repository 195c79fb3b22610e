//! Subscribable
//!
//! The part of a cell that announces changes. Both observables and computed
//! cells embed one.
//!
//! # Slots
//!
//! Extenders configure a cell by mutating three slots:
//!
//! - the equality comparer, which decides whether a new value is a change
//!   (`None` means every write is a change);
//! - the evaluation delay, which debounces re-evaluation of computed cells;
//! - the notification limiter, a rate limiter placed in front of the
//!   outward change announcement.
//!
//! # Limited notifications
//!
//! With a limiter installed, the first change of a burst records the value
//! the cell held before it and triggers the limiter. Later changes in the
//! burst only update the latest value. When the limiter fires, subscribers are
//! notified once with the latest value, and only if it differs from the value
//! recorded at the start of the burst.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use smallvec::SmallVec;
use tracing::{debug, trace};

use super::subscription::{ChangeCallback, SubscriberId, SubscriberMap, Subscription};
use crate::equality::values_are_exactly_equal;
use crate::timing::{current_scheduler, NotifyCallback, RateLimit, Scheduler};
use crate::value::Value;

/// Decides whether two values are the same for change detection.
pub type EqualityComparer = Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>;

/// The comparer cells start with.
pub fn default_comparer() -> EqualityComparer {
    Arc::new(values_are_exactly_equal)
}

/// Unique identifier for a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellId(u64);

impl CellId {
    /// Allocate a new process-unique cell ID.
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Default)]
struct LimitedChange {
    before: Option<Value>,
    latest: Option<Value>,
}

struct Shared {
    id: CellId,
    subscribers: Arc<SubscriberMap>,
    comparer: RwLock<Option<EqualityComparer>>,
    throttle_evaluation: RwLock<Option<Duration>>,
    limiter: RwLock<Option<Arc<dyn RateLimit>>>,
    limited: Mutex<LimitedChange>,
    scheduler: Arc<dyn Scheduler>,
}

/// Change announcement for one cell. Clones share state.
#[derive(Clone)]
pub struct Subscribable {
    shared: Arc<Shared>,
}

impl Subscribable {
    /// Create a subscribable on the current thread's scheduler.
    pub fn new() -> Self {
        Self::with_scheduler(current_scheduler())
    }

    pub fn with_scheduler(scheduler: Arc<dyn Scheduler>) -> Self {
        Self {
            shared: Arc::new(Shared {
                id: CellId::next(),
                subscribers: Arc::new(RwLock::new(IndexMap::new())),
                comparer: RwLock::new(Some(default_comparer())),
                throttle_evaluation: RwLock::new(None),
                limiter: RwLock::new(None),
                limited: Mutex::new(LimitedChange::default()),
                scheduler,
            }),
        }
    }

    pub fn id(&self) -> CellId {
        self.shared.id
    }

    /// The scheduler deferred work for this cell runs on.
    pub fn scheduler(&self) -> Arc<dyn Scheduler> {
        Arc::clone(&self.shared.scheduler)
    }

    /// Register a change callback.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let id = SubscriberId::new();
        self.shared
            .subscribers
            .write()
            .insert(id, Arc::new(callback) as ChangeCallback);
        Subscription::new(id, &self.shared.subscribers)
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.read().len()
    }

    pub fn equality_comparer(&self) -> Option<EqualityComparer> {
        self.shared.comparer.read().clone()
    }

    /// Replace the comparer. `None` makes every write a change.
    pub fn set_equality_comparer(&self, comparer: Option<EqualityComparer>) {
        *self.shared.comparer.write() = comparer;
    }

    /// Whether replacing `old` with `new` is a change.
    pub fn is_different(&self, old: &Value, new: &Value) -> bool {
        match self.equality_comparer() {
            Some(equal) => !equal(old, new),
            None => true,
        }
    }

    pub fn throttle_evaluation(&self) -> Option<Duration> {
        *self.shared.throttle_evaluation.read()
    }

    pub fn set_throttle_evaluation(&self, delay: Option<Duration>) {
        *self.shared.throttle_evaluation.write() = delay;
    }

    /// Route change announcements through a rate limiter.
    ///
    /// `installer` receives the callback that performs the announcement and
    /// returns the limiter wrapping it. A previously installed limiter is
    /// cancelled and replaced.
    pub fn limit<F>(&self, installer: F)
    where
        F: FnOnce(NotifyCallback) -> Arc<dyn RateLimit>,
    {
        let weak: Weak<Shared> = Arc::downgrade(&self.shared);
        let finish: NotifyCallback = Arc::new(move || {
            if let Some(shared) = weak.upgrade() {
                Subscribable { shared }.finish_limited_change();
            }
        });

        let limiter = installer(finish);
        if let Some(previous) = self.shared.limiter.write().replace(limiter) {
            previous.cancel();
        }
        debug!(cell = %self.id(), "notification limiter installed");
    }

    pub fn is_limited(&self) -> bool {
        self.shared.limiter.read().is_some()
    }

    /// Whether a limited announcement is waiting for its limiter to fire.
    pub fn has_pending_notification(&self) -> bool {
        self.shared.limited.lock().before.is_some()
    }

    /// Announce that the cell changed from `before` to `after`.
    pub fn notify_change(&self, before: Value, after: Value) {
        let limiter = self.shared.limiter.read().clone();
        match limiter {
            None => self.notify_subscribers(&after),
            Some(limiter) => {
                {
                    let mut limited = self.shared.limited.lock();
                    if limited.before.is_none() {
                        limited.before = Some(before);
                    }
                    limited.latest = Some(after);
                }
                limiter.trigger();
            }
        }
    }

    /// Call every subscriber with `value`, bypassing any limiter.
    pub fn notify_subscribers(&self, value: &Value) {
        let callbacks: SmallVec<[ChangeCallback; 4]> =
            self.shared.subscribers.read().values().cloned().collect();
        trace!(cell = %self.id(), subscribers = callbacks.len(), "notifying");
        for callback in callbacks {
            callback(value);
        }
    }

    fn finish_limited_change(&self) {
        let (before, latest) = {
            let mut limited = self.shared.limited.lock();
            (limited.before.take(), limited.latest.take())
        };
        if let (Some(before), Some(latest)) = (before, latest) {
            if self.is_different(&before, &latest) {
                self.notify_subscribers(&latest);
            } else {
                trace!(cell = %self.id(), "limited change reverted, not notifying");
            }
        }
    }
}

impl Default for Subscribable {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Subscribable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscribable")
            .field("id", &self.id())
            .field("subscriber_count", &self.subscriber_count())
            .field("always_notify", &self.equality_comparer().is_none())
            .field("throttle_evaluation", &self.throttle_evaluation())
            .field("limited", &self.is_limited())
            .finish()
    }
}
