//! Computed Implementation
//!
//! A computed cell derives its value from a read function.
//!
//! # How Computed Cells Work
//!
//! 1. On creation, the read function runs inside a [`ReactiveContext`] that
//!    records every cell it reads.
//!
//! 2. The computed subscribes to each recorded cell. Cells no longer read are
//!    unsubscribed after every evaluation.
//!
//! 3. When a dependency announces a change, the computed re-evaluates. With
//!    an evaluation delay set on its subscribable, re-evaluation is debounced
//!    by that delay instead.
//!
//! 4. If the new value differs from the cached one (per the equality
//!    comparer), the computed announces the change to its own subscribers.
//!
//! A computed may carry a write function, which makes it writable. Writing
//! simply calls that function; the computed's value still only changes by
//! re-evaluation.

use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use tracing::trace;

use super::context::ReactiveContext;
use super::subscribable::{CellId, Subscribable};
use super::subscription::Subscription;
use super::{ReactiveCell, Target};
use crate::error::{Error, Result};
use crate::timing::{Debounce, RateLimit, Scheduler};
use crate::value::Value;

type ReadFn = Arc<dyn Fn() -> Value + Send + Sync>;
type WriteFn = Arc<dyn Fn(Value) + Send + Sync>;

struct ComputedInner {
    subscribable: Subscribable,
    read: ReadFn,
    write: Option<WriteFn>,

    /// The cached value.
    value: RwLock<Value>,

    /// Cells read during the last evaluation, with our subscription to each.
    dependencies: Mutex<IndexMap<CellId, (Target, Subscription)>>,

    /// Debounces re-evaluation while an evaluation delay is set.
    evaluation_limiter: Mutex<Option<Debounce>>,

    initialized: AtomicBool,
    evaluating: AtomicBool,
    disposed: AtomicBool,
    evaluation_count: AtomicUsize,
}

/// Resets the re-entrancy flag even if the read function panics.
struct EvaluationGuard<'a>(&'a AtomicBool);

impl Drop for EvaluationGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl ComputedInner {
    fn evaluate(self: &Arc<Self>) {
        if self.disposed.load(Ordering::SeqCst) {
            return;
        }
        if self.evaluating.swap(true, Ordering::SeqCst) {
            trace!(cell = %self.subscribable.id(), "re-entrant evaluation ignored");
            return;
        }

        let (new_value, dependencies) = {
            let _guard = EvaluationGuard(&self.evaluating);
            let _ctx = ReactiveContext::enter(self.subscribable.id());
            let value = (self.read)();
            (value, ReactiveContext::take_dependencies())
        };

        self.resubscribe(dependencies);
        self.evaluation_count.fetch_add(1, Ordering::SeqCst);

        let previous = std::mem::replace(&mut *self.value.write(), new_value.clone());
        if !self.initialized.swap(true, Ordering::SeqCst) {
            return;
        }
        if self.subscribable.is_different(&previous, &new_value) {
            self.subscribable.notify_change(previous, new_value);
        }
    }

    fn resubscribe(self: &Arc<Self>, latest: IndexMap<CellId, Target>) {
        let mut current = self.dependencies.lock();

        current.retain(|id, (_, subscription)| {
            let keep = latest.contains_key(id);
            if !keep {
                subscription.dispose();
            }
            keep
        });

        for (id, target) in latest {
            if current.contains_key(&id) {
                continue;
            }
            let weak = Arc::downgrade(self);
            let subscription = target.subscribe(move |_| {
                if let Some(inner) = weak.upgrade() {
                    inner.dependency_changed();
                }
            });
            current.insert(id, (target, subscription));
        }
    }

    fn dependency_changed(self: &Arc<Self>) {
        match self.subscribable.throttle_evaluation() {
            Some(delay) if !delay.is_zero() => self.schedule_evaluation(delay),
            _ => self.evaluate(),
        }
    }

    fn schedule_evaluation(self: &Arc<Self>, delay: Duration) {
        let mut limiter = self.evaluation_limiter.lock();
        if limiter.as_ref().map(Debounce::delay) != Some(delay) {
            if let Some(previous) = limiter.take() {
                previous.cancel();
            }
            let weak = Arc::downgrade(self);
            *limiter = Some(Debounce::with_scheduler(
                Arc::new(move || {
                    if let Some(inner) = weak.upgrade() {
                        inner.evaluate();
                    }
                }),
                delay,
                self.subscribable.scheduler(),
            ));
        }
        if let Some(limiter) = limiter.as_ref() {
            limiter.trigger();
        }
    }

    fn release(&self) {
        for (_, (_, subscription)) in self.dependencies.lock().drain(..) {
            subscription.dispose();
        }
        if let Some(limiter) = self.evaluation_limiter.lock().take() {
            limiter.cancel();
        }
    }
}

impl Drop for ComputedInner {
    fn drop(&mut self) {
        self.release();
    }
}

/// A derived reactive cell.
///
/// # Example
///
/// ```rust
/// use ripple_core::reactive::{Computed, Observable};
/// use ripple_core::Value;
///
/// let first = Observable::new("Ada");
/// let greeting = Computed::new({
///     let first = first.clone();
///     move || format!("Hello, {:?}", first.get())
/// });
///
/// first.set("Grace");
/// assert_eq!(greeting.get(), Value::from("Hello, \"Grace\""));
/// ```
#[derive(Clone)]
pub struct Computed {
    inner: Arc<ComputedInner>,
}

impl Computed {
    /// Create a read-only computed on the current thread's scheduler.
    pub fn new<F, R>(read: F) -> Self
    where
        F: Fn() -> R + Send + Sync + 'static,
        R: Into<Value>,
    {
        Self::build(Subscribable::new(), Self::wrap_read(read), None)
    }

    /// Create a computed whose writes are handed to `write`.
    pub fn writable<F, R, W>(read: F, write: W) -> Self
    where
        F: Fn() -> R + Send + Sync + 'static,
        R: Into<Value>,
        W: Fn(Value) + Send + Sync + 'static,
    {
        Self::build(Subscribable::new(), Self::wrap_read(read), Some(Arc::new(write)))
    }

    pub fn with_scheduler<F, R>(read: F, scheduler: Arc<dyn Scheduler>) -> Self
    where
        F: Fn() -> R + Send + Sync + 'static,
        R: Into<Value>,
    {
        Self::build(Subscribable::with_scheduler(scheduler), Self::wrap_read(read), None)
    }

    pub fn writable_with_scheduler<F, R, W>(read: F, write: W, scheduler: Arc<dyn Scheduler>) -> Self
    where
        F: Fn() -> R + Send + Sync + 'static,
        R: Into<Value>,
        W: Fn(Value) + Send + Sync + 'static,
    {
        Self::build(
            Subscribable::with_scheduler(scheduler),
            Self::wrap_read(read),
            Some(Arc::new(write)),
        )
    }

    fn wrap_read<F, R>(read: F) -> ReadFn
    where
        F: Fn() -> R + Send + Sync + 'static,
        R: Into<Value>,
    {
        Arc::new(move || read().into())
    }

    fn build(subscribable: Subscribable, read: ReadFn, write: Option<WriteFn>) -> Self {
        let inner = Arc::new(ComputedInner {
            subscribable,
            read,
            write,
            value: RwLock::new(Value::Undefined),
            dependencies: Mutex::new(IndexMap::new()),
            evaluation_limiter: Mutex::new(None),
            initialized: AtomicBool::new(false),
            evaluating: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
            evaluation_count: AtomicUsize::new(0),
        });
        inner.evaluate();
        Self { inner }
    }

    /// Read the cached value, registering a dependency if another computed
    /// is evaluating.
    pub fn get(&self) -> Value {
        if ReactiveContext::is_active() {
            ReactiveContext::track_dependency(self.to_target());
        }
        self.peek()
    }

    /// Re-run the read function now, bypassing any evaluation delay.
    pub fn evaluate_immediate(&self) {
        self.inner.evaluate();
    }

    pub fn is_writable(&self) -> bool {
        self.inner.write.is_some()
    }

    /// Unsubscribe from all dependencies. The cached value stays readable.
    pub fn dispose(&self) {
        self.inner.disposed.store(true, Ordering::SeqCst);
        self.inner.release();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.load(Ordering::SeqCst)
    }

    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.lock().len()
    }

    /// Number of times the read function has run.
    pub fn evaluation_count(&self) -> usize {
        self.inner.evaluation_count.load(Ordering::SeqCst)
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.inner.subscribable.subscribe(callback)
    }
}

impl ReactiveCell for Computed {
    fn subscribable(&self) -> &Subscribable {
        &self.inner.subscribable
    }

    fn read(&self) -> Value {
        self.get()
    }

    fn peek(&self) -> Value {
        self.inner.value.read().clone()
    }

    fn write(&self, value: Value) -> Result<()> {
        match &self.inner.write {
            Some(write) => {
                write(value);
                Ok(())
            }
            None => Err(Error::NotWritable(self.id())),
        }
    }

    fn is_computed(&self) -> bool {
        true
    }

    fn to_target(&self) -> Target {
        Arc::new(self.clone())
    }
}

impl Debug for Computed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.id())
            .field("value", &self.peek())
            .field("dependency_count", &self.dependency_count())
            .field("evaluation_count", &self.evaluation_count())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Observable;
    use crate::timing::{self, VirtualScheduler};
    use std::sync::atomic::AtomicI32;

    fn number(value: &Value) -> f64 {
        value.as_f64().unwrap_or(f64::NAN)
    }

    #[test]
    fn computed_evaluates_on_creation() {
        let _clock = timing::enter(VirtualScheduler::new());
        let call_count = Arc::new(AtomicI32::new(0));
        let call_count_clone = call_count.clone();

        let computed = Computed::new(move || {
            call_count_clone.fetch_add(1, Ordering::SeqCst);
            42
        });

        assert_eq!(call_count.load(Ordering::SeqCst), 1);
        assert_eq!(computed.get(), Value::from(42));
        assert_eq!(computed.get(), Value::from(42));
        assert_eq!(call_count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn computed_tracks_dependencies() {
        let _clock = timing::enter(VirtualScheduler::new());
        let base = Observable::new(5);

        let doubled = Computed::new({
            let base = base.clone();
            move || number(&base.get()) * 2.0
        });
        assert_eq!(doubled.dependency_count(), 1);
        assert_eq!(doubled.get(), Value::from(10));

        base.set(10);
        assert_eq!(doubled.get(), Value::from(20));
        assert_eq!(doubled.evaluation_count(), 2);
    }

    #[test]
    fn computed_notifies_only_on_change() {
        let _clock = timing::enter(VirtualScheduler::new());
        let base = Observable::new(3);
        let parity = Computed::new({
            let base = base.clone();
            move || number(&base.get()) % 2.0
        });

        let notifications = Arc::new(AtomicI32::new(0));
        let notifications_clone = notifications.clone();
        parity.subscribe(move |_| {
            notifications_clone.fetch_add(1, Ordering::SeqCst);
        });

        base.set(5);
        assert_eq!(notifications.load(Ordering::SeqCst), 0);

        base.set(6);
        assert_eq!(notifications.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn computed_chain_propagates() {
        let _clock = timing::enter(VirtualScheduler::new());
        let base = Observable::new(5);
        let doubled = Computed::new({
            let base = base.clone();
            move || number(&base.get()) * 2.0
        });
        let plus_ten = Computed::new({
            let doubled = doubled.clone();
            move || number(&doubled.get()) + 10.0
        });

        assert_eq!(plus_ten.get(), Value::from(20));
        base.set(10);
        assert_eq!(doubled.get(), Value::from(20));
        assert_eq!(plus_ten.get(), Value::from(30));
    }

    #[test]
    fn stale_dependencies_are_released() {
        let _clock = timing::enter(VirtualScheduler::new());
        let use_left = Observable::new(true);
        let left = Observable::new("left");
        let right = Observable::new("right");

        let picked = Computed::new({
            let (use_left, left, right) = (use_left.clone(), left.clone(), right.clone());
            move || {
                if matches!(use_left.get(), Value::Bool(true)) {
                    left.get()
                } else {
                    right.get()
                }
            }
        });
        assert_eq!(picked.dependency_count(), 2);
        assert_eq!(left.subscribable().subscriber_count(), 1);

        use_left.set(false);
        assert_eq!(picked.get(), Value::from("right"));
        assert_eq!(left.subscribable().subscriber_count(), 0);
        assert_eq!(right.subscribable().subscriber_count(), 1);
    }

    #[test]
    fn throttled_evaluation_is_debounced() {
        let clock = VirtualScheduler::new();
        let _guard = timing::enter(clock.clone());
        let base = Observable::new(1);
        let mirror = Computed::new({
            let base = base.clone();
            move || base.get()
        });
        mirror
            .subscribable()
            .set_throttle_evaluation(Some(Duration::from_millis(100)));

        base.set(2);
        clock.advance_ms(50);
        base.set(3);
        clock.advance_ms(50);
        assert_eq!(mirror.get(), Value::from(1));
        assert_eq!(mirror.evaluation_count(), 1);

        clock.advance_ms(50);
        assert_eq!(mirror.get(), Value::from(3));
        assert_eq!(mirror.evaluation_count(), 2);
    }

    #[test]
    fn read_only_computed_rejects_writes() {
        let _clock = timing::enter(VirtualScheduler::new());
        let computed = Computed::new(|| 1);
        assert!(!computed.is_writable());
        assert!(matches!(
            computed.write(Value::from(2)),
            Err(Error::NotWritable(id)) if id == computed.id()
        ));
    }

    #[test]
    fn writable_computed_forwards_writes() {
        let _clock = timing::enter(VirtualScheduler::new());
        let backing = Observable::new(1);
        let proxy = Computed::writable(
            {
                let backing = backing.clone();
                move || backing.get()
            },
            {
                let backing = backing.clone();
                move |value| backing.set(value)
            },
        );

        proxy.write(Value::from(7)).unwrap();
        assert_eq!(backing.get(), Value::from(7));
        assert_eq!(proxy.get(), Value::from(7));
    }

    #[test]
    fn disposed_computed_stops_updating() {
        let _clock = timing::enter(VirtualScheduler::new());
        let base = Observable::new(1);
        let mirror = Computed::new({
            let base = base.clone();
            move || base.get()
        });

        mirror.dispose();
        assert!(mirror.is_disposed());
        assert_eq!(base.subscribable().subscriber_count(), 0);

        base.set(2);
        assert_eq!(mirror.get(), Value::from(1));
    }

    #[test]
    fn dropping_a_computed_unsubscribes() {
        let _clock = timing::enter(VirtualScheduler::new());
        let base = Observable::new(1);
        {
            let base = base.clone();
            let _mirror = Computed::new(move || base.get());
        }
        assert_eq!(base.subscribable().subscriber_count(), 0);
    }

    #[test]
    fn self_write_during_evaluation_does_not_recurse() {
        let _clock = timing::enter(VirtualScheduler::new());
        let counter = Observable::new(0);
        let bumper = Computed::new({
            let counter = counter.clone();
            move || {
                let current = number(&counter.get());
                counter.set(current + 1.0);
                current
            }
        });

        assert_eq!(bumper.evaluation_count(), 1);
        assert_eq!(counter.get(), Value::from(1));

        counter.set(10);
        assert_eq!(bumper.evaluation_count(), 2);
        assert_eq!(bumper.get(), Value::from(10));
        assert_eq!(counter.get(), Value::from(11));
    }
}
