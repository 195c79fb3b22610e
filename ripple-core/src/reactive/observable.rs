//! Observable Implementation
//!
//! An observable is a writable cell holding a value. Reading it inside a
//! computed evaluation registers it as a dependency of that computed. Writing
//! it announces the change to subscribers unless the equality comparer says
//! the new value is the same as the old one.

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::RwLock;

use super::context::ReactiveContext;
use super::subscribable::Subscribable;
use super::subscription::Subscription;
use super::{ReactiveCell, Target};
use crate::error::Result;
use crate::timing::Scheduler;
use crate::value::Value;

struct ObservableInner {
    value: RwLock<Value>,
    subscribable: Subscribable,
}

/// A writable reactive cell.
///
/// # Example
///
/// ```rust
/// use ripple_core::reactive::Observable;
/// use ripple_core::Value;
///
/// let count = Observable::new(0);
/// count.set(5);
/// assert_eq!(count.get(), Value::from(5));
/// ```
#[derive(Clone)]
pub struct Observable {
    inner: Arc<ObservableInner>,
}

impl Observable {
    /// Create an observable on the current thread's scheduler.
    pub fn new(value: impl Into<Value>) -> Self {
        Self::from_subscribable(value.into(), Subscribable::new())
    }

    pub fn with_scheduler(value: impl Into<Value>, scheduler: Arc<dyn Scheduler>) -> Self {
        Self::from_subscribable(value.into(), Subscribable::with_scheduler(scheduler))
    }

    fn from_subscribable(value: Value, subscribable: Subscribable) -> Self {
        Self {
            inner: Arc::new(ObservableInner {
                value: RwLock::new(value),
                subscribable,
            }),
        }
    }

    /// Read the value, registering a dependency if a computed is evaluating.
    pub fn get(&self) -> Value {
        if ReactiveContext::is_active() {
            ReactiveContext::track_dependency(self.to_target());
        }
        self.peek()
    }

    /// Write a new value. Equal values are dropped without notification.
    pub fn set(&self, value: impl Into<Value>) {
        let value = value.into();
        let previous = self.inner.value.read().clone();
        if !self.inner.subscribable.is_different(&previous, &value) {
            return;
        }

        *self.inner.value.write() = value.clone();
        self.inner.subscribable.notify_change(previous, value);
    }

    /// Write a value computed from the current one.
    pub fn update<F>(&self, f: F)
    where
        F: FnOnce(&Value) -> Value,
    {
        let next = f(&self.inner.value.read());
        self.set(next);
    }

    /// Announce the current value as a change, e.g. after mutating an
    /// opaque value in place.
    pub fn value_has_mutated(&self) {
        let current = self.peek();
        self.inner.subscribable.notify_change(current.clone(), current);
    }

    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.inner.subscribable.subscribe(callback)
    }
}

impl ReactiveCell for Observable {
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
        self.set(value);
        Ok(())
    }

    fn to_target(&self) -> Target {
        Arc::new(self.clone())
    }
}

impl Debug for Observable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observable")
            .field("id", &self.id())
            .field("value", &self.peek())
            .field("subscriber_count", &self.subscribable().subscriber_count())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
