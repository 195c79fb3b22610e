//! Reactive Cells
//!
//! The cells extenders operate on.
//!
//! # Concepts
//!
//! ## Observables
//!
//! An [`Observable`] is a writable container for a [`Value`]. Writing a value
//! the equality comparer considers different announces the change to every
//! subscriber.
//!
//! ## Computed cells
//!
//! A [`Computed`] derives its value from a read function. Cells read while it
//! evaluates become its dependencies, and it re-evaluates when any of them
//! announces a change.
//!
//! ## Targets
//!
//! Extenders accept and return [`Target`]s, shared handles to any cell. A
//! target exposes the three slots extenders configure through its
//! [`Subscribable`]: the equality comparer, the evaluation delay, and the
//! notification limiter.
//!
//! # Implementation Notes
//!
//! Dependency detection uses a thread-local stack of evaluating computed
//! cells, so a cell read inside a computed's read function registers itself
//! without any explicit wiring.

mod computed;
mod context;
mod observable;
mod subscribable;
mod subscription;

pub use computed::Computed;
pub use context::ReactiveContext;
pub use observable::Observable;
pub use subscribable::{default_comparer, CellId, EqualityComparer, Subscribable};
pub use subscription::{ChangeCallback, SubscriberId, Subscription};

use std::sync::Arc;

use crate::error::Result;
use crate::value::Value;

/// A shared handle to any reactive cell.
pub type Target = Arc<dyn ReactiveCell>;

/// The contract every reactive cell fulfils.
pub trait ReactiveCell: Send + Sync + 'static {
    /// The cell's change announcement and configuration slots.
    fn subscribable(&self) -> &Subscribable;

    /// Read the current value, registering a dependency if a computed is
    /// evaluating.
    fn read(&self) -> Value;

    /// Read the current value without registering a dependency.
    fn peek(&self) -> Value;

    /// Write a value.
    fn write(&self, value: Value) -> Result<()>;

    /// Whether the value is derived by a read function.
    fn is_computed(&self) -> bool {
        false
    }

    /// A shared handle to this cell.
    fn to_target(&self) -> Target;

    fn id(&self) -> CellId {
        self.subscribable().id()
    }
}

impl dyn ReactiveCell {
    /// Register a change callback.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        self.subscribable().subscribe(callback)
    }
}
