//! Subscription handles.
//!
//! A subscription is a change callback registered on a cell. Handles are
//! cheap to clone and all clones refer to the same registration.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::value::Value;

/// Callback invoked with a cell's new value when it announces a change.
pub type ChangeCallback = Arc<dyn Fn(&Value) + Send + Sync>;

/// Ordered subscriber table shared between a cell and its subscription handles.
pub(crate) type SubscriberMap = RwLock<IndexMap<SubscriberId, ChangeCallback>>;

/// Unique identifier for a subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Generate a new unique subscriber ID.
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

/// A registered change callback.
///
/// Dropping the handle does not unsubscribe; call [`Subscription::dispose`].
#[derive(Clone)]
pub struct Subscription {
    id: SubscriberId,
    table: Weak<SubscriberMap>,
}

impl Subscription {
    pub(crate) fn new(id: SubscriberId, table: &Arc<SubscriberMap>) -> Self {
        Self {
            id,
            table: Arc::downgrade(table),
        }
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Remove the callback from its cell. Safe to call more than once.
    pub fn dispose(&self) {
        if let Some(table) = self.table.upgrade() {
            table.write().shift_remove(&self.id);
        }
    }

    /// Whether the callback is no longer registered.
    pub fn is_disposed(&self) -> bool {
        self.table
            .upgrade()
            .map_or(true, |table| !table.read().contains_key(&self.id))
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
