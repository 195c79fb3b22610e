//! Extender Registry
//!
//! The process-wide table that maps extender names to handlers.
//!
//! # How Lookup Works
//!
//! 1. The table is created on first access and seeded with the built-in
//!    `throttle`, `rateLimit` and `notify` handlers.
//!
//! 2. [`register_extender`] adds a handler or replaces the one already
//!    registered under that name. Replacing a built-in is allowed.
//!
//! 3. [`apply_extenders`](super::apply_extenders) resolves each configured
//!    name with [`lookup_extender`]. Handlers are cloned out of the table
//!    before they run, so a handler may itself register or look up extenders.

use std::sync::{Arc, OnceLock};

use indexmap::IndexMap;
use parking_lot::RwLock;
use tracing::debug;

use super::builtin;
use super::Extender;

/// Name under which the throttle extender is registered.
pub const THROTTLE: &str = "throttle";
/// Name under which the rate-limit extender is registered.
pub const RATE_LIMIT: &str = "rateLimit";
/// Name under which the notify extender is registered.
pub const NOTIFY: &str = "notify";

type ExtenderTable = RwLock<IndexMap<String, Arc<dyn Extender>>>;

static EXTENDERS: OnceLock<ExtenderTable> = OnceLock::new();

fn get_extenders() -> &'static ExtenderTable {
    EXTENDERS.get_or_init(|| {
        let mut table: IndexMap<String, Arc<dyn Extender>> = IndexMap::new();
        table.insert(THROTTLE.to_owned(), Arc::new(builtin::throttle));
        table.insert(RATE_LIMIT.to_owned(), Arc::new(builtin::rate_limit));
        table.insert(NOTIFY.to_owned(), Arc::new(builtin::notify));
        RwLock::new(table)
    })
}

/// Register `extender` under `name`, returning the handler it replaced.
pub fn register_extender<E>(name: impl Into<String>, extender: E) -> Option<Arc<dyn Extender>>
where
    E: Extender + 'static,
{
    let name = name.into();
    debug!(extender = %name, "registering extender");
    get_extenders().write().insert(name, Arc::new(extender))
}

/// Find the handler registered under `name`.
pub fn lookup_extender(name: &str) -> Option<Arc<dyn Extender>> {
    get_extenders().read().get(name).cloned()
}

/// Names of all registered extenders, built-ins first.
pub fn registered_extenders() -> Vec<String> {
    get_extenders().read().keys().cloned().collect()
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
