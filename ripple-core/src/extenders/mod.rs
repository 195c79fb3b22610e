//! Extenders
//!
//! Named transformations that change how a reactive cell times its writes,
//! evaluations and change announcements.
//!
//! # How Extending Works
//!
//! 1. A caller builds an [`ExtenderConfig`], an ordered map from extender
//!    name to options.
//!
//! 2. [`apply_extenders`] walks the entries in order and looks each name up
//!    in the registry. Unknown names are skipped.
//!
//! 3. Each handler receives the current target. A handler that returns a new
//!    cell replaces the target for the remaining entries; one that returns
//!    `None` has configured the target in place.
//!
//! # Example
//!
//! ```rust
//! use ripple_core::extenders::{Extendable, ExtenderConfig};
//! use ripple_core::reactive::{Observable, ReactiveCell};
//! use ripple_core::timing::{self, VirtualScheduler};
//! use ripple_core::Value;
//!
//! let clock = VirtualScheduler::new();
//! let _guard = timing::enter(clock.clone());
//!
//! let name = Observable::new("Ada").to_target();
//! let throttled = name.extend(&ExtenderConfig::new().with("throttle", 100));
//!
//! throttled.write(Value::from("Grace")).unwrap();
//! assert_eq!(name.peek(), Value::from("Ada"));
//!
//! clock.advance_ms(100);
//! assert_eq!(name.peek(), Value::from("Grace"));
//! ```

pub mod builtin;
mod config;
mod registry;

pub use config::{
    timeout_millis, ExtenderConfig, NotifyWhen, Options, RateLimitConfig, RateLimitMethod,
    RateLimitSettings,
};
pub use registry::{lookup_extender, register_extender, registered_extenders, NOTIFY, RATE_LIMIT, THROTTLE};

use tracing::{debug, trace};

use crate::reactive::Target;

/// A named cell transformation.
///
/// Any `Fn(&Target, &Options) -> Option<Target>` is an extender.
pub trait Extender: Send + Sync {
    /// Apply to `target`. Return `Some` to replace the target, `None` to keep
    /// it.
    fn apply(&self, target: &Target, options: &Options) -> Option<Target>;
}

impl<F> Extender for F
where
    F: Fn(&Target, &Options) -> Option<Target> + Send + Sync,
{
    fn apply(&self, target: &Target, options: &Options) -> Option<Target> {
        self(target, options)
    }
}

/// Fold `target` through every extender named in `config`, in order.
///
/// With no config, or an empty one, the target is returned unchanged.
pub fn apply_extenders(target: Target, config: Option<&ExtenderConfig>) -> Target {
    let Some(config) = config else {
        return target;
    };

    config.iter().fold(target, |current, (name, options)| {
        let Some(extender) = lookup_extender(name) else {
            debug!(extender = %name, "no extender registered under this name; skipping");
            return current;
        };
        trace!(extender = %name, cell = %current.id(), %options, "applying extender");
        extender.apply(&current, options).unwrap_or(current)
    })
}

/// Method-call form of [`apply_extenders`].
pub trait Extendable {
    fn extend(&self, config: &ExtenderConfig) -> Target;
}

impl Extendable for Target {
    fn extend(&self, config: &ExtenderConfig) -> Target {
        apply_extenders(self.clone(), Some(config))
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::{Observable, ReactiveCell};
    use crate::timing::{self, VirtualScheduler};
    use crate::value::Value;
    use parking_lot::Mutex;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn missing_config_returns_the_target() {
        let _clock = timing::enter(VirtualScheduler::new());
        let target = Observable::new(1).to_target();

        let same = apply_extenders(target.clone(), None);
        assert!(Arc::ptr_eq(&same, &target));

        let same = apply_extenders(target.clone(), Some(&ExtenderConfig::new()));
        assert!(Arc::ptr_eq(&same, &target));
    }

    #[test]
    fn unknown_names_are_ignored() {
        let _clock = timing::enter(VirtualScheduler::new());
        let target = Observable::new(1).to_target();
        let config = ExtenderConfig::new()
            .with("pipeline_test_nonexistent", json!({"anything": true}))
            .with("notify", "always");

        let result = target.extend(&config);
        assert!(Arc::ptr_eq(&result, &target));
        assert!(target.subscribable().equality_comparer().is_none());
    }

    #[test]
    fn in_place_extenders_keep_the_target() {
        let _clock = timing::enter(VirtualScheduler::new());
        let target = Observable::new(1).to_target();
        let config = ExtenderConfig::new().with("rateLimit", 50).with("notify", "always");

        let result = target.extend(&config);
        assert!(Arc::ptr_eq(&result, &target));
        assert!(target.subscribable().is_limited());
    }

    #[test]
    fn later_extenders_see_the_replaced_target() {
        let _clock = timing::enter(VirtualScheduler::new());
        let target = Observable::new(1).to_target();
        let config = ExtenderConfig::new().with("throttle", 100).with("rateLimit", 50);

        let result = target.extend(&config);
        assert!(!Arc::ptr_eq(&result, &target));
        assert!(result.subscribable().is_limited());
        assert!(!target.subscribable().is_limited());
        assert_eq!(
            target.subscribable().throttle_evaluation(),
            Some(Duration::from_millis(100))
        );
    }

    #[test]
    fn entries_apply_in_declaration_order() {
        let _clock = timing::enter(VirtualScheduler::new());
        let order = Arc::new(Mutex::new(Vec::new()));

        for name in ["pipeline_test_first", "pipeline_test_second"] {
            let order = order.clone();
            register_extender(name, move |_: &Target, _: &Options| -> Option<Target> {
                order.lock().push(name);
                None
            });
        }

        let target = Observable::new(Value::Null).to_target();
        let config = ExtenderConfig::new()
            .with("pipeline_test_second", true)
            .with("pipeline_test_first", true);
        target.extend(&config);
        assert_eq!(*order.lock(), ["pipeline_test_second", "pipeline_test_first"]);
    }
}
