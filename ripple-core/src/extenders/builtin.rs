//! Built-in extenders: `throttle`, `rateLimit` and `notify`.
//!
//! Each comes in two forms: a registry handler taking JSON options, and a
//! typed function for callers that already hold normalized settings.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::config::{
    timeout_millis, NotifyWhen, Options, RateLimitConfig, RateLimitMethod, RateLimitSettings,
};
use crate::reactive::{default_comparer, Computed, ReactiveCell, Target};
use crate::timing::{millis, Debounce, NotifyCallback, RateLimit, Throttle};
use crate::value::Value;

/// `throttle` handler. Options: a timeout in milliseconds, as a number or a
/// numeric string.
pub fn throttle(target: &Target, options: &Options) -> Option<Target> {
    let timeout = match timeout_millis(options) {
        Some(ms) => millis(ms),
        None => {
            warn!(%options, "throttle timeout is not numeric; writes will be deferred by zero");
            Duration::ZERO
        }
    };
    Some(throttle_cell(target, timeout))
}

/// Throttle a cell's evaluation and debounce writes to it.
///
/// The target's evaluation delay is set to `timeout`, so a computed target
/// re-evaluates at most once per quiet period. The returned cell reads through
/// to the target; writing it schedules the write to the target after
/// `timeout`, and a write arriving before then replaces the scheduled value.
pub fn throttle_cell(target: &Target, timeout: Duration) -> Target {
    target
        .subscribable()
        .set_throttle_evaluation((!timeout.is_zero()).then_some(timeout));

    let scheduler = target.subscribable().scheduler();
    let latest: Arc<Mutex<Option<Value>>> = Arc::new(Mutex::new(None));
    let deferred_write = {
        let target = Arc::clone(target);
        let latest = Arc::clone(&latest);
        Debounce::with_scheduler(
            Arc::new(move || {
                let value = latest.lock().take();
                if let Some(value) = value {
                    if let Err(err) = target.write(value) {
                        warn!(cell = %target.id(), %err, "throttled write failed");
                    }
                }
            }),
            timeout,
            Arc::clone(&scheduler),
        )
    };

    let read_target = Arc::clone(target);
    Computed::writable_with_scheduler(
        move || read_target.read(),
        move |value| {
            *latest.lock() = Some(value);
            deferred_write.trigger();
        },
        scheduler,
    )
    .to_target()
}

/// `rateLimit` handler. Options: a timeout in milliseconds, or an object with
/// `timeout` and an optional `method`.
pub fn rate_limit(target: &Target, options: &Options) -> Option<Target> {
    rate_limit_cell(target, RateLimitConfig::from_options(options).settings());
    None
}

/// Route a cell's change notifications through a throttle or debounce.
pub fn rate_limit_cell(target: &Target, settings: RateLimitSettings) {
    let subscribable = target.subscribable();
    let scheduler = subscribable.scheduler();
    debug!(cell = %target.id(), ?settings, "rate limiting notifications");

    subscribable.limit(move |callback: NotifyCallback| -> Arc<dyn RateLimit> {
        match settings.method {
            RateLimitMethod::NotifyWhenChangesStop => {
                Arc::new(Debounce::with_scheduler(callback, settings.timeout, scheduler))
            }
            RateLimitMethod::Throttle => {
                Arc::new(Throttle::with_scheduler(callback, settings.timeout, scheduler))
            }
        }
    });
}

/// `notify` handler. Options: `"always"`, or anything else for the default.
pub fn notify(target: &Target, options: &Options) -> Option<Target> {
    notify_cell(target, NotifyWhen::from_options(options));
    None
}

/// Choose whether equal writes are announced.
pub fn notify_cell(target: &Target, when: NotifyWhen) {
    let comparer = match when {
        NotifyWhen::Always => None,
        NotifyWhen::Changed => Some(default_comparer()),
    };
    target.subscribable().set_equality_comparer(comparer);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Observable;
    use crate::timing::{self, VirtualScheduler};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(target: &Target) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        target.subscribe(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        count
    }

    #[test]
    fn throttle_returns_a_new_cell_reading_the_target() {
        let _clock = timing::enter(VirtualScheduler::new());
        let target = Observable::new("a").to_target();

        let throttled = throttle(&target, &json!(100)).unwrap();
        assert_ne!(throttled.id(), target.id());
        assert!(throttled.is_computed());
        assert_eq!(throttled.read(), Value::from("a"));
        assert_eq!(
            target.subscribable().throttle_evaluation(),
            Some(Duration::from_millis(100))
        );
    }

    #[test]
    fn throttle_accepts_a_numeric_string_timeout() {
        let clock = VirtualScheduler::new();
        let _guard = timing::enter(clock.clone());
        let target = Observable::new(0).to_target();

        let throttled = throttle(&target, &json!("200")).unwrap();
        assert_eq!(
            target.subscribable().throttle_evaluation(),
            Some(Duration::from_millis(200))
        );

        throttled.write(Value::from(1)).unwrap();
        clock.advance_ms(199);
        assert_eq!(target.peek(), Value::from(0));
        clock.advance_ms(1);
        assert_eq!(target.peek(), Value::from(1));
    }

    #[test]
    fn throttled_writes_apply_the_latest_value_once() {
        let clock = VirtualScheduler::new();
        let _guard = timing::enter(clock.clone());
        let target = Observable::new(0).to_target();
        let target_notifications = counting(&target);
        let throttled = throttle(&target, &json!(100)).unwrap();

        throttled.write(Value::from(1)).unwrap();
        throttled.write(Value::from(2)).unwrap();
        throttled.write(Value::from(3)).unwrap();
        assert_eq!(target.peek(), Value::from(0));
        assert_eq!(throttled.peek(), Value::from(0));

        clock.advance_ms(100);
        assert_eq!(target.peek(), Value::from(3));
        assert_eq!(throttled.peek(), Value::from(3));
        assert_eq!(target_notifications.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn throttle_of_a_computed_delays_its_evaluation() {
        let clock = VirtualScheduler::new();
        let _guard = timing::enter(clock.clone());
        let source = Observable::new(1);
        let derived = Computed::new({
            let source = source.clone();
            move || source.get()
        })
        .to_target();

        let throttled = throttle(&derived, &json!(50)).unwrap();
        source.set(2);
        source.set(3);
        assert_eq!(throttled.read(), Value::from(1));

        clock.advance_ms(50);
        assert_eq!(derived.peek(), Value::from(3));
        assert_eq!(throttled.read(), Value::from(3));
    }

    #[test]
    fn throttle_of_a_read_only_computed_logs_failed_writes() {
        let clock = VirtualScheduler::new();
        let _guard = timing::enter(clock.clone());
        let derived = Computed::new(|| 1).to_target();
        let throttled = throttle(&derived, &json!(10)).unwrap();

        throttled.write(Value::from(5)).unwrap();
        clock.advance_ms(10);
        assert_eq!(derived.peek(), Value::from(1));
    }

    #[test]
    fn rate_limit_keeps_the_target() {
        let _clock = timing::enter(VirtualScheduler::new());
        let target = Observable::new(0).to_target();
        assert!(rate_limit(&target, &json!(200)).is_none());
        assert!(target.subscribable().is_limited());
    }

    #[test]
    fn rate_limit_throttles_notifications_not_writes() {
        let clock = VirtualScheduler::new();
        let _guard = timing::enter(clock.clone());
        let target = Observable::new(0).to_target();
        let notifications = counting(&target);
        rate_limit(&target, &json!(200));

        target.write(Value::from(1)).unwrap();
        assert_eq!(target.peek(), Value::from(1));
        clock.advance_ms(100);
        target.write(Value::from(2)).unwrap();
        assert_eq!(notifications.load(Ordering::SeqCst), 0);

        clock.advance_ms(100);
        assert_eq!(notifications.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn rate_limit_debounces_with_notify_when_changes_stop() {
        let clock = VirtualScheduler::new();
        let _guard = timing::enter(clock.clone());
        let target = Observable::new(0).to_target();
        let notifications = counting(&target);
        rate_limit(&target, &json!({"timeout": 200, "method": "notifyWhenChangesStop"}));

        target.write(Value::from(1)).unwrap();
        clock.advance_ms(150);
        target.write(Value::from(2)).unwrap();
        clock.advance_ms(150);
        assert_eq!(notifications.load(Ordering::SeqCst), 0);

        clock.advance_ms(50);
        assert_eq!(notifications.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn notify_always_removes_the_comparer() {
        let _clock = timing::enter(VirtualScheduler::new());
        let target = Observable::new(1).to_target();
        let notifications = counting(&target);

        assert!(notify(&target, &json!("always")).is_none());
        target.write(Value::from(1)).unwrap();
        target.write(Value::from(1)).unwrap();
        assert_eq!(notifications.load(Ordering::SeqCst), 2);

        notify(&target, &json!("default"));
        target.write(Value::from(1)).unwrap();
        assert_eq!(notifications.load(Ordering::SeqCst), 2);
    }
}
