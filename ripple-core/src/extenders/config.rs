//! Extender configuration.
//!
//! A configuration maps extender names to option values. Options are JSON
//! values because their shape depends on the extender: `throttle` takes a
//! number, `notify` a string, and `rateLimit` a number or an object.
//!
//! ```rust
//! use ripple_core::extenders::ExtenderConfig;
//!
//! let config = ExtenderConfig::from_json(
//!     r#"{ "throttle": 100, "notify": "always" }"#,
//! ).unwrap();
//! let names: Vec<_> = config.iter().map(|(name, _)| name.as_str()).collect();
//! assert_eq!(names, ["throttle", "notify"]);
//! ```

use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use crate::error::Result;
use crate::timing::millis;

/// Options for a single extender.
pub type Options = serde_json::Value;

/// Extender name to options, applied in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtenderConfig(IndexMap<String, Options>);

impl ExtenderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry, builder style.
    pub fn with(mut self, name: impl Into<String>, options: impl Into<Options>) -> Self {
        self.insert(name, options);
        self
    }

    /// Add or replace an entry. A replaced entry keeps its position.
    pub fn insert(&mut self, name: impl Into<String>, options: impl Into<Options>) {
        self.0.insert(name.into(), options.into());
    }

    /// Parse a JSON object of `name: options` pairs.
    pub fn from_json(source: &str) -> Result<Self> {
        Ok(serde_json::from_str(source)?)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Options)> {
        self.0.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Options> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, Options)> for ExtenderConfig {
    fn from_iter<I: IntoIterator<Item = (K, Options)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Read a millisecond timeout. Numbers are taken as is and numeric strings
/// are parsed, the way host timers coerce their delay argument.
pub fn timeout_millis(options: &Options) -> Option<f64> {
    match options {
        Options::Number(n) => n.as_f64(),
        Options::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

// ----------------------------------------------------------------------------
// rateLimit options
// ----------------------------------------------------------------------------

/// How a rate-limited cell spaces out its change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RateLimitMethod {
    /// At most one notification per timeout window.
    #[default]
    Throttle,
    /// One notification once changes have stopped for the timeout.
    NotifyWhenChangesStop,
}

impl RateLimitMethod {
    pub const NOTIFY_WHEN_CHANGES_STOP: &'static str = "notifyWhenChangesStop";

    /// Map a method name. Anything but `notifyWhenChangesStop` throttles.
    pub fn from_name(name: Option<&str>) -> Self {
        match name {
            Some(Self::NOTIFY_WHEN_CHANGES_STOP) => RateLimitMethod::NotifyWhenChangesStop,
            _ => RateLimitMethod::Throttle,
        }
    }
}

/// `rateLimit` options in either accepted shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RateLimitConfig {
    /// A bare timeout in milliseconds.
    Timeout(f64),
    /// Timeout and method given explicitly.
    Detailed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        method: Option<String>,
    },
}

/// Normalized `rateLimit` options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSettings {
    pub timeout: Duration,
    pub method: RateLimitMethod,
}

impl RateLimitConfig {
    /// Read options permissively: numbers are bare timeouts, objects supply
    /// `timeout` and `method` fields, a numeric-string `timeout` field is
    /// parsed, and anything else is treated as absent.
    pub fn from_options(options: &Options) -> Self {
        match options {
            Options::Number(n) => RateLimitConfig::Timeout(n.as_f64().unwrap_or_default()),
            Options::Object(fields) => RateLimitConfig::Detailed {
                timeout: fields.get("timeout").and_then(timeout_millis),
                method: fields
                    .get("method")
                    .and_then(Options::as_str)
                    .map(str::to_owned),
            },
            _ => RateLimitConfig::Detailed {
                timeout: None,
                method: None,
            },
        }
    }

    /// Collapse to a single `(timeout, method)` pair.
    ///
    /// A missing timeout passes through as a zero delay.
    pub fn settings(&self) -> RateLimitSettings {
        let (timeout, method) = match self {
            RateLimitConfig::Timeout(timeout) => (Some(*timeout), None),
            RateLimitConfig::Detailed { timeout, method } => (*timeout, method.as_deref()),
        };
        if timeout.is_none() {
            warn!("rateLimit options carry no timeout; notifications will be deferred by zero");
        }
        RateLimitSettings {
            timeout: millis(timeout.unwrap_or_default()),
            method: RateLimitMethod::from_name(method),
        }
    }
}

impl From<RateLimitConfig> for Options {
    fn from(config: RateLimitConfig) -> Self {
        match config {
            RateLimitConfig::Timeout(timeout) => json!(timeout),
            RateLimitConfig::Detailed { timeout, method } => {
                let mut fields = serde_json::Map::new();
                if let Some(timeout) = timeout {
                    fields.insert("timeout".into(), json!(timeout));
                }
                if let Some(method) = method {
                    fields.insert("method".into(), json!(method));
                }
                Options::Object(fields)
            }
        }
    }
}

// ----------------------------------------------------------------------------
// notify options
// ----------------------------------------------------------------------------

/// When a cell announces writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotifyWhen {
    /// Only when the new value differs from the old one.
    #[default]
    Changed,
    /// On every write, even of an equal value.
    Always,
}

impl NotifyWhen {
    pub fn from_options(options: &Options) -> Self {
        match options.as_str() {
            Some("always") => NotifyWhen::Always,
            _ => NotifyWhen::Changed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_preserves_declaration_order() {
        let config = ExtenderConfig::from_json(r#"{"notify": "always", "throttle": 5, "rateLimit": 1}"#).unwrap();
        let names: Vec<_> = config.iter().map(|(name, _)| name.clone()).collect();
        assert_eq!(names, vec!["notify", "throttle", "rateLimit"]);
    }

    #[test]
    fn builder_matches_parsed_config() {
        let built = ExtenderConfig::new()
            .with("throttle", 100)
            .with("rateLimit", RateLimitConfig::Detailed {
                timeout: Some(200.0),
                method: Some("notifyWhenChangesStop".into()),
            });
        let parsed = ExtenderConfig::from_json(
            r#"{"throttle": 100, "rateLimit": {"timeout": 200.0, "method": "notifyWhenChangesStop"}}"#,
        )
        .unwrap();
        assert_eq!(built, parsed);
    }

    #[test]
    fn invalid_json_is_a_config_error() {
        let err = ExtenderConfig::from_json("{ throttle: }").unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
        assert!(ExtenderConfig::from_json("[1, 2]").is_err());
    }

    #[test]
    fn bare_number_equals_object_with_timeout() {
        let bare = RateLimitConfig::from_options(&json!(200)).settings();
        let object = RateLimitConfig::from_options(&json!({"timeout": 200})).settings();
        assert_eq!(bare, object);
        assert_eq!(bare.timeout, Duration::from_millis(200));
        assert_eq!(bare.method, RateLimitMethod::Throttle);
    }

    #[test]
    fn method_selects_debounce_only_for_exact_name() {
        let settings = |method: &str| {
            RateLimitConfig::from_options(&json!({"timeout": 10, "method": method})).settings().method
        };
        assert_eq!(settings("notifyWhenChangesStop"), RateLimitMethod::NotifyWhenChangesStop);
        assert_eq!(settings("notifyAtFixedRate"), RateLimitMethod::Throttle);
        assert_eq!(settings("NotifyWhenChangesStop"), RateLimitMethod::Throttle);
    }

    #[test]
    fn malformed_rate_limit_options_pass_through_as_zero() {
        for options in [json!({}), json!({"timeout": "soon"}), json!("fast"), json!(null)] {
            let settings = RateLimitConfig::from_options(&options).settings();
            assert_eq!(settings.timeout, Duration::ZERO, "options: {options}");
            assert_eq!(settings.method, RateLimitMethod::Throttle);
        }
    }

    #[test]
    fn numeric_string_timeout_field_is_parsed() {
        let settings = RateLimitConfig::from_options(&json!({"timeout": "200"})).settings();
        assert_eq!(settings.timeout, Duration::from_millis(200));

        let settings = RateLimitConfig::from_options(&json!({"timeout": " 12.5 "})).settings();
        assert_eq!(settings.timeout, Duration::from_micros(12_500));
    }

    #[test]
    fn bare_string_is_not_a_timeout() {
        let settings = RateLimitConfig::from_options(&json!("200")).settings();
        assert_eq!(settings.timeout, Duration::ZERO);
    }

    #[test]
    fn timeout_millis_reads_numbers_and_numeric_strings() {
        assert_eq!(timeout_millis(&json!(150)), Some(150.0));
        assert_eq!(timeout_millis(&json!("150")), Some(150.0));
        assert_eq!(timeout_millis(&json!("soon")), None);
        assert_eq!(timeout_millis(&json!(true)), None);
        assert_eq!(timeout_millis(&json!(null)), None);
    }

    #[test]
    fn typed_config_deserializes_both_shapes() {
        let bare: RateLimitConfig = serde_json::from_str("150").unwrap();
        assert_eq!(bare, RateLimitConfig::Timeout(150.0));

        let detailed: RateLimitConfig =
            serde_json::from_str(r#"{"method": "notifyWhenChangesStop"}"#).unwrap();
        assert_eq!(
            detailed,
            RateLimitConfig::Detailed {
                timeout: None,
                method: Some("notifyWhenChangesStop".into())
            }
        );
    }

    #[test]
    fn notify_always_only_for_exact_string() {
        assert_eq!(NotifyWhen::from_options(&json!("always")), NotifyWhen::Always);
        assert_eq!(NotifyWhen::from_options(&json!("default")), NotifyWhen::Changed);
        assert_eq!(NotifyWhen::from_options(&json!(true)), NotifyWhen::Changed);
    }
}
