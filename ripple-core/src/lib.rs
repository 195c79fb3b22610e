//! Ripple Core
//!
//! This crate provides the extender layer for Ripple reactive cells.
//! It implements:
//!
//! - Throttle and debounce scheduling primitives over a pluggable scheduler
//! - Structural change detection for dynamic values
//! - The `throttle`, `rateLimit` and `notify` extenders
//! - A named extender registry and the pipeline that applies it
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `value`: The dynamic values cells hold
//! - `equality`: The default equality comparer
//! - `timing`: Schedulers and rate-limiting primitives
//! - `reactive`: Observable and computed cells
//! - `extenders`: Built-in extenders, the registry, and `apply_extenders`
//!
//! # Example
//!
//! ```rust
//! use ripple_core::extenders::{apply_extenders, ExtenderConfig};
//! use ripple_core::reactive::{Observable, ReactiveCell};
//! use ripple_core::timing::{self, VirtualScheduler};
//!
//! let clock = VirtualScheduler::new();
//! let _guard = timing::enter(clock.clone());
//!
//! let query = Observable::new("").to_target();
//! let config = ExtenderConfig::from_json(
//!     r#"{ "rateLimit": { "timeout": 300, "method": "notifyWhenChangesStop" } }"#,
//! )?;
//! let query = apply_extenders(query, Some(&config));
//! assert!(query.subscribable().is_limited());
//! # Ok::<(), ripple_core::Error>(())
//! ```

pub mod equality;
pub mod error;
pub mod extenders;
pub mod reactive;
pub mod timing;
pub mod value;

pub use equality::values_are_exactly_equal;
pub use error::{Error, Result};
pub use extenders::{apply_extenders, register_extender, Extendable, Extender, ExtenderConfig};
pub use reactive::{Computed, Observable, ReactiveCell, Target};
pub use value::Value;
