//! Cell Values
//!
//! Cells store a dynamically typed [`Value`]. A single process-wide extender
//! registry serves every cell, so the value type cannot be a generic
//! parameter of the cell.
//!
//! # Object-typed values
//!
//! `Date`, `Array`, `Object` and `Opaque` are "object-typed". Everything else
//! is a primitive and is compared by value. The "constructor" of a value is
//! its variant, and for [`Opaque`] additionally the `TypeId` of the wrapped
//! Rust type.

use std::any::{Any, TypeId};
use std::fmt::{self, Debug};
use std::sync::Arc;

use indexmap::IndexMap;

/// Insertion-ordered map backing [`Value::Object`].
pub type Map = IndexMap<String, Value>;

/// A dynamically typed cell value.
#[derive(Clone, Default)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Arc<str>),
    /// Milliseconds since the Unix epoch.
    Date(i64),
    Array(Vec<Value>),
    Object(Map),
    Opaque(Opaque),
}

/// The constructor of an object-typed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Constructor {
    Date,
    Array,
    Object,
    Custom(TypeId),
}

impl Value {
    /// Create a date value from a millisecond timestamp.
    pub fn date(timestamp_ms: i64) -> Self {
        Value::Date(timestamp_ms)
    }

    /// Create an object value from key/value pairs, preserving their order.
    pub fn object<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        Value::Object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Wrap an arbitrary Rust value. Opaque values only ever compare by identity.
    pub fn opaque<T: Any + Send + Sync>(value: T) -> Self {
        Value::Opaque(Opaque::new(value))
    }

    /// Constructor of this value, or `None` for primitives.
    pub fn constructor(&self) -> Option<Constructor> {
        match self {
            Value::Date(_) => Some(Constructor::Date),
            Value::Array(_) => Some(Constructor::Array),
            Value::Object(_) => Some(Constructor::Object),
            Value::Opaque(opaque) => Some(Constructor::Custom(opaque.type_id())),
            _ => None,
        }
    }

    pub fn is_object(&self) -> bool {
        self.constructor().is_some()
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s.as_ref()),
            _ => None,
        }
    }

    /// Identity comparison.
    ///
    /// Primitives compare by value (`NaN` is never identical to itself and
    /// `0.0` is identical to `-0.0`). Object-typed values are identical only
    /// when they are the same allocation, which a cloned `Array`, `Object` or
    /// `Date` never is; only [`Opaque`] handles share identity.
    pub fn is_identical(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Opaque(a), Value::Opaque(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

/// Plain structural equality, used by tests and diagnostics.
///
/// This is not the change-detection comparator; see
/// [`values_are_exactly_equal`](crate::equality::values_are_exactly_equal).
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            _ => self.is_identical(other),
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{s:?}"),
            Value::Date(ms) => write!(f, "Date({ms})"),
            Value::Array(items) => f.debug_list().entries(items).finish(),
            Value::Object(map) => f.debug_map().entries(map.iter()).finish(),
            Value::Opaque(opaque) => opaque.fmt(f),
        }
    }
}

/// A shared, type-erased custom object.
#[derive(Clone)]
pub struct Opaque {
    type_id: TypeId,
    type_name: &'static str,
    inner: Arc<dyn Any + Send + Sync>,
}

impl Opaque {
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            inner: Arc::new(value),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }

    pub fn ptr_eq(&self, other: &Opaque) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Opaque<{}>", self.type_name)
    }
}

// ----------------------------------------------------------------------------
// Conversions
// ----------------------------------------------------------------------------

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

macro_rules! number_from {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(n: $t) -> Self {
                    Value::Number(n as f64)
                }
            }
        )*
    };
}

number_from!(i32, i64, u32, u64, usize, f32, f64);

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(Arc::from(s))
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(Arc::from(s))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Null, Into::into)
    }
}

impl From<Map> for Value {
    fn from(map: Map) -> Self {
        Value::Object(map)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::from(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}
