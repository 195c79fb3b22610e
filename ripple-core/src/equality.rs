//! Change Detection
//!
//! The default equality comparator decides whether a write to a cell is a
//! "change" worth announcing to subscribers.
//!
//! # Algorithm
//!
//! 1. If either operand is a primitive, compare by identity.
//! 2. Object-typed operands with different constructors are never equal.
//! 3. Dates are equal when their timestamps match.
//! 4. Arrays are equal when their lengths match and their elements are equal.
//! 5. Plain objects are equal when they have the same number of keys and every
//!    key of `a` is owned by `b` with an equal value.
//! 6. Any other constructor falls back to identity.
//!
//! # Index zero
//!
//! The element and key scans run from the last index down to, but not
//! including, index 0. The first array element and the first object key
//! (in insertion order) are never compared. Downstream cells rely on this
//! exact boundary, so it is kept.
//!
//! There is no cycle guard. `Value` trees are acyclic by construction unless
//! an [`Opaque`](crate::value::Opaque) smuggles a cycle in, and opaque values
//! are never descended into.

use crate::value::Value;

/// Structural equality used to suppress redundant change notifications.
pub fn values_are_exactly_equal(a: &Value, b: &Value) -> bool {
    let (Some(ca), Some(cb)) = (a.constructor(), b.constructor()) else {
        return a.is_identical(b);
    };
    if ca != cb {
        return false;
    }

    match (a, b) {
        (Value::Date(x), Value::Date(y)) => x == y,
        (Value::Array(x), Value::Array(y)) => {
            if x.len() != y.len() {
                return false;
            }
            (1..x.len())
                .rev()
                .all(|i| values_are_exactly_equal(&x[i], &y[i]))
        }
        (Value::Object(x), Value::Object(y)) => {
            if x.len() != y.len() {
                return false;
            }
            (1..x.len()).rev().all(|i| {
                let Some((key, value)) = x.get_index(i) else {
                    return false;
                };
                match y.get(key) {
                    Some(other) => values_are_exactly_equal(value, other),
                    None => false,
                }
            })
        }
        _ => a.is_identical(b),
    }
}
