//! Equality and relational comparison.

use crate::Result;
use crate::runtime::value::{Value, string_to_number};

/// Abstract equality comparison (`==`).
///
/// Objects are compared with primitives through their primitive value; an
/// object without one is unequal to every primitive.
pub fn abstract_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
        (Value::Boolean(a), Value::Boolean(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),

        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            *n == string_to_number(s)
        }

        (Value::Boolean(flag), other) | (other, Value::Boolean(flag)) => {
            let num = if *flag { 1.0 } else { 0.0 };
            abstract_equals(&Value::Number(num), other)
        }

        (Value::Object(_), Value::Number(_) | Value::String(_)) => match a.to_primitive() {
            Ok(primitive) => abstract_equals(&primitive, b),
            Err(_) => false,
        },
        (Value::Number(_) | Value::String(_), Value::Object(_)) => match b.to_primitive() {
            Ok(primitive) => abstract_equals(a, &primitive),
            Err(_) => false,
        },

        _ => false,
    }
}

/// Strict equality comparison (`===`).
pub fn strict_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
        (Value::Boolean(a), Value::Boolean(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
        _ => false,
    }
}

/// Abstract relational comparison: is `a < b`?
///
/// Returns `None` when either side converts to NaN, which makes every
/// relational operator false.
pub fn less_than(a: &Value, b: &Value) -> Result<Option<bool>> {
    let a = a.to_primitive()?;
    let b = b.to_primitive()?;
    if let (Value::String(a), Value::String(b)) = (&a, &b) {
        return Ok(Some(a < b));
    }
    let a = a.to_number()?;
    let b = b.to_number()?;
    if a.is_nan() || b.is_nan() {
        Ok(None)
    } else {
        Ok(Some(a < b))
    }
}
