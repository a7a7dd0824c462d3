//! Value representation and the type conversions over it.

use std::fmt;

use super::object::{ObjectKind, ObjectRef};
use crate::{Error, Result};

/// A dynamically typed value.
///
/// Primitives are copied on assignment; objects are shared references, so a
/// mutation through one holder is visible through every other.
#[derive(Debug, Clone)]
pub enum Value {
    /// undefined, also used for "no value"
    Undefined,
    /// null
    Null,
    /// Boolean value
    Boolean(bool),
    /// Number (IEEE 754 double)
    Number(f64),
    /// String
    String(String),
    /// Shared object reference
    Object(ObjectRef),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            // NaN is unequal to itself, as in strict equality
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl Value {
    /// Returns true if this value is undefined.
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Returns true if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns true if this value is nullish (null or undefined).
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Returns true if this value is an object of function type.
    pub fn is_function(&self) -> bool {
        match self {
            Value::Object(object) => object.is_function(),
            _ => false,
        }
    }

    /// Returns the boolean payload, failing on any other tag.
    pub fn as_boolean(&self) -> Result<bool> {
        match self {
            Value::Boolean(b) => Ok(*b),
            other => Err(other.tag_mismatch("boolean")),
        }
    }

    /// Returns the number payload, failing on any other tag.
    pub fn as_number(&self) -> Result<f64> {
        match self {
            Value::Number(n) => Ok(*n),
            other => Err(other.tag_mismatch("number")),
        }
    }

    /// Returns the string payload, failing on any other tag.
    pub fn as_str(&self) -> Result<&str> {
        match self {
            Value::String(s) => Ok(s),
            other => Err(other.tag_mismatch("string")),
        }
    }

    /// Returns the object payload, failing on any other tag.
    pub fn as_object(&self) -> Result<&ObjectRef> {
        match self {
            Value::Object(object) => Ok(object),
            other => Err(other.tag_mismatch("object")),
        }
    }

    fn tag_mismatch(&self, expected: &str) -> Error {
        Error::TypeError(format!("expected {}, found {}", expected, self.type_of()))
    }

    /// Converts the value to a boolean (ToBoolean).
    pub fn to_boolean(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Number(n) => !n.is_nan() && *n != 0.0,
            Value::String(s) => !s.is_empty(),
            Value::Object(_) => true,
        }
    }

    /// Converts the value to a number (ToNumber).
    pub fn to_number(&self) -> Result<f64> {
        Ok(match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::String(s) => string_to_number(s),
            Value::Object(_) => return self.to_primitive()?.to_number(),
        })
    }

    /// Converts the value to an integral number (ToInteger).
    pub fn to_integer(&self) -> Result<f64> {
        let n = self.to_number()?;
        Ok(if n.is_nan() { 0.0 } else { n.trunc() })
    }

    /// Converts the value to a signed 32-bit integer (ToInt32).
    pub fn to_int32(&self) -> Result<i32> {
        Ok(self.to_uint32()? as i32)
    }

    /// Converts the value to an unsigned 32-bit integer (ToUint32).
    pub fn to_uint32(&self) -> Result<u32> {
        let n = self.to_number()?;
        if !n.is_finite() {
            return Ok(0);
        }
        Ok(n.trunc().rem_euclid(4_294_967_296.0) as u32)
    }

    /// Converts the value to a string (ToString).
    pub fn to_js_string(&self) -> Result<String> {
        Ok(match self {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Number(n) => number_to_string(*n),
            Value::String(s) => s.clone(),
            Value::Object(_) => return self.to_primitive()?.to_js_string(),
        })
    }

    /// Converts the value to a primitive (ToPrimitive).
    ///
    /// Boxed booleans, numbers and strings unwrap to their primitive; any
    /// other object has no primitive form.
    pub fn to_primitive(&self) -> Result<Value> {
        let Value::Object(object) = self else {
            return Ok(self.clone());
        };
        match &object.borrow().kind {
            ObjectKind::Boolean(b) => Ok(Value::Boolean(*b)),
            ObjectKind::Number(n) => Ok(Value::Number(*n)),
            ObjectKind::String(s) => Ok(Value::String(s.clone())),
            kind => Err(Error::TypeError(format!(
                "cannot convert {} to a primitive value",
                kind.class_name()
            ))),
        }
    }

    /// Returns the type of this value as a string.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object", // Historical quirk
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(object) if object.is_function() => "function",
            Value::Object(_) => "object",
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Undefined
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<ObjectRef> for Value {
    fn from(object: ObjectRef) -> Self {
        Value::Object(object)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Number(n) => write!(f, "{}", number_to_string(*n)),
            Value::String(s) => write!(f, "{}", s),
            Value::Object(object) => write!(f, "{}", object),
        }
    }
}

/// Best-effort string to number conversion.
///
/// Accepts surrounding whitespace, an optional sign, decimal and exponent
/// notation, `Infinity` and `0x` hex. Empty text is `0`; anything else is NaN.
pub fn string_to_number(text: &str) -> f64 {
    let text = text.trim();
    if text.is_empty() {
        return 0.0;
    }

    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16)
            .map(|n| n as f64)
            .unwrap_or(f64::NAN);
    }

    let (sign, body) = match text.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, text.strip_prefix('+').unwrap_or(text)),
    };
    if body == "Infinity" {
        return sign * f64::INFINITY;
    }

    // Rust's float parser also accepts "inf" and "nan", which are not numbers here.
    let numeric = body
        .bytes()
        .all(|b| b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-'));
    if !numeric {
        return f64::NAN;
    }
    body.parse::<f64>().map(|n| sign * n).unwrap_or(f64::NAN)
}

/// Formats a number the way ToString does.
///
/// Uses the shortest digit string that round-trips, switching to exponent
/// notation outside `1e-7 <= |n| < 1e21`.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }

    let sign = if n < 0.0 { "-" } else { "" };
    // `{:e}` yields the shortest round-trip digits, e.g. "1.2345e3".
    let formatted = format!("{:e}", n.abs());
    let (mantissa, exponent) = formatted.split_once('e').unwrap_or((&formatted, "0"));
    let digits: String = mantissa.chars().filter(|c| *c != '.').collect();
    let exponent: i32 = exponent.parse().unwrap_or(0);

    let k = digits.len() as i32;
    let point = exponent + 1;

    let body = if k <= point && point <= 21 {
        format!("{}{}", digits, "0".repeat((point - k) as usize))
    } else if 0 < point && point <= 21 {
        let (int, frac) = digits.split_at(point as usize);
        format!("{}.{}", int, frac)
    } else if -6 < point && point <= 0 {
        format!("0.{}{}", "0".repeat((-point) as usize), digits)
    } else {
        let exp_sign = if point - 1 < 0 { "-" } else { "+" };
        let (lead, rest) = digits.split_at(1);
        if rest.is_empty() {
            format!("{}e{}{}", lead, exp_sign, (point - 1).abs())
        } else {
            format!("{}.{}e{}{}", lead, rest, exp_sign, (point - 1).abs())
        }
    };

    format!("{}{}", sign, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::object::Object;

    #[test]
    fn test_to_boolean() {
        assert!(!Value::Undefined.to_boolean());
        assert!(!Value::Null.to_boolean());
        assert!(!Value::Number(0.0).to_boolean());
        assert!(!Value::Number(f64::NAN).to_boolean());
        assert!(!Value::from("").to_boolean());
        assert!(Value::from("0").to_boolean());
        assert!(Value::Object(ObjectRef::new(Object::plain())).to_boolean());
    }

    #[test]
    fn test_to_number() {
        assert!(Value::Undefined.to_number().unwrap().is_nan());
        assert_eq!(Value::Null.to_number().unwrap(), 0.0);
        assert_eq!(Value::Boolean(true).to_number().unwrap(), 1.0);
        assert_eq!(Value::from(" 42 ").to_number().unwrap(), 42.0);
        assert_eq!(Value::from("").to_number().unwrap(), 0.0);
        assert!(Value::from("12abc").to_number().unwrap().is_nan());
    }

    #[test]
    fn test_string_to_number_edge_cases() {
        assert_eq!(string_to_number("-Infinity"), f64::NEG_INFINITY);
        assert_eq!(string_to_number("0x1F"), 31.0);
        assert_eq!(string_to_number("1e3"), 1000.0);
        assert_eq!(string_to_number(".5"), 0.5);
        assert!(string_to_number("inf").is_nan());
        assert!(string_to_number("nan").is_nan());
    }

    #[test]
    fn test_int32_wraps() {
        assert_eq!(Value::Number(4_294_967_295.0).to_int32().unwrap(), -1);
        assert_eq!(Value::Number(-1.0).to_uint32().unwrap(), 4_294_967_295);
        assert_eq!(Value::Number(f64::NAN).to_int32().unwrap(), 0);
        assert_eq!(Value::Number(3.9).to_int32().unwrap(), 3);
    }

    #[test]
    fn test_to_integer() {
        assert_eq!(Value::Number(-3.7).to_integer().unwrap(), -3.0);
        assert_eq!(Value::Undefined.to_integer().unwrap(), 0.0);
    }

    #[test]
    fn test_number_to_string() {
        assert_eq!(number_to_string(5.0), "5");
        assert_eq!(number_to_string(-0.0), "0");
        assert_eq!(number_to_string(0.1), "0.1");
        assert_eq!(number_to_string(123.456), "123.456");
        assert_eq!(number_to_string(1e21), "1e+21");
        assert_eq!(number_to_string(1e20), "100000000000000000000");
        assert_eq!(number_to_string(1.5e-7), "1.5e-7");
        assert_eq!(number_to_string(0.000001), "0.000001");
        assert_eq!(number_to_string(-2.5), "-2.5");
        assert_eq!(number_to_string(f64::INFINITY), "Infinity");
    }

    #[test]
    fn test_to_primitive_unboxes() {
        let boxed = Value::Object(ObjectRef::new(Object::new(ObjectKind::Number(7.0))));
        assert_eq!(boxed.to_primitive().unwrap(), Value::Number(7.0));
        assert_eq!(boxed.to_js_string().unwrap(), "7");
    }

    #[test]
    fn test_to_primitive_of_plain_object_fails() {
        let plain = Value::Object(ObjectRef::new(Object::plain()));
        assert!(matches!(plain.to_primitive(), Err(Error::TypeError(_))));
        assert!(plain.to_number().is_err());
    }

    #[test]
    fn test_tag_checked_accessors() {
        assert_eq!(Value::Number(1.0).as_number().unwrap(), 1.0);
        assert!(matches!(Value::Null.as_number(), Err(Error::TypeError(_))));
        assert_eq!(Value::from("x").as_str().unwrap(), "x");
        assert!(Value::Boolean(true).as_object().is_err());
    }

    #[test]
    fn test_type_of() {
        assert_eq!(Value::Null.type_of(), "object");
        assert_eq!(Value::Undefined.type_of(), "undefined");
        assert_eq!(Value::from("s").type_of(), "string");
    }

    #[test]
    fn test_objects_compare_by_identity() {
        let a = ObjectRef::new(Object::plain());
        let b = ObjectRef::new(Object::plain());
        assert_eq!(Value::Object(a.clone()), Value::Object(a.clone()));
        assert_ne!(Value::Object(a), Value::Object(b));
    }
}
