//! String built-in object.
//!
//! Provides the String constructor and prototype methods. String `length`
//! and index access on primitives are handled by the VM's member lookup.

use super::Realm;
use super::boolean::box_value;
use crate::runtime::object::{ObjectKind, ObjectRef};
use crate::runtime::value::Value;
use crate::vm::Vm;
use crate::{Error, Result};

/// Fills in String.prototype.
pub(super) fn init_prototype(realm: &Realm) {
    let proto = &realm.string_prototype;
    realm.define_method(proto, "toString", to_string);
    realm.define_method(proto, "valueOf", to_string);
    realm.define_method(proto, "charAt", char_at);
    realm.define_method(proto, "indexOf", index_of);
    realm.define_method(proto, "toUpperCase", to_upper_case);
    realm.define_method(proto, "toLowerCase", to_lower_case);
}

/// Creates the `String` constructor.
pub fn create_constructor(realm: &Realm) -> ObjectRef {
    realm.constructor(
        "String",
        string_call,
        string_construct,
        &realm.string_prototype,
    )
}

// ============================================================================
// String Constructor
// ============================================================================

/// String(value) - Converts value to a string primitive.
pub fn string_call(_vm: &mut Vm, _this: &Value, args: &[Value]) -> Result<Value> {
    let s = match args.first() {
        Some(v) => v.to_js_string()?,
        None => String::new(),
    };
    Ok(Value::String(s))
}

/// new String(value) - Creates a String wrapper object.
pub fn string_construct(vm: &mut Vm, this: &Value, args: &[Value]) -> Result<Value> {
    let s = string_call(vm, this, args)?;
    box_value(vm, &s)
}

// ============================================================================
// String.prototype Methods
// ============================================================================

/// String.prototype.toString() - Returns the string value.
pub fn to_string(_vm: &mut Vm, this: &Value, _args: &[Value]) -> Result<Value> {
    Ok(Value::String(this_string(this)?))
}

/// String.prototype.charAt(pos) - Returns the character at position, or "".
pub fn char_at(_vm: &mut Vm, this: &Value, args: &[Value]) -> Result<Value> {
    let s = this_string(this)?;
    let pos = match args.first() {
        Some(v) => v.to_integer()?,
        None => 0.0,
    };
    if pos < 0.0 {
        return Ok(Value::String(String::new()));
    }
    Ok(Value::String(
        s.chars()
            .nth(pos as usize)
            .map(|c| c.to_string())
            .unwrap_or_default(),
    ))
}

/// String.prototype.indexOf(searchString, position) - Returns the character
/// index of the first occurrence at or after position, or -1.
pub fn index_of(_vm: &mut Vm, this: &Value, args: &[Value]) -> Result<Value> {
    let s = this_string(this)?;
    let search = match args.first() {
        Some(v) => v.to_js_string()?,
        None => "undefined".to_string(),
    };
    let start = match args.get(1) {
        Some(v) => v.to_integer()?.max(0.0) as usize,
        None => 0,
    };

    let chars: Vec<char> = s.chars().collect();
    let needle: Vec<char> = search.chars().collect();
    let start = start.min(chars.len());
    if needle.is_empty() {
        return Ok(Value::Number(start as f64));
    }
    let found = chars[start..]
        .windows(needle.len())
        .position(|window| window == needle.as_slice());
    Ok(Value::Number(match found {
        Some(i) => (start + i) as f64,
        None => -1.0,
    }))
}

/// String.prototype.toUpperCase() - Returns an upper-cased copy.
pub fn to_upper_case(_vm: &mut Vm, this: &Value, _args: &[Value]) -> Result<Value> {
    Ok(Value::String(this_string(this)?.to_uppercase()))
}

/// String.prototype.toLowerCase() - Returns a lower-cased copy.
pub fn to_lower_case(_vm: &mut Vm, this: &Value, _args: &[Value]) -> Result<Value> {
    Ok(Value::String(this_string(this)?.to_lowercase()))
}

/// The receiver as a string: primitives and String wrappers only.
fn this_string(this: &Value) -> Result<String> {
    match this {
        Value::String(s) => Ok(s.clone()),
        Value::Object(object) => match &object.borrow().kind {
            ObjectKind::String(s) => Ok(s.clone()),
            _ => this.to_js_string(),
        },
        Value::Undefined | Value::Null => Err(Error::TypeError(
            "String.prototype method called on null or undefined".into(),
        )),
        _ => this.to_js_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(f: crate::runtime::NativeFn, this: &str, args: &[Value]) -> Value {
        let mut vm = Vm::new();
        f(&mut vm, &Value::from(this), args).unwrap()
    }

    #[test]
    fn test_char_at() {
        assert_eq!(call(char_at, "abc", &[Value::Number(1.0)]), Value::from("b"));
        assert_eq!(call(char_at, "abc", &[]), Value::from("a"));
        assert_eq!(call(char_at, "abc", &[Value::Number(5.0)]), Value::from(""));
        assert_eq!(call(char_at, "abc", &[Value::Number(-1.0)]), Value::from(""));
    }

    #[test]
    fn test_index_of() {
        assert_eq!(call(index_of, "hello", &[Value::from("l")]), Value::Number(2.0));
        assert_eq!(
            call(index_of, "hello", &[Value::from("l"), Value::Number(3.0)]),
            Value::Number(3.0)
        );
        assert_eq!(call(index_of, "hello", &[Value::from("z")]), Value::Number(-1.0));
        assert_eq!(call(index_of, "hello", &[Value::from("")]), Value::Number(0.0));
    }

    #[test]
    fn test_case_conversion() {
        assert_eq!(call(to_upper_case, "MiXed", &[]), Value::from("MIXED"));
        assert_eq!(call(to_lower_case, "MiXed", &[]), Value::from("mixed"));
    }

    #[test]
    fn test_methods_reject_nullish_receiver() {
        let mut vm = Vm::new();
        assert!(char_at(&mut vm, &Value::Null, &[]).is_err());
    }

    #[test]
    fn test_boxed_receiver() {
        let mut vm = Vm::new();
        let boxed = string_construct(&mut vm, &Value::Undefined, &[Value::Number(42.0)]).unwrap();
        assert_eq!(to_string(&mut vm, &boxed, &[]).unwrap(), Value::from("42"));
    }
}
