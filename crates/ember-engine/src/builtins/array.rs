//! Array built-in object.
//!
//! Provides the Array constructor and prototype methods. Arrays are objects
//! of kind [`ObjectKind::Array`]; `length` and index properties are kept in
//! sync by the object model.

use super::Realm;
use crate::runtime::object::{self, ObjectKind, ObjectRef};
use crate::runtime::value::Value;
use crate::vm::Vm;
use crate::{Error, Result};

/// Fills in Array.prototype.
pub(super) fn init_prototype(realm: &Realm) {
    let proto = &realm.array_prototype;
    realm.define_method(proto, "push", push);
    realm.define_method(proto, "pop", pop);
    realm.define_method(proto, "join", join);
    realm.define_method(proto, "toString", join);
}

/// Creates the `Array` constructor.
pub fn create_constructor(realm: &Realm) -> ObjectRef {
    realm.constructor("Array", array_constructor, array_constructor, &realm.array_prototype)
}

// ============================================================================
// Array Constructor
// ============================================================================

/// Array(...items) / Array(len) - Creates an array from the arguments, or
/// `len` holes when called with a single number.
///
/// Calling and constructing behave the same.
pub fn array_constructor(vm: &mut Vm, _this: &Value, args: &[Value]) -> Result<Value> {
    let elements = match args {
        [Value::Number(len)] => {
            let n = *len;
            if n < 0.0 || n.fract() != 0.0 || n > u32::MAX as f64 {
                return Err(Error::TypeError("Invalid array length".into()));
            }
            object::grow_check(n as usize)?;
            vec![Value::Undefined; n as usize]
        }
        _ => args.to_vec(),
    };
    Ok(Value::Object(vm.realm().new_array(elements)))
}

// ============================================================================
// Array.prototype Methods
// ============================================================================

/// Array.prototype.push(...items) - Appends items and returns the new length.
pub fn push(_vm: &mut Vm, this: &Value, args: &[Value]) -> Result<Value> {
    with_elements(this, "push", |elements| {
        object::grow_check(elements.len() + args.len())?;
        elements.extend_from_slice(args);
        Ok(Value::Number(elements.len() as f64))
    })?
}

/// Array.prototype.pop() - Removes and returns the last element.
pub fn pop(_vm: &mut Vm, this: &Value, _args: &[Value]) -> Result<Value> {
    with_elements(this, "pop", |elements| elements.pop().unwrap_or_default())
}

/// Array.prototype.join(separator) - Joins the elements into a string.
///
/// `undefined` and `null` elements become empty strings.
pub fn join(_vm: &mut Vm, this: &Value, args: &[Value]) -> Result<Value> {
    let separator = match args.first() {
        Some(v) if !v.is_undefined() => v.to_js_string()?,
        _ => ",".to_string(),
    };
    let elements = with_elements(this, "join", |elements| elements.clone())?;
    let parts = elements
        .iter()
        .map(|v| {
            if v.is_nullish() {
                Ok(String::new())
            } else {
                v.to_js_string()
            }
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Value::String(parts.join(&separator)))
}

/// Runs `f` over the receiver's elements. The receiver must be an array.
fn with_elements<T>(this: &Value, method: &str, f: impl FnOnce(&mut Vec<Value>) -> T) -> Result<T> {
    if let Value::Object(object) = this {
        if let ObjectKind::Array(elements) = &mut object.borrow_mut().kind {
            return Ok(f(elements));
        }
    }
    Err(Error::TypeError(format!(
        "Array.prototype.{} called on a non-array",
        method
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn array(vm: &Vm, items: &[f64]) -> Value {
        Value::Object(vm.realm().new_array(items.iter().map(|n| Value::Number(*n)).collect()))
    }

    #[test]
    fn test_push_and_pop() {
        let mut vm = Vm::new();
        let arr = array(&vm, &[1.0]);
        assert_eq!(
            push(&mut vm, &arr, &[Value::Number(2.0), Value::Number(3.0)]).unwrap(),
            Value::Number(3.0)
        );
        assert_eq!(pop(&mut vm, &arr, &[]).unwrap(), Value::Number(3.0));
        assert_eq!(arr.as_object().unwrap().get("length"), Value::Number(2.0));
    }

    #[test]
    fn test_pop_empty_is_undefined() {
        let mut vm = Vm::new();
        let arr = array(&vm, &[]);
        assert_eq!(pop(&mut vm, &arr, &[]).unwrap(), Value::Undefined);
    }

    #[test]
    fn test_join() {
        let mut vm = Vm::new();
        let arr = array(&vm, &[1.0, 2.0, 3.0]);
        assert_eq!(join(&mut vm, &arr, &[]).unwrap(), Value::from("1,2,3"));
        assert_eq!(join(&mut vm, &arr, &[Value::from("-")]).unwrap(), Value::from("1-2-3"));

        let holes = Value::Object(vm.realm().new_array(vec![Value::Null, Value::Number(1.0)]));
        assert_eq!(join(&mut vm, &holes, &[]).unwrap(), Value::from(",1"));
    }

    #[test]
    fn test_constructor_forms() {
        let mut vm = Vm::new();
        let sized = array_constructor(&mut vm, &Value::Undefined, &[Value::Number(3.0)]).unwrap();
        assert_eq!(sized.as_object().unwrap().get("length"), Value::Number(3.0));

        let listed = array_constructor(
            &mut vm,
            &Value::Undefined,
            &[Value::Number(3.0), Value::from("x")],
        )
        .unwrap();
        assert_eq!(listed.as_object().unwrap().get("1"), Value::from("x"));

        assert!(array_constructor(&mut vm, &Value::Undefined, &[Value::Number(1.5)]).is_err());
    }

    #[test]
    fn test_constructor_rejects_unallocatable_length() {
        let mut vm = Vm::new();
        assert!(matches!(
            array_constructor(&mut vm, &Value::Undefined, &[Value::Number(4294967295.0)]),
            Err(Error::TypeError(_))
        ));
    }

    #[test]
    fn test_methods_require_array_receiver() {
        let mut vm = Vm::new();
        assert!(push(&mut vm, &Value::from("s"), &[]).is_err());
    }
}
