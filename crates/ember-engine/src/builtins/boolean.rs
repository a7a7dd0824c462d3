//! Boolean built-in object.
//!
//! Provides the Boolean constructor and prototype methods.

use super::Realm;
use crate::runtime::object::{ObjectKind, ObjectRef};
use crate::runtime::value::Value;
use crate::vm::Vm;
use crate::{Error, Result};

/// Creates the `Boolean` constructor and fills in its prototype.
pub fn create_constructor(realm: &Realm) -> ObjectRef {
    realm.define_method(&realm.boolean_prototype, "toString", to_string);
    realm.define_method(&realm.boolean_prototype, "valueOf", value_of);
    realm.constructor(
        "Boolean",
        boolean_call,
        boolean_construct,
        &realm.boolean_prototype,
    )
}

// ============================================================================
// Boolean Constructor
// ============================================================================

/// Boolean(value) - Converts value to a boolean primitive.
pub fn boolean_call(_vm: &mut Vm, _this: &Value, args: &[Value]) -> Result<Value> {
    let b = args.first().map(|v| v.to_boolean()).unwrap_or(false);
    Ok(Value::Boolean(b))
}

/// new Boolean(value) - Creates a Boolean wrapper object.
pub fn boolean_construct(vm: &mut Vm, this: &Value, args: &[Value]) -> Result<Value> {
    let b = boolean_call(vm, this, args)?;
    box_value(vm, &b)
}

// ============================================================================
// Boolean.prototype Methods
// ============================================================================

/// Boolean.prototype.toString() - Returns "true" or "false".
pub fn to_string(_vm: &mut Vm, this: &Value, _args: &[Value]) -> Result<Value> {
    let b = this_boolean(this)?;
    Ok(Value::String(b.to_string()))
}

/// Boolean.prototype.valueOf() - Returns the boolean value.
pub fn value_of(_vm: &mut Vm, this: &Value, _args: &[Value]) -> Result<Value> {
    Ok(Value::Boolean(this_boolean(this)?))
}

fn this_boolean(this: &Value) -> Result<bool> {
    match this {
        Value::Boolean(b) => Ok(*b),
        Value::Object(object) => match object.borrow().kind {
            ObjectKind::Boolean(b) => Ok(b),
            _ => Err(Error::TypeError("Boolean.prototype method called on incompatible receiver".into())),
        },
        _ => Err(Error::TypeError("Boolean.prototype method called on incompatible receiver".into())),
    }
}

/// Boxes a primitive produced by a constructor call.
pub(super) fn box_value(vm: &Vm, value: &Value) -> Result<Value> {
    vm.realm()
        .box_primitive(value)
        .map(Value::Object)
        .ok_or_else(|| Error::TypeError(format!("cannot box {}", value.type_of())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boolean_call_converts() {
        let mut vm = Vm::new();
        let cases = [
            (vec![], false),
            (vec![Value::Number(0.0)], false),
            (vec![Value::from("x")], true),
            (vec![Value::Null], false),
        ];
        for (args, expected) in cases {
            assert_eq!(
                boolean_call(&mut vm, &Value::Undefined, &args).unwrap(),
                Value::Boolean(expected)
            );
        }
    }

    #[test]
    fn test_boolean_construct_boxes() {
        let mut vm = Vm::new();
        let boxed = boolean_construct(&mut vm, &Value::Undefined, &[Value::Boolean(true)]).unwrap();
        assert_eq!(value_of(&mut vm, &boxed, &[]).unwrap(), Value::Boolean(true));
        assert!(boxed.to_boolean());
    }

    #[test]
    fn test_to_string_on_wrong_receiver_fails() {
        let mut vm = Vm::new();
        assert!(to_string(&mut vm, &Value::Number(1.0), &[]).is_err());
        assert_eq!(
            to_string(&mut vm, &Value::Boolean(false), &[]).unwrap(),
            Value::from("false")
        );
    }
}
