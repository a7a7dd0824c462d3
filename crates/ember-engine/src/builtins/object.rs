//! Object built-in constructor.

use super::Realm;
use crate::Result;
use crate::runtime::object::ObjectRef;
use crate::runtime::value::Value;
use crate::vm::Vm;

/// Creates the `Object` constructor.
pub fn create_constructor(realm: &Realm) -> ObjectRef {
    realm.constructor(
        "Object",
        object_constructor,
        object_constructor,
        &realm.object_prototype,
    )
}

/// Object(value) - Returns the value if it is an object, boxes primitives,
/// and creates an empty object for null, undefined or no argument.
///
/// Calling and constructing behave the same.
pub fn object_constructor(vm: &mut Vm, _this: &Value, args: &[Value]) -> Result<Value> {
    let realm = vm.realm();
    match args.first() {
        Some(Value::Object(object)) => Ok(Value::Object(object.clone())),
        Some(value) => Ok(Value::Object(
            realm
                .box_primitive(value)
                .unwrap_or_else(|| realm.new_object()),
        )),
        None => Ok(Value::Object(realm.new_object())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::object::ObjectKind;

    #[test]
    fn test_object_with_no_argument_is_empty() {
        let mut vm = Vm::new();
        let result = object_constructor(&mut vm, &Value::Undefined, &[]).unwrap();
        let object = result.as_object().unwrap();
        assert!(object.borrow().properties().is_empty());
        assert!(object.get("missing").is_undefined());
    }

    #[test]
    fn test_object_returns_object_argument() {
        let mut vm = Vm::new();
        let existing = vm.realm().new_object();
        let result =
            object_constructor(&mut vm, &Value::Undefined, &[Value::Object(existing.clone())])
                .unwrap();
        assert!(result.as_object().unwrap().ptr_eq(&existing));
    }

    #[test]
    fn test_object_boxes_primitives() {
        let mut vm = Vm::new();
        let result = object_constructor(&mut vm, &Value::Undefined, &[Value::Number(2.0)]).unwrap();
        assert!(matches!(
            result.as_object().unwrap().borrow().kind,
            ObjectKind::Number(n) if n == 2.0
        ));

        let result = object_constructor(&mut vm, &Value::Undefined, &[Value::Null]).unwrap();
        assert!(matches!(result.as_object().unwrap().borrow().kind, ObjectKind::Plain));
    }
}
