//! Built-in objects and constructors.
//!
//! The builtins live in two places:
//! - the [`Realm`], which owns the shared prototypes that LOAD_MEMBER
//!   delegates to and that new objects are linked against,
//! - the global bindings, populated by [`install`].

pub mod array;
pub mod boolean;
pub mod console;
pub mod math;
pub mod number;
pub mod object;
pub mod string;

use std::rc::Rc;

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::runtime::function::{FunctionObject, NativeFn};
use crate::runtime::object::{Object, ObjectKind, ObjectRef};
use crate::runtime::value::Value;

/// The shared prototypes of one VM.
///
/// Objects only hold weak links to their prototype, so the realm keeps every
/// prototype alive for as long as the VM exists.
#[derive(Debug)]
pub struct Realm {
    /// Object.prototype
    pub object_prototype: ObjectRef,
    /// Function.prototype
    pub function_prototype: ObjectRef,
    /// Array.prototype
    pub array_prototype: ObjectRef,
    /// String.prototype
    pub string_prototype: ObjectRef,
    /// Number.prototype
    pub number_prototype: ObjectRef,
    /// Boolean.prototype
    pub boolean_prototype: ObjectRef,
}

impl Realm {
    /// Creates the prototypes and their methods.
    pub fn new() -> Self {
        let object_prototype = ObjectRef::new(Object::plain());
        let derived = |proto: &ObjectRef| ObjectRef::new(Object::plain().with_prototype(Some(proto)));
        let realm = Self {
            function_prototype: derived(&object_prototype),
            array_prototype: derived(&object_prototype),
            string_prototype: derived(&object_prototype),
            number_prototype: derived(&object_prototype),
            boolean_prototype: derived(&object_prototype),
            object_prototype,
        };
        array::init_prototype(&realm);
        string::init_prototype(&realm);
        realm
    }

    /// Allocates an empty plain object linked to Object.prototype.
    pub fn new_object(&self) -> ObjectRef {
        ObjectRef::new(Object::plain().with_prototype(Some(&self.object_prototype)))
    }

    /// Allocates an array linked to Array.prototype.
    pub fn new_array(&self, elements: Vec<Value>) -> ObjectRef {
        ObjectRef::new(
            Object::new(ObjectKind::Array(elements)).with_prototype(Some(&self.array_prototype)),
        )
    }

    /// Allocates a function object linked to Function.prototype.
    pub fn new_function(&self, function: FunctionObject) -> ObjectRef {
        ObjectRef::new(
            Object::new(ObjectKind::Function(function))
                .with_prototype(Some(&self.function_prototype)),
        )
    }

    /// Wraps a boolean, number or string in an object of the matching kind.
    pub fn box_primitive(&self, value: &Value) -> Option<ObjectRef> {
        let (kind, prototype) = match value {
            Value::Boolean(b) => (ObjectKind::Boolean(*b), &self.boolean_prototype),
            Value::Number(n) => (ObjectKind::Number(*n), &self.number_prototype),
            Value::String(s) => (ObjectKind::String(s.clone()), &self.string_prototype),
            _ => return None,
        };
        Some(ObjectRef::new(Object::new(kind).with_prototype(Some(prototype))))
    }

    /// Creates a native function object.
    pub(crate) fn native(&self, name: &str, call: NativeFn) -> Value {
        Value::Object(self.new_function(FunctionObject::native(name, call)))
    }

    /// Creates a native constructor whose `prototype` property is `prototype`.
    pub(crate) fn constructor(
        &self,
        name: &str,
        call: NativeFn,
        construct: NativeFn,
        prototype: &ObjectRef,
    ) -> ObjectRef {
        let function =
            self.new_function(FunctionObject::native_constructor(name, call, construct));
        function.define("prototype", Value::Object(prototype.clone()));
        function
    }

    /// Adds a native method to an object.
    pub(crate) fn define_method(&self, target: &ObjectRef, name: &str, call: NativeFn) {
        target.define(name, self.native(name, call));
    }
}

impl Default for Realm {
    fn default() -> Self {
        Self::new()
    }
}

/// Populates the global bindings with the builtins of `realm`.
pub fn install(realm: &Realm, globals: &mut FxHashMap<Rc<str>, Value>) {
    let mut define = |name: &str, value: Value| {
        globals.insert(Rc::from(name), value);
    };

    define("this", Value::Undefined);
    define("NaN", Value::Number(f64::NAN));
    define("Infinity", Value::Number(f64::INFINITY));

    define("Object", Value::Object(object::create_constructor(realm)));
    define("Boolean", Value::Object(boolean::create_constructor(realm)));
    define("Number", Value::Object(number::create_constructor(realm)));
    define("String", Value::Object(string::create_constructor(realm)));
    define("Array", Value::Object(array::create_constructor(realm)));
    define("Math", Value::Object(math::create_object(realm)));
    define("console", Value::Object(console::create_object(realm)));

    debug!(globals = globals.len(), "builtins installed");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prototypes_delegate_to_object_prototype() {
        let realm = Realm::new();
        realm.object_prototype.define("shared", Value::Number(1.0));
        let array = realm.new_array(vec![]);
        assert_eq!(array.get("shared"), Value::Number(1.0));
        assert!(array.get("push").is_function());
    }

    #[test]
    fn test_box_primitive() {
        let realm = Realm::new();
        let boxed = realm.box_primitive(&Value::from("ab")).unwrap();
        assert_eq!(boxed.get("length"), Value::Number(2.0));
        assert!(boxed.get("charAt").is_function());
        assert!(realm.box_primitive(&Value::Null).is_none());
    }

    #[test]
    fn test_install_defines_globals() {
        let realm = Realm::new();
        let mut globals = FxHashMap::default();
        install(&realm, &mut globals);
        for name in ["Object", "Boolean", "Number", "String", "Array", "Math", "console"] {
            assert!(globals.contains_key(name), "missing {}", name);
        }
        assert_eq!(globals.get("this"), Some(&Value::Undefined));
    }
}
