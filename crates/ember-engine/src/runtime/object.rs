//! Object representation.
//!
//! An object is a kind tag, an insertion-ordered property map, and an
//! optional prototype. The prototype is read-only through the link.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use rustc_hash::{FxHashMap, FxHashSet};

use super::function::FunctionObject;
use super::value::{Value, number_to_string};
use crate::{Error, Result};

/// Largest array length the engine will allocate. Elements are stored
/// densely, so index writes and `length` updates beyond this fail.
pub const MAX_ARRAY_LENGTH: usize = 1 << 24;

/// Keys at or above this are plain properties, not array indices.
const MAX_ARRAY_INDEX: u64 = u32::MAX as u64 - 1;

/// What kind of object this is, with any internal slot it carries.
#[derive(Debug, Clone)]
pub enum ObjectKind {
    /// An ordinary object.
    Plain,
    /// A boxed boolean.
    Boolean(bool),
    /// A boxed number.
    Number(f64),
    /// A boxed string.
    String(String),
    /// An array; elements live outside the property map.
    Array(Vec<Value>),
    /// A callable function object.
    Function(FunctionObject),
}

impl ObjectKind {
    /// The class name used in diagnostics.
    pub fn class_name(&self) -> &'static str {
        match self {
            ObjectKind::Plain => "Object",
            ObjectKind::Boolean(_) => "Boolean",
            ObjectKind::Number(_) => "Number",
            ObjectKind::String(_) => "String",
            ObjectKind::Array(_) => "Array",
            ObjectKind::Function(_) => "Function",
        }
    }
}

/// Properties in insertion order with a hash index over the keys.
#[derive(Debug, Clone, Default)]
pub struct PropertyMap {
    entries: Vec<(String, Value)>,
    index: FxHashMap<String, usize>,
}

impl PropertyMap {
    /// Creates an empty property map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.index.get(key).map(|&slot| &self.entries[slot].1)
    }

    /// Overwrites the entry for `key`, or appends a new one.
    pub fn set(&mut self, key: String, value: Value) {
        match self.index.get(&key) {
            Some(&slot) => self.entries[slot].1 = value,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, value));
            }
        }
    }

    /// Iterates over the entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the number of properties.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if there are no properties.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// An object.
#[derive(Debug, Clone)]
pub struct Object {
    /// The kind tag and internal slot
    pub kind: ObjectKind,
    /// Own properties
    properties: PropertyMap,
    /// The object this one delegates to
    prototype: Option<ObjectRef>,
}

impl Object {
    /// Creates an object of the given kind with no prototype.
    pub fn new(kind: ObjectKind) -> Self {
        Self {
            kind,
            properties: PropertyMap::new(),
            prototype: None,
        }
    }

    /// Creates an empty plain object.
    pub fn plain() -> Self {
        Self::new(ObjectKind::Plain)
    }

    /// Sets the prototype link.
    pub fn with_prototype(mut self, prototype: Option<&ObjectRef>) -> Self {
        self.prototype = prototype.cloned();
        self
    }

    /// Returns the prototype.
    pub fn prototype(&self) -> Option<ObjectRef> {
        self.prototype.clone()
    }

    /// Gets an own property, including array elements and string indices.
    pub fn get_own(&self, key: &str) -> Option<Value> {
        match &self.kind {
            ObjectKind::Array(elements) => {
                if key == "length" {
                    return Some(Value::Number(elements.len() as f64));
                }
                if let Some(value) = array_index(key).and_then(|i| elements.get(i)) {
                    return Some(value.clone());
                }
            }
            ObjectKind::String(s) => {
                if key == "length" {
                    return Some(Value::Number(s.chars().count() as f64));
                }
                if let Some(ch) = array_index(key).and_then(|i| s.chars().nth(i)) {
                    return Some(Value::String(ch.to_string()));
                }
            }
            _ => {}
        }
        self.properties.get(key).cloned()
    }

    /// Sets an own property. Array indices and `length` resize the elements.
    pub fn set(&mut self, key: String, value: Value) -> Result<()> {
        if let ObjectKind::Array(elements) = &mut self.kind {
            if key == "length" {
                let len = value.to_uint32()? as usize;
                grow_check(len)?;
                elements.resize(len, Value::Undefined);
                return Ok(());
            }
            if let Some(i) = array_index(&key) {
                if i >= elements.len() {
                    grow_check(i + 1)?;
                    elements.resize(i + 1, Value::Undefined);
                }
                elements[i] = value;
                return Ok(());
            }
        }
        self.properties.set(key, value);
        Ok(())
    }

    /// Sets a named own property, bypassing array index handling.
    pub fn define(&mut self, key: String, value: Value) {
        self.properties.set(key, value);
    }

    /// Returns the own named properties in insertion order.
    pub fn properties(&self) -> &PropertyMap {
        &self.properties
    }

    /// Returns the function payload, if this is a function object.
    pub fn as_function(&self) -> Option<&FunctionObject> {
        match &self.kind {
            ObjectKind::Function(function) => Some(function),
            _ => None,
        }
    }
}

/// Parses a canonical array index ("0", "17", but not "01" or "-1").
/// Anything at or above 2^32 - 1 is an ordinary key.
fn array_index(key: &str) -> Option<usize> {
    if key.is_empty() || (key.len() > 1 && key.starts_with('0')) {
        return None;
    }
    if !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let index: u64 = key.parse().ok()?;
    if index > MAX_ARRAY_INDEX {
        return None;
    }
    usize::try_from(index).ok()
}

/// Rejects lengths the dense element store cannot hold.
pub fn grow_check(len: usize) -> Result<()> {
    if len > MAX_ARRAY_LENGTH {
        return Err(Error::TypeError("Invalid array length".into()));
    }
    Ok(())
}

/// A shared, mutable reference to an object.
#[derive(Clone)]
pub struct ObjectRef(Rc<RefCell<Object>>);

impl ObjectRef {
    /// Allocates a new object.
    pub fn new(object: Object) -> Self {
        ObjectRef(Rc::new(RefCell::new(object)))
    }

    /// Immutably borrows the object.
    pub fn borrow(&self) -> Ref<'_, Object> {
        self.0.borrow()
    }

    /// Mutably borrows the object.
    pub fn borrow_mut(&self) -> RefMut<'_, Object> {
        self.0.borrow_mut()
    }

    /// Returns true if both references point at the same object.
    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Returns true if this is a function object.
    pub fn is_function(&self) -> bool {
        matches!(self.borrow().kind, ObjectKind::Function(_))
    }

    /// Reads a property, following the prototype chain. Misses are undefined.
    pub fn get(&self, key: &str) -> Value {
        let mut current = Some(self.clone());
        while let Some(object) = current {
            let borrowed = object.borrow();
            if let Some(value) = borrowed.get_own(key) {
                return value;
            }
            current = borrowed.prototype();
        }
        Value::Undefined
    }

    /// Writes an own property.
    pub fn set(&self, key: impl Into<String>, value: Value) -> Result<()> {
        let key = key.into();
        // Convert an object length before the write borrow; it may be this array.
        let value = match value {
            Value::Object(_) if key == "length" && self.is_array() => {
                Value::Number(value.to_number()?)
            }
            value => value,
        };
        self.borrow_mut().set(key, value)
    }

    /// Returns true if this is an array.
    pub fn is_array(&self) -> bool {
        matches!(self.borrow().kind, ObjectKind::Array(_))
    }

    /// Writes a named own property. Used to populate builtins.
    pub fn define(&self, key: impl Into<String>, value: Value) {
        self.borrow_mut().define(key.into(), value);
    }

    fn address(&self) -> usize {
        Rc::as_ptr(&self.0) as *const () as usize
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.try_borrow() {
            Ok(object) => write!(f, "ObjectRef({})", object.kind.class_name()),
            Err(_) => write!(f, "ObjectRef(<borrowed>)"),
        }
    }
}

thread_local! {
    /// Arrays currently being formatted on this thread.
    static FORMATTING: RefCell<FxHashSet<usize>> = RefCell::new(FxHashSet::default());
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Ok(object) = self.0.try_borrow() else {
            return write!(f, "[object]");
        };
        match &object.kind {
            ObjectKind::Plain => write!(f, "[object Object]"),
            ObjectKind::Boolean(b) => write!(f, "{}", b),
            ObjectKind::Number(n) => write!(f, "{}", number_to_string(*n)),
            ObjectKind::String(s) => write!(f, "{}", s),
            ObjectKind::Array(elements) => {
                // A cyclic array prints as empty where it recurs.
                let address = self.address();
                if !FORMATTING.with(|active| active.borrow_mut().insert(address)) {
                    return Ok(());
                }
                let result = elements.iter().enumerate().try_for_each(|(i, element)| {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    if element.is_nullish() {
                        Ok(())
                    } else {
                        write!(f, "{}", element)
                    }
                });
                FORMATTING.with(|active| active.borrow_mut().remove(&address));
                result
            }
            ObjectKind::Function(function) => match &function.name {
                Some(name) => write!(f, "[Function: {}]", name),
                None => write!(f, "[Function (anonymous)]"),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_map_preserves_order() {
        let mut map = PropertyMap::new();
        map.set("b".into(), Value::Number(1.0));
        map.set("a".into(), Value::Number(2.0));
        map.set("b".into(), Value::Number(3.0));
        let keys: Vec<_> = map.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["b", "a"]);
        assert_eq!(map.get("b"), Some(&Value::Number(3.0)));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_get_miss_is_undefined() {
        let object = ObjectRef::new(Object::plain());
        assert_eq!(object.get("missing"), Value::Undefined);
    }

    #[test]
    fn test_get_walks_prototype_chain() {
        let proto = ObjectRef::new(Object::plain());
        proto.set("greeting", Value::from("hi")).unwrap();
        let child = ObjectRef::new(Object::plain().with_prototype(Some(&proto)));
        assert_eq!(child.get("greeting"), Value::from("hi"));

        child.set("greeting", Value::from("own")).unwrap();
        assert_eq!(child.get("greeting"), Value::from("own"));
        assert_eq!(proto.get("greeting"), Value::from("hi"));
    }

    #[test]
    fn test_prototype_outlives_other_owners() {
        let child = {
            let proto = ObjectRef::new(Object::plain());
            proto.set("m", Value::Number(42.0)).unwrap();
            ObjectRef::new(Object::plain().with_prototype(Some(&proto)))
        };
        assert!(child.borrow().prototype().is_some());
        assert_eq!(child.get("m"), Value::Number(42.0));
    }

    #[test]
    fn test_huge_keys_are_plain_properties() {
        let array = ObjectRef::new(Object::new(ObjectKind::Array(vec![])));
        array.set("18446744073709551615", Value::Number(1.0)).unwrap();
        array.set("4294967295", Value::Number(2.0)).unwrap();
        assert_eq!(array.get("length"), Value::Number(0.0));
        assert_eq!(array.get("18446744073709551615"), Value::Number(1.0));
        assert_eq!(array.get("4294967295"), Value::Number(2.0));
    }

    #[test]
    fn test_oversized_array_growth_is_rejected() {
        let array = ObjectRef::new(Object::new(ObjectKind::Array(vec![Value::Number(1.0)])));
        assert!(matches!(
            array.set("4294967294", Value::Number(1.0)),
            Err(Error::TypeError(_))
        ));
        assert!(matches!(
            array.set("length", Value::Number(4294967295.0)),
            Err(Error::TypeError(_))
        ));
        assert_eq!(array.get("length"), Value::Number(1.0));
    }

    #[test]
    fn test_length_from_boxed_number() {
        let array = ObjectRef::new(Object::new(ObjectKind::Array(vec![])));
        let boxed = ObjectRef::new(Object::new(ObjectKind::Number(2.0)));
        array.set("length", Value::Object(boxed)).unwrap();
        assert_eq!(array.get("length"), Value::Number(2.0));
        assert!(array.set("length", Value::Object(array.clone())).is_err());
    }

    #[test]
    fn test_cyclic_array_formats_without_recursing() {
        let array = ObjectRef::new(Object::new(ObjectKind::Array(vec![Value::Number(1.0)])));
        array.set("1", Value::Object(array.clone())).unwrap();
        assert_eq!(array.to_string(), "1,");

        let outer = ObjectRef::new(Object::new(ObjectKind::Array(vec![
            Value::Object(array.clone()),
            Value::Object(array.clone()),
        ])));
        assert_eq!(outer.to_string(), "1,,1,");
    }

    #[test]
    fn test_array_elements_and_length() {
        let array = ObjectRef::new(Object::new(ObjectKind::Array(vec![Value::Number(1.0)])));
        array.set("3", Value::Number(4.0)).unwrap();
        assert_eq!(array.get("length"), Value::Number(4.0));
        assert_eq!(array.get("1"), Value::Undefined);
        assert_eq!(array.get("3"), Value::Number(4.0));
        array.set("length", Value::Number(1.0)).unwrap();
        assert_eq!(array.get("length"), Value::Number(1.0));
        assert_eq!(array.to_string(), "1");
    }

    #[test]
    fn test_array_index_is_canonical() {
        assert_eq!(array_index("0"), Some(0));
        assert_eq!(array_index("12"), Some(12));
        assert_eq!(array_index("01"), None);
        assert_eq!(array_index("-1"), None);
        assert_eq!(array_index("1.5"), None);
    }

    #[test]
    fn test_string_box_indexing() {
        let boxed = ObjectRef::new(Object::new(ObjectKind::String("abc".into())));
        assert_eq!(boxed.get("length"), Value::Number(3.0));
        assert_eq!(boxed.get("1"), Value::from("b"));
    }

    #[test]
    fn test_aliases_share_mutation() {
        let a = ObjectRef::new(Object::plain());
        let b = a.clone();
        b.set("x", Value::Number(1.0)).unwrap();
        assert_eq!(a.get("x"), Value::Number(1.0));
    }
}
