//! Activation records.
//!
//! Each frame links to the frame that was active when it was created. The
//! same link serves unwinding and name resolution, so variable lookup is
//! dynamic: a callee sees its caller's bindings.

use std::rc::Rc;

use rustc_hash::FxHashMap;

use super::object::ObjectRef;
use super::value::Value;
use crate::compiler::Bytecode;

/// A call frame.
#[derive(Debug, Default)]
pub struct StackFrame {
    /// The operand stack
    pub stack: Vec<Value>,
    /// Local bindings by name
    bindings: FxHashMap<Rc<str>, Value>,
    /// Where to resume in the caller
    pub return_ip: usize,
    /// The code buffer to resume in the caller
    pub return_code: Option<Rc<Bytecode>>,
    /// Index of the frame that was active at creation time
    pub outer: Option<usize>,
    /// For NEW frames: the object returned when the callee returns a primitive
    pub construct_target: Option<ObjectRef>,
}

impl StackFrame {
    /// Creates the outermost frame over a set of existing bindings.
    pub fn global(bindings: FxHashMap<Rc<str>, Value>) -> Self {
        Self {
            bindings,
            ..Self::default()
        }
    }

    /// Creates a frame linked to `outer`, resuming at `return_ip` in `return_code`.
    pub fn new(outer: usize, return_ip: usize, return_code: Rc<Bytecode>) -> Self {
        Self {
            return_ip,
            return_code: Some(return_code),
            outer: Some(outer),
            ..Self::default()
        }
    }

    /// Creates or resets a binding to undefined.
    pub fn declare(&mut self, name: Rc<str>) {
        self.bindings.insert(name, Value::Undefined);
    }

    /// Creates or overwrites a binding.
    pub fn bind(&mut self, name: Rc<str>, value: Value) {
        self.bindings.insert(name, value);
    }

    /// Gets a binding in this frame only.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    /// Gets a mutable binding in this frame only.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.bindings.get_mut(name)
    }

    /// Returns true if this frame binds `name`.
    pub fn has(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Consumes the frame, returning its bindings.
    pub fn into_bindings(self) -> FxHashMap<Rc<str>, Value> {
        self.bindings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declare_resets_binding() {
        let mut frame = StackFrame::default();
        frame.bind("a".into(), Value::Number(1.0));
        frame.declare("a".into());
        assert_eq!(frame.get("a"), Some(&Value::Undefined));
    }

    #[test]
    fn test_global_frame_has_no_outer() {
        let mut bindings = FxHashMap::default();
        bindings.insert(Rc::from("x"), Value::Boolean(true));
        let frame = StackFrame::global(bindings);
        assert!(frame.outer.is_none());
        assert!(frame.has("x"));
        assert_eq!(frame.into_bindings().len(), 1);
    }

    #[test]
    fn test_new_frame_links_outer() {
        let frame = StackFrame::new(3, 42, Rc::new(Bytecode::new()));
        assert_eq!(frame.outer, Some(3));
        assert_eq!(frame.return_ip, 42);
        assert!(frame.stack.is_empty());
    }

    #[test]
    fn test_get_mut_updates_in_place() {
        let mut frame = StackFrame::default();
        frame.declare("n".into());
        *frame.get_mut("n").unwrap() = Value::Number(5.0);
        assert_eq!(frame.get("n"), Some(&Value::Number(5.0)));
        assert!(frame.get_mut("missing").is_none());
    }
}
