//! Function objects and the native calling convention.

use std::fmt;
use std::rc::Rc;

use super::value::Value;
use crate::Result;
use crate::compiler::{Bytecode, FunctionTemplate};
use crate::vm::Vm;

/// A native (Rust) function: `(machine, receiver, arguments) -> value`.
pub type NativeFn = fn(&mut Vm, &Value, &[Value]) -> Result<Value>;

/// A compiled function body: a template inside a shared code buffer.
#[derive(Debug, Clone)]
pub struct ScriptFunction {
    /// The code buffer the function was compiled into
    pub code: Rc<Bytecode>,
    /// Index of the template in `code.functions`
    pub template: usize,
}

impl ScriptFunction {
    /// Returns the function's template.
    ///
    /// The index is validated when the function object is created.
    pub fn template(&self) -> &FunctionTemplate {
        &self.code.functions[self.template]
    }
}

/// How a function object is entered.
#[derive(Clone)]
pub enum EntryPoint {
    /// Runs host code to completion and returns its value immediately.
    Native(NativeFn),
    /// Jumps into the bytecode; the result arrives with the callee's RETURN.
    Trampoline(Rc<ScriptFunction>),
}

impl fmt::Debug for EntryPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryPoint::Native(_) => write!(f, "Native"),
            EntryPoint::Trampoline(script) => {
                write!(f, "Trampoline(@{})", script.template().entry)
            }
        }
    }
}

/// The internal slots of a function object.
#[derive(Debug, Clone)]
pub struct FunctionObject {
    /// The function name (if any)
    pub name: Option<String>,
    /// Entry used by CALL and CALL_METHOD
    pub call: EntryPoint,
    /// Entry used by NEW; `None` means the function is not a constructor
    pub construct: Option<EntryPoint>,
}

impl FunctionObject {
    /// A native function that can only be called.
    pub fn native(name: &str, call: NativeFn) -> Self {
        Self {
            name: Some(name.to_string()),
            call: EntryPoint::Native(call),
            construct: None,
        }
    }

    /// A native function with separate call and construct behaviour.
    pub fn native_constructor(name: &str, call: NativeFn, construct: NativeFn) -> Self {
        Self {
            name: Some(name.to_string()),
            call: EntryPoint::Native(call),
            construct: Some(EntryPoint::Native(construct)),
        }
    }

    /// A compiled function; it is both callable and constructible.
    pub fn script(name: Option<String>, script: ScriptFunction) -> Self {
        let entry = EntryPoint::Trampoline(Rc::new(script));
        Self {
            name,
            call: entry.clone(),
            construct: Some(entry),
        }
    }

    /// Returns true if NEW may be applied to this function.
    pub fn is_constructor(&self) -> bool {
        self.construct.is_some()
    }
}
