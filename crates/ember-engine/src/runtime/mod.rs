//! Runtime types: values, objects, functions and call frames.

pub mod frame;
pub mod function;
pub mod object;
pub mod value;

pub use frame::StackFrame;
pub use function::{EntryPoint, FunctionObject, NativeFn, ScriptFunction};
pub use object::{Object, ObjectKind, ObjectRef, PropertyMap};
pub use value::Value;
