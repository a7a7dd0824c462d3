//! The bytecode interpreter.

use std::mem;
use std::rc::Rc;

use rustc_hash::FxHashMap;
use tracing::{debug, trace, warn};

use super::comparison::{abstract_equals, less_than, strict_equals};
use crate::builtins::{self, Realm};
use crate::compiler::{Bytecode, Instruction, OpCode, Operand};
use crate::runtime::function::{EntryPoint, FunctionObject, ScriptFunction};
use crate::runtime::object::{Object, ObjectKind, ObjectRef};
use crate::runtime::{StackFrame, Value};
use crate::{Error, Result};

/// Frames allowed before a call is rejected.
const MAX_FRAMES: usize = 10_000;

/// Name of the receiver binding in script frames.
const THIS: &str = "this";

/// The virtual machine.
///
/// Global bindings outlive a single [`Vm::execute`] call: they are moved into
/// the outermost frame when a program starts and moved back when it stops,
/// whether it halted normally or failed.
pub struct Vm {
    frames: Vec<StackFrame>,
    code: Rc<Bytecode>,
    ip: usize,
    globals: FxHashMap<Rc<str>, Value>,
    realm: Realm,
}

impl Vm {
    /// Creates a new VM with the builtins installed.
    pub fn new() -> Self {
        let realm = Realm::new();
        let mut globals = FxHashMap::default();
        builtins::install(&realm, &mut globals);
        Self {
            frames: Vec::new(),
            code: Rc::new(Bytecode::new()),
            ip: 0,
            globals,
            realm,
        }
    }

    /// The shared prototypes.
    pub fn realm(&self) -> &Realm {
        &self.realm
    }

    /// Looks up a global binding.
    pub fn global(&self, name: &str) -> Option<Value> {
        self.globals.get(name).cloned()
    }

    /// Creates or overwrites a global binding.
    pub fn set_global(&mut self, name: &str, value: Value) {
        self.globals.insert(Rc::from(name), value);
    }

    /// Runs a program from its first instruction.
    ///
    /// The result is the operand of the outermost `RETURN`, or `undefined`
    /// if execution runs off the end of the code.
    pub fn execute(&mut self, code: Rc<Bytecode>) -> Result<Value> {
        debug!(instructions = code.len(), "executing bytecode");
        self.code = code;
        self.ip = 0;
        self.frames.clear();
        self.frames
            .push(StackFrame::global(mem::take(&mut self.globals)));

        let result = self.run();

        if !self.frames.is_empty() {
            let global = self.frames.swap_remove(0);
            self.restore_globals(global);
            self.frames.clear();
        }

        match &result {
            Ok(value) => debug!(result = %value, "halted"),
            Err(error) => warn!(ip = self.ip, %error, "execution aborted"),
        }
        result
    }

    /// Moves the bottom frame's bindings back into the globals, dropping
    /// compiler temporaries (`%`-prefixed names).
    fn restore_globals(&mut self, frame: StackFrame) {
        let mut bindings = frame.into_bindings();
        bindings.retain(|name, _| !name.starts_with('%'));
        self.globals = bindings;
    }

    // ========================================================================
    // Dispatch Loop
    // ========================================================================

    fn run(&mut self) -> Result<Value> {
        loop {
            let Some(&instruction) = self.code.instructions.get(self.ip) else {
                return Ok(Value::Undefined);
            };
            let offset = self.ip;
            self.ip += 1;
            trace!(offset, op = %instruction.opcode, depth = self.frames.len(), "dispatch");
            if let Some(result) = self.step(offset, instruction)? {
                return Ok(result);
            }
        }
    }

    /// Executes one instruction. Returns the final value when the program halts.
    fn step(&mut self, offset: usize, instruction: Instruction) -> Result<Option<Value>> {
        match instruction.opcode {
            // Stack operations
            OpCode::PushUndefined => self.push(Value::Undefined)?,
            OpCode::PushNull => self.push(Value::Null)?,
            OpCode::PushTrue => self.push(Value::Boolean(true))?,
            OpCode::PushFalse => self.push(Value::Boolean(false))?,
            OpCode::PushNumber => match instruction.operand {
                Some(Operand::Number(n)) => self.push(Value::Number(n))?,
                _ => return Err(bad_operand(offset, instruction)),
            },
            OpCode::PushString => {
                let s = self.string_operand(offset, instruction)?;
                self.push(Value::String(s.to_string()))?;
            }
            OpCode::PushFunction => {
                let function = self.make_function(offset, instruction)?;
                self.push(Value::Object(function))?;
            }
            OpCode::NewObject => {
                let object = self.realm.new_object();
                self.push(Value::Object(object))?;
            }
            OpCode::NewArray => {
                let count = self.count_operand(offset, instruction)?;
                let elements = self.pop_n(count)?;
                let array = self.realm.new_array(elements);
                self.push(Value::Object(array))?;
            }
            OpCode::Pop => {
                self.frame()?.stack.pop();
            }
            OpCode::Dup => {
                let top = self.peek()?.clone();
                self.push(top)?;
            }
            OpCode::Dup2 => {
                let stack = &mut self.frame()?.stack;
                if stack.len() < 2 {
                    return Err(Error::VmError("stack underflow".to_string()));
                }
                let pair = stack[stack.len() - 2..].to_vec();
                stack.extend(pair);
            }

            // Arithmetic operations
            OpCode::Add => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(add(&a, &b)?)?;
            }
            OpCode::Sub => self.numeric_binary(|a, b| a - b)?,
            OpCode::Mul => self.numeric_binary(|a, b| a * b)?,
            OpCode::Div => self.numeric_binary(|a, b| a / b)?,
            OpCode::Mod => self.numeric_binary(|a, b| a % b)?,
            OpCode::Neg => {
                let n = self.pop()?.to_number()?;
                self.push(Value::Number(-n))?;
            }
            OpCode::ToNumber => {
                let n = self.pop()?.to_number()?;
                self.push(Value::Number(n))?;
            }

            // Bitwise operations
            OpCode::BitAnd => self.int32_binary(|a, b| a & b)?,
            OpCode::BitOr => self.int32_binary(|a, b| a | b)?,
            OpCode::BitXor => self.int32_binary(|a, b| a ^ b)?,
            OpCode::Shl => self.int32_binary(|a, b| a.wrapping_shl(b as u32 & 31))?,
            OpCode::Shr => self.int32_binary(|a, b| a.wrapping_shr(b as u32 & 31))?,
            OpCode::Ushr => {
                let b = self.pop()?.to_uint32()?;
                let a = self.pop()?.to_uint32()?;
                self.push(Value::Number((a >> (b & 31)) as f64))?;
            }
            OpCode::BitNot => {
                let n = self.pop()?.to_int32()?;
                self.push(Value::Number(!n as f64))?;
            }

            // Comparison operations
            OpCode::Eq => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(Value::Boolean(abstract_equals(&a, &b)))?;
            }
            OpCode::Ne => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(Value::Boolean(!abstract_equals(&a, &b)))?;
            }
            OpCode::StrictEq => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(Value::Boolean(strict_equals(&a, &b)))?;
            }
            OpCode::StrictNe => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(Value::Boolean(!strict_equals(&a, &b)))?;
            }
            OpCode::Lt => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(Value::Boolean(less_than(&a, &b)? == Some(true)))?;
            }
            OpCode::Gt => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(Value::Boolean(less_than(&b, &a)? == Some(true)))?;
            }
            OpCode::Le => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(Value::Boolean(less_than(&b, &a)? == Some(false)))?;
            }
            OpCode::Ge => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push(Value::Boolean(less_than(&a, &b)? == Some(false)))?;
            }

            // Logical operations
            OpCode::Not => {
                let value = self.pop()?;
                self.push(Value::Boolean(!value.to_boolean()))?;
            }
            OpCode::TypeOf => {
                let value = self.pop()?;
                self.push(Value::String(value.type_of().to_string()))?;
            }

            // Variable operations
            OpCode::Declare => {
                let name = self.string_operand(offset, instruction)?;
                self.frame()?.declare(name);
            }
            OpCode::Load => {
                let name = self.string_operand(offset, instruction)?;
                let value = self.lookup(&name)?;
                self.push(value)?;
            }
            OpCode::Store => {
                let name = self.string_operand(offset, instruction)?;
                let value = self.pop()?;
                self.assign(&name, value)?;
            }

            // Property operations
            OpCode::LoadMember => {
                let key = self.pop()?;
                let receiver = self.pop()?;
                let value = self.get_member(&receiver, &key)?;
                self.push(value)?;
            }
            OpCode::StoreMember => {
                let value = self.pop()?;
                let key = self.pop()?;
                let receiver = self.pop()?;
                self.set_member(&receiver, &key, value.clone())?;
                self.push(value)?;
            }

            // Control flow
            OpCode::Jmp => {
                self.ip = self.jump_target(offset, instruction)?;
            }
            OpCode::Jne => {
                if instruction.operand == Some(Operand::Jump(0)) {
                    return Err(Error::VmError(format!(
                        "zero-offset JNE at {:04}",
                        offset
                    )));
                }
                let target = self.jump_target(offset, instruction)?;
                if !self.pop()?.to_boolean() {
                    self.ip = target;
                }
            }

            // Function operations
            OpCode::Call => {
                let argc = self.count_operand(offset, instruction)?;
                let callee = self.pop()?;
                let args = self.pop_n(argc)?;
                self.call(callee, Value::Undefined, args)?;
            }
            OpCode::CallMethod => {
                let argc = self.count_operand(offset, instruction)?;
                let callee = self.pop()?;
                let receiver = self.pop()?;
                let args = self.pop_n(argc)?;
                self.call(callee, receiver, args)?;
            }
            OpCode::New => {
                let argc = self.count_operand(offset, instruction)?;
                let callee = self.pop()?;
                let args = self.pop_n(argc)?;
                self.construct(callee, args)?;
            }
            OpCode::Return => return self.do_return(),
        }
        Ok(None)
    }

    // ========================================================================
    // Stack and Operand Helpers
    // ========================================================================

    fn frame(&mut self) -> Result<&mut StackFrame> {
        self.frames
            .last_mut()
            .ok_or_else(|| Error::VmError("no active frame".to_string()))
    }

    fn push(&mut self, value: Value) -> Result<()> {
        self.frame()?.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Result<Value> {
        self.frame()?
            .stack
            .pop()
            .ok_or_else(|| Error::VmError("stack underflow".to_string()))
    }

    fn peek(&mut self) -> Result<&Value> {
        self.frame()?
            .stack
            .last()
            .ok_or_else(|| Error::VmError("stack underflow".to_string()))
    }

    /// Pops `n` values, returned in the order they were pushed.
    fn pop_n(&mut self, n: usize) -> Result<Vec<Value>> {
        let stack = &mut self.frame()?.stack;
        if stack.len() < n {
            return Err(Error::VmError("stack underflow".to_string()));
        }
        let at = stack.len() - n;
        Ok(stack.split_off(at))
    }

    fn numeric_binary(&mut self, op: impl FnOnce(f64, f64) -> f64) -> Result<()> {
        let b = self.pop()?.to_number()?;
        let a = self.pop()?.to_number()?;
        self.push(Value::Number(op(a, b)))
    }

    fn int32_binary(&mut self, op: impl FnOnce(i32, i32) -> i32) -> Result<()> {
        let b = self.pop()?.to_int32()?;
        let a = self.pop()?.to_int32()?;
        self.push(Value::Number(op(a, b) as f64))
    }

    fn string_operand(&self, offset: usize, instruction: Instruction) -> Result<Rc<str>> {
        match instruction.operand {
            Some(Operand::Str(index)) => Ok(self.code.string(index)?.clone()),
            _ => Err(bad_operand(offset, instruction)),
        }
    }

    fn count_operand(&self, offset: usize, instruction: Instruction) -> Result<usize> {
        match instruction.operand {
            Some(Operand::ArgCount(count)) => Ok(count as usize),
            _ => Err(bad_operand(offset, instruction)),
        }
    }

    fn jump_target(&self, offset: usize, instruction: Instruction) -> Result<usize> {
        let Some(Operand::Jump(delta)) = instruction.operand else {
            return Err(bad_operand(offset, instruction));
        };
        self.code.jump_target(offset, delta).ok_or_else(|| {
            Error::VmError(format!(
                "jump at {:04} by {} leaves the code (length {})",
                offset,
                delta,
                self.code.len()
            ))
        })
    }

    // ========================================================================
    // Bindings
    // ========================================================================

    /// Finds the frame holding `name`, walking the frame links.
    fn resolve(&self, name: &str) -> Option<usize> {
        let mut index = self.frames.len().checked_sub(1);
        while let Some(i) = index {
            let frame = &self.frames[i];
            if frame.has(name) {
                return Some(i);
            }
            index = frame.outer;
        }
        None
    }

    fn lookup(&self, name: &str) -> Result<Value> {
        self.resolve(name)
            .and_then(|i| self.frames[i].get(name).cloned())
            .ok_or_else(|| Error::ReferenceError(format!("{} is not defined", name)))
    }

    fn assign(&mut self, name: &str, value: Value) -> Result<()> {
        let slot = self
            .resolve(name)
            .and_then(|i| self.frames[i].get_mut(name))
            .ok_or_else(|| Error::ReferenceError(format!("{} is not defined", name)))?;
        *slot = value;
        Ok(())
    }

    // ========================================================================
    // Properties
    // ========================================================================

    /// Reads `receiver[key]`, delegating primitives to their prototypes.
    pub fn get_member(&self, receiver: &Value, key: &Value) -> Result<Value> {
        let key = key.to_js_string()?;
        match receiver {
            Value::Object(object) => Ok(object.get(&key)),
            Value::String(s) => {
                if key == "length" {
                    return Ok(Value::Number(s.chars().count() as f64));
                }
                if let Some(ch) = key
                    .parse::<usize>()
                    .ok()
                    .filter(|i| i.to_string() == key)
                    .and_then(|i| s.chars().nth(i))
                {
                    return Ok(Value::String(ch.to_string()));
                }
                Ok(self.realm.string_prototype.get(&key))
            }
            Value::Number(_) => Ok(self.realm.number_prototype.get(&key)),
            Value::Boolean(_) => Ok(self.realm.boolean_prototype.get(&key)),
            Value::Undefined | Value::Null => Err(Error::TypeError(format!(
                "Cannot read property '{}' of {}",
                key, receiver
            ))),
        }
    }

    /// Writes `receiver[key] = value`. Writes to primitives are ignored.
    pub fn set_member(&self, receiver: &Value, key: &Value, value: Value) -> Result<()> {
        let key = key.to_js_string()?;
        match receiver {
            Value::Object(object) => object.set(key, value),
            Value::Undefined | Value::Null => Err(Error::TypeError(format!(
                "Cannot set property '{}' of {}",
                key, receiver
            ))),
            _ => Ok(()),
        }
    }

    // ========================================================================
    // Calls
    // ========================================================================

    fn make_function(&self, offset: usize, instruction: Instruction) -> Result<ObjectRef> {
        let Some(Operand::Function(index)) = instruction.operand else {
            return Err(bad_operand(offset, instruction));
        };
        let template = self.code.functions.get(index as usize).ok_or_else(|| {
            Error::VmError(format!("function template #{} does not exist", index))
        })?;
        let name = match template.name {
            Some(name) => Some(self.code.string(name)?.to_string()),
            None => None,
        };
        let script = ScriptFunction {
            code: self.code.clone(),
            template: index as usize,
        };
        let function = self.realm.new_function(FunctionObject::script(name, script));
        function.define("prototype", Value::Object(self.realm.new_object()));
        Ok(function)
    }

    fn callee_function(callee: &Value) -> Result<FunctionObject> {
        match callee {
            Value::Object(object) => object
                .borrow()
                .as_function()
                .cloned()
                .ok_or_else(|| Error::TypeError(format!("{} is not a function", describe(callee)))),
            _ => Err(Error::TypeError(format!(
                "{} is not a function",
                describe(callee)
            ))),
        }
    }

    /// Calls a function value with a receiver.
    fn call(&mut self, callee: Value, this: Value, args: Vec<Value>) -> Result<()> {
        let function = Self::callee_function(&callee)?;
        debug!(
            function = function.name.as_deref().unwrap_or("<anonymous>"),
            args = args.len(),
            "call"
        );
        self.enter(function.call, &callee, this, args, None)
    }

    /// Constructs with a function value.
    ///
    /// Script constructors receive a fresh object whose prototype is the
    /// function's `prototype` property; it becomes the result unless the
    /// body returns an object of its own.
    fn construct(&mut self, callee: Value, args: Vec<Value>) -> Result<()> {
        let function = Self::callee_function(&callee)?;
        let Some(entry) = function.construct else {
            return Err(Error::TypeError(format!(
                "{} is not a constructor",
                describe(&callee)
            )));
        };
        debug!(
            function = function.name.as_deref().unwrap_or("<anonymous>"),
            args = args.len(),
            "construct"
        );
        match entry {
            EntryPoint::Native(_) => self.enter(entry, &callee, Value::Undefined, args, None),
            EntryPoint::Trampoline(_) => {
                let prototype = match &callee {
                    Value::Object(object) => match object.get("prototype") {
                        Value::Object(prototype) => prototype,
                        _ => self.realm.object_prototype.clone(),
                    },
                    _ => self.realm.object_prototype.clone(),
                };
                let target = ObjectRef::new(Object::new(ObjectKind::Plain).with_prototype(Some(&prototype)));
                let this = Value::Object(target.clone());
                self.enter(entry, &callee, this, args, Some(target))
            }
        }
    }

    /// Pushes a frame linked to the current one and enters the function.
    ///
    /// Native entries run to completion and their frame is torn down
    /// immediately. The trampoline only switches the instruction pointer;
    /// the callee's own `RETURN` produces the result.
    fn enter(
        &mut self,
        entry: EntryPoint,
        callee: &Value,
        this: Value,
        args: Vec<Value>,
        construct_target: Option<ObjectRef>,
    ) -> Result<()> {
        if self.frames.len() >= MAX_FRAMES {
            return Err(Error::VmError("maximum call depth exceeded".to_string()));
        }
        let outer = self.frames.len() - 1;
        let mut frame = StackFrame::new(outer, self.ip, self.code.clone());
        frame.construct_target = construct_target;

        match entry {
            EntryPoint::Native(native) => {
                self.frames.push(frame);
                let result = native(self, &this, &args);
                self.frames.pop();
                self.push(result?)
            }
            EntryPoint::Trampoline(script) => {
                let template = script
                    .code
                    .functions
                    .get(script.template)
                    .ok_or_else(|| Error::VmError("missing function template".to_string()))?;
                if template.self_binding {
                    if let Some(name) = template.name {
                        frame.bind(script.code.string(name)?.clone(), callee.clone());
                    }
                }
                frame.bind(Rc::from(THIS), this);
                let mut args = args.into_iter();
                for &param in &template.params {
                    let name = script.code.string(param)?.clone();
                    frame.bind(name, args.next().unwrap_or_default());
                }
                let entry = template.entry;
                self.frames.push(frame);
                self.code = script.code.clone();
                self.ip = entry;
                Ok(())
            }
        }
    }

    /// Pops the result and the current frame, then resumes the caller or halts.
    fn do_return(&mut self) -> Result<Option<Value>> {
        let mut frame = self
            .frames
            .pop()
            .ok_or_else(|| Error::VmError("RETURN without a frame".to_string()))?;
        let mut result = frame.stack.pop().unwrap_or_default();

        if let Some(target) = frame.construct_target.take() {
            if !matches!(result, Value::Object(_)) {
                result = Value::Object(target);
            }
        }

        if self.frames.is_empty() {
            self.restore_globals(frame);
            return Ok(Some(result));
        }

        if let Some(code) = frame.return_code.take() {
            self.code = code;
        }
        self.ip = frame.return_ip;
        trace!(ip = self.ip, "return");
        self.push(result)?;
        Ok(None)
    }
}

impl Default for Vm {
    fn default() -> Self {
        Self::new()
    }
}

/// The `+` operator: concatenation if either primitive is a string.
fn add(a: &Value, b: &Value) -> Result<Value> {
    let a = a.to_primitive()?;
    let b = b.to_primitive()?;
    if matches!(a, Value::String(_)) || matches!(b, Value::String(_)) {
        let mut s = a.to_js_string()?;
        s.push_str(&b.to_js_string()?);
        Ok(Value::String(s))
    } else {
        Ok(Value::Number(a.to_number()? + b.to_number()?))
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => format!("{:?}", s),
        Value::Object(_) => value.type_of().to_string(),
        _ => value.to_string(),
    }
}

fn bad_operand(offset: usize, instruction: Instruction) -> Error {
    Error::VmError(format!(
        "bad operand {:?} for {} at {:04}",
        instruction.operand, instruction.opcode, offset
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::FunctionTemplate;

    fn run(instructions: Vec<Instruction>) -> Result<Value> {
        let mut code = Bytecode::new();
        code.instructions = instructions;
        Vm::new().execute(Rc::new(code))
    }

    fn op(opcode: OpCode) -> Instruction {
        Instruction::simple(opcode)
    }

    fn num(n: f64) -> Instruction {
        Instruction::with_operand(OpCode::PushNumber, Operand::Number(n))
    }

    #[test]
    fn test_arithmetic() {
        let result = run(vec![num(2.0), num(3.0), op(OpCode::Add), op(OpCode::Return)]);
        assert_eq!(result.unwrap(), Value::Number(5.0));
    }

    #[test]
    fn test_running_off_the_end_is_undefined() {
        assert_eq!(run(vec![num(1.0)]).unwrap(), Value::Undefined);
    }

    #[test]
    fn test_return_with_empty_stack_is_undefined() {
        assert_eq!(run(vec![op(OpCode::Return)]).unwrap(), Value::Undefined);
    }

    #[test]
    fn test_zero_offset_jne_is_fatal() {
        let result = run(vec![
            op(OpCode::PushTrue),
            Instruction::with_operand(OpCode::Jne, Operand::Jump(0)),
            op(OpCode::Return),
        ]);
        assert!(matches!(result, Err(Error::VmError(_))));
    }

    #[test]
    fn test_jump_out_of_bounds_is_fatal() {
        let result = run(vec![Instruction::with_operand(OpCode::Jmp, Operand::Jump(5))]);
        assert!(matches!(result, Err(Error::VmError(_))));
        let result = run(vec![Instruction::with_operand(OpCode::Jmp, Operand::Jump(-2))]);
        assert!(matches!(result, Err(Error::VmError(_))));
    }

    #[test]
    fn test_jne_jumps_only_when_falsy() {
        // 0: PUSH_FALSE  1: JNE +2  2: PUSH 1  3: RETURN  4: PUSH 2  5: RETURN
        let code = vec![
            op(OpCode::PushFalse),
            Instruction::with_operand(OpCode::Jne, Operand::Jump(2)),
            num(1.0),
            op(OpCode::Return),
            num(2.0),
            op(OpCode::Return),
        ];
        assert_eq!(run(code.clone()).unwrap(), Value::Number(2.0));

        let mut truthy = code;
        truthy[0] = op(OpCode::PushTrue);
        assert_eq!(run(truthy).unwrap(), Value::Number(1.0));
    }

    #[test]
    fn test_load_of_missing_binding_is_reference_error() {
        let mut code = Bytecode::new();
        let name = code.strings.intern("nope");
        code.emit(Instruction::with_operand(OpCode::Load, Operand::Str(name)));
        let result = Vm::new().execute(Rc::new(code));
        assert_eq!(
            result,
            Err(Error::ReferenceError("nope is not defined".to_string()))
        );
    }

    #[test]
    fn test_store_of_missing_binding_is_reference_error() {
        let mut code = Bytecode::new();
        let name = code.strings.intern("nope");
        code.emit(num(1.0));
        code.emit(Instruction::with_operand(OpCode::Store, Operand::Str(name)));
        let result = Vm::new().execute(Rc::new(code));
        assert!(matches!(result, Err(Error::ReferenceError(_))));
    }

    #[test]
    fn test_calling_a_number_is_type_error() {
        let result = run(vec![
            num(1.0),
            Instruction::with_operand(OpCode::Call, Operand::ArgCount(0)),
        ]);
        assert!(matches!(result, Err(Error::TypeError(_))));
    }

    #[test]
    fn test_stack_underflow() {
        let result = run(vec![op(OpCode::Add)]);
        assert!(matches!(result, Err(Error::VmError(_))));
    }

    #[test]
    fn test_pop_on_empty_stack_is_allowed() {
        assert_eq!(run(vec![op(OpCode::Pop), op(OpCode::Return)]).unwrap(), Value::Undefined);
    }

    #[test]
    fn test_dup2_copies_top_pair() {
        let result = run(vec![
            num(1.0),
            num(2.0),
            op(OpCode::Dup2),
            op(OpCode::Add),
            op(OpCode::Return),
        ]);
        assert_eq!(result.unwrap(), Value::Number(3.0));
    }

    #[test]
    fn test_trampoline_call_binds_parameters() {
        // 0: PUSH 20  1: PUSH_FUNCTION #0  2: CALL 1  3: RETURN
        // 4: LOAD x   5: PUSH 1  6: ADD  7: RETURN
        let mut code = Bytecode::new();
        let x = code.strings.intern("x");
        code.functions.push(FunctionTemplate {
            name: None,
            params: vec![x],
            entry: 4,
            self_binding: false,
        });
        code.emit(num(20.0));
        code.emit(Instruction::with_operand(OpCode::PushFunction, Operand::Function(0)));
        code.emit(Instruction::with_operand(OpCode::Call, Operand::ArgCount(1)));
        code.emit(op(OpCode::Return));
        code.emit(Instruction::with_operand(OpCode::Load, Operand::Str(x)));
        code.emit(num(1.0));
        code.emit(op(OpCode::Add));
        code.emit(op(OpCode::Return));

        let result = Vm::new().execute(Rc::new(code));
        assert_eq!(result.unwrap(), Value::Number(21.0));
    }

    #[test]
    fn test_globals_are_restored_after_error() {
        let mut code = Bytecode::new();
        let a = code.strings.intern("a");
        code.emit(Instruction::with_operand(OpCode::Declare, Operand::Str(a)));
        code.emit(num(4.0));
        code.emit(Instruction::with_operand(OpCode::Store, Operand::Str(a)));
        code.emit(op(OpCode::Add));

        let mut vm = Vm::new();
        assert!(vm.execute(Rc::new(code)).is_err());
        assert_eq!(vm.global("a"), Some(Value::Number(4.0)));
        assert!(vm.global("Math").is_some());
    }

    #[test]
    fn test_temporaries_do_not_become_globals() {
        let mut code = Bytecode::new();
        let t = code.strings.intern("%t0");
        let b = code.strings.intern("b");
        code.emit(Instruction::with_operand(OpCode::Declare, Operand::Str(t)));
        code.emit(Instruction::with_operand(OpCode::Declare, Operand::Str(b)));
        code.emit(num(1.0));
        code.emit(Instruction::with_operand(OpCode::Store, Operand::Str(t)));
        code.emit(Instruction::with_operand(OpCode::Load, Operand::Str(t)));
        code.emit(op(OpCode::Return));

        let mut vm = Vm::new();
        assert_eq!(vm.execute(Rc::new(code)).unwrap(), Value::Number(1.0));
        assert_eq!(vm.global("%t0"), None);
        assert_eq!(vm.global("b"), Some(Value::Undefined));
    }

    #[test]
    fn test_member_access_on_undefined_is_type_error() {
        let vm = Vm::new();
        let result = vm.get_member(&Value::Undefined, &Value::from("x"));
        assert!(matches!(result, Err(Error::TypeError(_))));
    }

    #[test]
    fn test_string_members() {
        let vm = Vm::new();
        let s = Value::from("héllo");
        assert_eq!(vm.get_member(&s, &Value::from("length")).unwrap(), Value::Number(5.0));
        assert_eq!(vm.get_member(&s, &Value::Number(1.0)).unwrap(), Value::from("é"));
        assert!(vm.get_member(&s, &Value::from("charAt")).unwrap().is_function());
    }
}
