//! Three-address code pipeline.
//!
//! The tree is first lowered to a flat list of [`TacInstr`] per function,
//! with explicit labels for every jump target. Optional passes then rewrite
//! each list, and a single emission pass turns it into bytecode.
//!
//! Temporaries are single values named `tN`. At run time they live as hidden
//! frame bindings (`%tN`) declared when the function is entered.

mod emit;
mod lower;
mod optimize;

use std::fmt;

use tracing::trace;

pub use lower::lower_program;
pub use optimize::optimize;

use crate::ast::{Literal, Program};
use crate::compiler::bytecode::{Bytecode, OpCode};
use crate::compiler::CompileContext;
use crate::config::OptimizationPasses;
use crate::runtime::value::number_to_string;
use crate::Result;

/// Compiles a program through the TAC pipeline.
pub fn compile(program: &Program, passes: &OptimizationPasses) -> Result<Bytecode> {
    let mut context = CompileContext::new();
    let mut functions = lower_program(program, &mut context)?;
    for function in &mut functions {
        optimize(function, passes);
        trace!(function = ?function.template, "optimized TAC:\n{}", function);
    }
    emit::emit(context, &functions)
}

/// A jump target inside one function.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(pub u32);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// An operand or result location.
#[derive(Debug, Clone, PartialEq)]
pub enum Address {
    /// A named variable, resolved on the frame chain
    Var(String),
    /// A literal value
    Const(Literal),
    /// A compiler-generated temporary
    Temp(u32),
}

impl Address {
    /// Name of the frame binding that holds temporary `n`.
    pub fn temp_binding(n: u32) -> String {
        format!("%t{}", n)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Var(name) => write!(f, "{}", name),
            Address::Temp(n) => write!(f, "t{}", n),
            Address::Const(lit) => match lit {
                Literal::Number(n) => write!(f, "{}", number_to_string(*n)),
                Literal::String(s) => write!(f, "{:?}", s),
                Literal::Boolean(b) => write!(f, "{}", b),
                Literal::Null => write!(f, "null"),
                Literal::Undefined => write!(f, "undefined"),
            },
        }
    }
}

/// A three-address instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum TacInstr {
    /// `dest = src`; a `Var` destination is a variable store
    Copy { dest: Address, src: Address },
    /// `dest = left op right`
    Binary {
        dest: u32,
        op: OpCode,
        left: Address,
        right: Address,
    },
    /// `dest = op arg`
    Unary { dest: u32, op: OpCode, arg: Address },
    /// Create or reset a binding in the current frame
    Declare(String),
    /// `dest = function #index`
    Function { dest: u32, index: u32 },
    /// `dest = {}`
    NewObject { dest: u32 },
    /// `dest = [elements]`
    NewArray { dest: u32, elements: Vec<Address> },
    /// `dest = object[key]`
    GetMember {
        dest: u32,
        object: Address,
        key: Address,
    },
    /// `object[key] = value`
    SetMember {
        object: Address,
        key: Address,
        value: Address,
    },
    /// `dest = callee(args)`, with a receiver for method calls
    Call {
        dest: Option<u32>,
        callee: Address,
        receiver: Option<Address>,
        args: Vec<Address>,
    },
    /// `dest = new callee(args)`
    New {
        dest: Option<u32>,
        callee: Address,
        args: Vec<Address>,
    },
    /// A jump target
    Label(Label),
    /// Unconditional jump
    Jump(Label),
    /// Jump when the condition is falsy
    JumpIfFalse(Address, Label),
    /// Jump when the condition is truthy
    JumpIfTrue(Address, Label),
    /// Return from the function
    Return(Address),
}

impl TacInstr {
    /// The temporary this instruction defines, if any.
    pub fn dest_temp(&self) -> Option<u32> {
        match self {
            TacInstr::Copy {
                dest: Address::Temp(t),
                ..
            } => Some(*t),
            TacInstr::Binary { dest, .. }
            | TacInstr::Unary { dest, .. }
            | TacInstr::Function { dest, .. }
            | TacInstr::NewObject { dest }
            | TacInstr::NewArray { dest, .. }
            | TacInstr::GetMember { dest, .. } => Some(*dest),
            TacInstr::Call { dest, .. } | TacInstr::New { dest, .. } => *dest,
            _ => None,
        }
    }

    /// The addresses this instruction reads, in evaluation order.
    pub fn operands(&self) -> Vec<&Address> {
        match self {
            TacInstr::Copy { src, .. } => vec![src],
            TacInstr::Binary { left, right, .. } => vec![left, right],
            TacInstr::Unary { arg, .. } => vec![arg],
            TacInstr::NewArray { elements, .. } => elements.iter().collect(),
            TacInstr::GetMember { object, key, .. } => vec![object, key],
            TacInstr::SetMember { object, key, value } => vec![object, key, value],
            TacInstr::Call {
                callee,
                receiver,
                args,
                ..
            } => {
                let mut operands: Vec<&Address> = args.iter().collect();
                operands.extend(receiver.iter());
                operands.push(callee);
                operands
            }
            TacInstr::New { callee, args, .. } => {
                let mut operands: Vec<&Address> = args.iter().collect();
                operands.push(callee);
                operands
            }
            TacInstr::JumpIfFalse(cond, _) | TacInstr::JumpIfTrue(cond, _) => vec![cond],
            TacInstr::Return(value) => vec![value],
            TacInstr::Declare(_)
            | TacInstr::Function { .. }
            | TacInstr::NewObject { .. }
            | TacInstr::Label(_)
            | TacInstr::Jump(_) => Vec::new(),
        }
    }

    /// Mutable access to the addresses this instruction reads.
    pub fn operands_mut(&mut self) -> Vec<&mut Address> {
        match self {
            TacInstr::Copy { src, .. } => vec![src],
            TacInstr::Binary { left, right, .. } => vec![left, right],
            TacInstr::Unary { arg, .. } => vec![arg],
            TacInstr::NewArray { elements, .. } => elements.iter_mut().collect(),
            TacInstr::GetMember { object, key, .. } => vec![object, key],
            TacInstr::SetMember { object, key, value } => vec![object, key, value],
            TacInstr::Call {
                callee,
                receiver,
                args,
                ..
            } => {
                let mut operands: Vec<&mut Address> = args.iter_mut().collect();
                operands.extend(receiver.iter_mut());
                operands.push(callee);
                operands
            }
            TacInstr::New { callee, args, .. } => {
                let mut operands: Vec<&mut Address> = args.iter_mut().collect();
                operands.push(callee);
                operands
            }
            TacInstr::JumpIfFalse(cond, _) | TacInstr::JumpIfTrue(cond, _) => vec![cond],
            TacInstr::Return(value) => vec![value],
            TacInstr::Declare(_)
            | TacInstr::Function { .. }
            | TacInstr::NewObject { .. }
            | TacInstr::Label(_)
            | TacInstr::Jump(_) => Vec::new(),
        }
    }

    /// Returns true for calls and constructions, which may run arbitrary code.
    pub fn is_call(&self) -> bool {
        matches!(self, TacInstr::Call { .. } | TacInstr::New { .. })
    }

    /// Returns true if this instruction ends or starts a basic block.
    pub fn is_block_boundary(&self) -> bool {
        matches!(
            self,
            TacInstr::Label(_)
                | TacInstr::Jump(_)
                | TacInstr::JumpIfFalse(..)
                | TacInstr::JumpIfTrue(..)
                | TacInstr::Return(_)
        )
    }

    /// Returns true if this instruction writes the variable `name`.
    pub fn writes_var(&self, name: &str) -> bool {
        match self {
            TacInstr::Copy {
                dest: Address::Var(var),
                ..
            } => var == name,
            TacInstr::Declare(var) => var == name,
            _ => false,
        }
    }
}

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Address]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for TacInstr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TacInstr::Copy { dest, src } => write!(f, "{} = {}", dest, src),
            TacInstr::Binary {
                dest,
                op,
                left,
                right,
            } => write!(f, "t{} = {} {}, {}", dest, op, left, right),
            TacInstr::Unary { dest, op, arg } => write!(f, "t{} = {} {}", dest, op, arg),
            TacInstr::Declare(name) => write!(f, "declare {}", name),
            TacInstr::Function { dest, index } => write!(f, "t{} = function #{}", dest, index),
            TacInstr::NewObject { dest } => write!(f, "t{} = {{}}", dest),
            TacInstr::NewArray { dest, elements } => {
                write!(f, "t{} = [", dest)?;
                write_list(f, elements)?;
                write!(f, "]")
            }
            TacInstr::GetMember { dest, object, key } => {
                write!(f, "t{} = {}[{}]", dest, object, key)
            }
            TacInstr::SetMember { object, key, value } => {
                write!(f, "{}[{}] = {}", object, key, value)
            }
            TacInstr::Call {
                dest,
                callee,
                receiver,
                args,
            } => {
                if let Some(dest) = dest {
                    write!(f, "t{} = ", dest)?;
                }
                write!(f, "call {}", callee)?;
                if let Some(receiver) = receiver {
                    write!(f, " on {}", receiver)?;
                }
                write!(f, "(")?;
                write_list(f, args)?;
                write!(f, ")")
            }
            TacInstr::New { dest, callee, args } => {
                if let Some(dest) = dest {
                    write!(f, "t{} = ", dest)?;
                }
                write!(f, "new {}(", callee)?;
                write_list(f, args)?;
                write!(f, ")")
            }
            TacInstr::Label(label) => write!(f, "{}:", label),
            TacInstr::Jump(label) => write!(f, "goto {}", label),
            TacInstr::JumpIfFalse(cond, label) => write!(f, "if !{} goto {}", cond, label),
            TacInstr::JumpIfTrue(cond, label) => write!(f, "if {} goto {}", cond, label),
            TacInstr::Return(value) => write!(f, "return {}", value),
        }
    }
}

/// The lowered body of one function, or of the top-level code.
#[derive(Debug, Clone, PartialEq)]
pub struct TacFunction {
    /// Template index; `None` for the top-level code
    pub template: Option<u32>,
    /// The instructions
    pub body: Vec<TacInstr>,
}

impl fmt::Display for TacFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for instr in &self.body {
            if matches!(instr, TacInstr::Label(_)) {
                writeln!(f, "{}", instr)?;
            } else {
                writeln!(f, "    {}", instr)?;
            }
        }
        Ok(())
    }
}
