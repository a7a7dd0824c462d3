//! Bytecode definitions and disassembly.

use std::fmt;
use std::rc::Rc;

use super::strings::StringTable;
use crate::runtime::value::number_to_string;
use crate::{Error, Result};

/// A compiled program: one flat instruction buffer shared by every function.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bytecode {
    /// The instructions
    pub instructions: Vec<Instruction>,
    /// Interned identifiers and string literals
    pub strings: StringTable,
    /// Templates for every function body laid out in `instructions`
    pub functions: Vec<FunctionTemplate>,
}

impl Bytecode {
    /// Creates a new empty bytecode chunk.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an instruction and returns its index.
    pub fn emit(&mut self, instruction: Instruction) -> usize {
        let index = self.instructions.len();
        self.instructions.push(instruction);
        index
    }

    /// Returns the number of instructions.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Returns true if there are no instructions.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Resolves an interned string.
    pub fn string(&self, index: u32) -> Result<&Rc<str>> {
        self.strings
            .get(index)
            .ok_or_else(|| Error::VmError(format!("string index {} out of range", index)))
    }

    /// Resolves the absolute target of a jump at `offset`.
    ///
    /// Offsets are relative to the instruction after the jump. Returns `None`
    /// when the target falls outside `0..=len`.
    pub fn jump_target(&self, offset: usize, delta: i32) -> Option<usize> {
        let target = offset as i64 + 1 + delta as i64;
        if target < 0 || target > self.instructions.len() as i64 {
            None
        } else {
            Some(target as usize)
        }
    }
}

/// A function body compiled into a [`Bytecode`] buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionTemplate {
    /// String index of the function name
    pub name: Option<u32>,
    /// String indices of the parameter names
    pub params: Vec<u32>,
    /// Index of the first instruction of the body
    pub entry: usize,
    /// Whether the name is bound to the function inside its own body
    pub self_binding: bool,
}

/// A single bytecode instruction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Instruction {
    /// The operation code
    pub opcode: OpCode,
    /// Optional operand
    pub operand: Option<Operand>,
}

impl Instruction {
    /// Creates a new instruction with no operand.
    pub fn simple(opcode: OpCode) -> Self {
        Self {
            opcode,
            operand: None,
        }
    }

    /// Creates a new instruction with an operand.
    pub fn with_operand(opcode: OpCode, operand: Operand) -> Self {
        Self {
            opcode,
            operand: Some(operand),
        }
    }
}

/// Instruction operands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Operand {
    /// Number literal
    Number(f64),
    /// String table index
    Str(u32),
    /// Relative jump offset, counted from the next instruction
    Jump(i32),
    /// Number of arguments or array elements
    ArgCount(u32),
    /// Function template index
    Function(u32),
}

/// Operation codes for the VM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    // Stack operations
    /// Push undefined
    PushUndefined,
    /// Push null
    PushNull,
    /// Push true
    PushTrue,
    /// Push false
    PushFalse,
    /// Push a number literal
    PushNumber,
    /// Push a string from the string table
    PushString,
    /// Push a new function object for a template
    PushFunction,
    /// Push a new empty plain object
    NewObject,
    /// Pop N values and push an array holding them in order
    NewArray,
    /// Pop the top value if there is one
    Pop,
    /// Duplicate the top value
    Dup,
    /// Duplicate the top two values
    Dup2,

    // Arithmetic operations
    /// Add or concatenate
    Add,
    /// Subtract
    Sub,
    /// Multiply
    Mul,
    /// Divide
    Div,
    /// Modulo
    Mod,
    /// Negate (unary minus)
    Neg,
    /// Unary plus (ToNumber)
    ToNumber,

    // Bitwise operations
    /// Bitwise AND
    BitAnd,
    /// Bitwise OR
    BitOr,
    /// Bitwise XOR
    BitXor,
    /// Bitwise NOT
    BitNot,
    /// Left shift
    Shl,
    /// Signed right shift
    Shr,
    /// Unsigned right shift
    Ushr,

    // Comparison operations
    /// Equal (==)
    Eq,
    /// Not equal (!=)
    Ne,
    /// Strict equal (===)
    StrictEq,
    /// Strict not equal (!==)
    StrictNe,
    /// Less than
    Lt,
    /// Less than or equal
    Le,
    /// Greater than
    Gt,
    /// Greater than or equal
    Ge,

    // Logical operations
    /// Logical NOT
    Not,
    /// typeof operator
    TypeOf,

    // Variable operations
    /// Create or reset a binding in the current frame
    Declare,
    /// Push the nearest binding on the frame chain
    Load,
    /// Pop into the nearest binding on the frame chain
    Store,

    // Property operations
    /// Pop key and receiver, push the property value
    LoadMember,
    /// Pop value, key and receiver, set the property, push the value
    StoreMember,

    // Control flow
    /// Unconditional relative jump
    Jmp,
    /// Pop, and jump if the value is falsy
    Jne,

    // Function operations
    /// Pop callee and N arguments, call
    Call,
    /// Pop callee, receiver and N arguments, call with the receiver
    CallMethod,
    /// Pop constructor and N arguments, construct
    New,
    /// Return from the current frame
    Return,
}

impl OpCode {
    /// The disassembly mnemonic.
    pub fn mnemonic(self) -> &'static str {
        match self {
            OpCode::PushUndefined => "PUSH_UNDEFINED",
            OpCode::PushNull => "PUSH_NULL",
            OpCode::PushTrue => "PUSH_TRUE",
            OpCode::PushFalse => "PUSH_FALSE",
            OpCode::PushNumber => "PUSH_NUMBER",
            OpCode::PushString => "PUSH_STRING",
            OpCode::PushFunction => "PUSH_FUNCTION",
            OpCode::NewObject => "NEW_OBJECT",
            OpCode::NewArray => "NEW_ARRAY",
            OpCode::Pop => "POP",
            OpCode::Dup => "DUP",
            OpCode::Dup2 => "DUP2",
            OpCode::Add => "ADD",
            OpCode::Sub => "SUB",
            OpCode::Mul => "MUL",
            OpCode::Div => "DIV",
            OpCode::Mod => "MOD",
            OpCode::Neg => "NEG",
            OpCode::ToNumber => "TO_NUMBER",
            OpCode::BitAnd => "BIT_AND",
            OpCode::BitOr => "BIT_OR",
            OpCode::BitXor => "BIT_XOR",
            OpCode::BitNot => "BIT_NOT",
            OpCode::Shl => "SHL",
            OpCode::Shr => "SHR",
            OpCode::Ushr => "USHR",
            OpCode::Eq => "EQ",
            OpCode::Ne => "NE",
            OpCode::StrictEq => "STRICT_EQ",
            OpCode::StrictNe => "STRICT_NE",
            OpCode::Lt => "LT",
            OpCode::Le => "LE",
            OpCode::Gt => "GT",
            OpCode::Ge => "GE",
            OpCode::Not => "NOT",
            OpCode::TypeOf => "TYPEOF",
            OpCode::Declare => "DECLARE",
            OpCode::Load => "LOAD",
            OpCode::Store => "STORE",
            OpCode::LoadMember => "LOAD_MEMBER",
            OpCode::StoreMember => "STORE_MEMBER",
            OpCode::Jmp => "JMP",
            OpCode::Jne => "JNE",
            OpCode::Call => "CALL",
            OpCode::CallMethod => "CALL_METHOD",
            OpCode::New => "NEW",
            OpCode::Return => "RETURN",
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

impl Bytecode {
    /// Renders one instruction with its operand resolved.
    pub fn disassemble_instruction(&self, offset: usize) -> String {
        let Some(instruction) = self.instructions.get(offset) else {
            return format!("{:04}  <out of range>", offset);
        };
        let mut line = format!("{:04}  {}", offset, instruction.opcode);
        match instruction.operand {
            None => {}
            Some(Operand::Number(n)) => line.push_str(&format!(" {}", number_to_string(n))),
            Some(Operand::Str(index)) => match self.strings.get(index) {
                Some(s) => line.push_str(&format!(" {:?}", s.as_ref())),
                None => line.push_str(&format!(" <string {}>", index)),
            },
            Some(Operand::Jump(delta)) => {
                let sign = if delta >= 0 { "+" } else { "" };
                match self.jump_target(offset, delta) {
                    Some(target) => {
                        line.push_str(&format!(" {}{} (-> {:04})", sign, delta, target))
                    }
                    None => line.push_str(&format!(" {}{} (-> out of range)", sign, delta)),
                }
            }
            Some(Operand::ArgCount(count)) => line.push_str(&format!(" {}", count)),
            Some(Operand::Function(index)) => {
                line.push_str(&format!(" #{}", index));
                if let Some(template) = self.functions.get(index as usize) {
                    let name = template
                        .name
                        .and_then(|name| self.strings.get(name))
                        .map(|name| name.to_string())
                        .unwrap_or_else(|| "<anonymous>".to_string());
                    line.push_str(&format!(" {} @{:04}", name, template.entry));
                }
            }
        }
        line
    }
}

impl fmt::Display for Bytecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for offset in 0..self.instructions.len() {
            writeln!(f, "{}", self.disassemble_instruction(offset))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_returns_index() {
        let mut code = Bytecode::new();
        assert_eq!(code.emit(Instruction::simple(OpCode::PushTrue)), 0);
        assert_eq!(code.emit(Instruction::simple(OpCode::Return)), 1);
        assert_eq!(code.len(), 2);
    }

    #[test]
    fn test_jump_target_bounds() {
        let mut code = Bytecode::new();
        for _ in 0..4 {
            code.emit(Instruction::simple(OpCode::Pop));
        }
        assert_eq!(code.jump_target(0, 2), Some(3));
        assert_eq!(code.jump_target(0, 3), Some(4));
        assert_eq!(code.jump_target(0, 4), None);
        assert_eq!(code.jump_target(3, -4), Some(0));
        assert_eq!(code.jump_target(3, -5), None);
    }

    #[test]
    fn test_disassembly_resolves_operands() {
        let mut code = Bytecode::new();
        let name = code.strings.intern("a");
        code.emit(Instruction::with_operand(OpCode::Load, Operand::Str(name)));
        code.emit(Instruction::with_operand(OpCode::Jne, Operand::Jump(1)));
        code.emit(Instruction::with_operand(OpCode::PushNumber, Operand::Number(2.5)));
        code.emit(Instruction::with_operand(OpCode::Jmp, Operand::Jump(-3)));

        let listing = code.to_string();
        let lines: Vec<_> = listing.lines().collect();
        assert_eq!(lines[0], "0000  LOAD \"a\"");
        assert_eq!(lines[1], "0001  JNE +1 (-> 0003)");
        assert_eq!(lines[2], "0002  PUSH_NUMBER 2.5");
        assert_eq!(lines[3], "0003  JMP -3 (-> 0001)");
    }

    #[test]
    fn test_disassembly_of_function_operand() {
        let mut code = Bytecode::new();
        let name = code.strings.intern("fib");
        code.functions.push(FunctionTemplate {
            name: Some(name),
            params: vec![],
            entry: 2,
            self_binding: false,
        });
        code.emit(Instruction::with_operand(OpCode::PushFunction, Operand::Function(0)));
        assert_eq!(code.disassemble_instruction(0), "0000  PUSH_FUNCTION #0 fib @0002");
    }

    #[test]
    fn test_string_lookup_out_of_range() {
        let code = Bytecode::new();
        assert!(matches!(code.string(3), Err(Error::VmError(_))));
    }
}
