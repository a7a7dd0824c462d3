//! Emission of three-address code as bytecode.

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use super::{Address, Label, TacFunction, TacInstr};
use crate::ast::Literal;
use crate::compiler::bytecode::{Bytecode, Instruction, OpCode, Operand};
use crate::compiler::{CompileContext, jump_delta};
use crate::{Error, Result};

/// Lays out every function in order and resolves their jumps.
pub(super) fn emit(context: CompileContext<'_>, functions: &[TacFunction]) -> Result<Bytecode> {
    let mut emitter = Emitter {
        context,
        instructions: Vec::new(),
    };
    for function in functions {
        if let Some(index) = function.template {
            let entry = emitter.instructions.len();
            emitter.context.set_entry(index, entry);
        }
        emitter.emit_function(function)?;
    }
    Ok(emitter.context.finish(emitter.instructions))
}

struct Emitter<'a> {
    context: CompileContext<'a>,
    instructions: Vec<Instruction>,
}

impl Emitter<'_> {
    fn emit_function(&mut self, function: &TacFunction) -> Result<()> {
        // Temporaries are declared up front so that stores always find them
        // in the function's own frame.
        let mut temps = BTreeSet::new();
        for instr in &function.body {
            temps.extend(instr.dest_temp());
            temps.extend(instr.operands().into_iter().filter_map(|a| match a {
                Address::Temp(t) => Some(*t),
                _ => None,
            }));
        }
        for temp in temps {
            let name = self.context.intern(&Address::temp_binding(temp));
            self.emit(Instruction::with_operand(OpCode::Declare, Operand::Str(name)));
        }

        let mut labels: FxHashMap<Label, usize> = FxHashMap::default();
        let mut fixups: Vec<(usize, Label)> = Vec::new();

        for instr in &function.body {
            match instr {
                TacInstr::Copy { dest, src } => {
                    self.load(src);
                    self.store(dest)?;
                }
                TacInstr::Binary {
                    dest,
                    op,
                    left,
                    right,
                } => {
                    self.load(left);
                    self.load(right);
                    self.emit(Instruction::simple(*op));
                    self.store_temp(*dest);
                }
                TacInstr::Unary { dest, op, arg } => {
                    self.load(arg);
                    self.emit(Instruction::simple(*op));
                    self.store_temp(*dest);
                }
                TacInstr::Declare(name) => {
                    let name = self.context.intern(name);
                    self.emit(Instruction::with_operand(OpCode::Declare, Operand::Str(name)));
                }
                TacInstr::Function { dest, index } => {
                    self.emit(Instruction::with_operand(
                        OpCode::PushFunction,
                        Operand::Function(*index),
                    ));
                    self.store_temp(*dest);
                }
                TacInstr::NewObject { dest } => {
                    self.emit(Instruction::simple(OpCode::NewObject));
                    self.store_temp(*dest);
                }
                TacInstr::NewArray { dest, elements } => {
                    for element in elements {
                        self.load(element);
                    }
                    self.emit(Instruction::with_operand(
                        OpCode::NewArray,
                        Operand::ArgCount(elements.len() as u32),
                    ));
                    self.store_temp(*dest);
                }
                TacInstr::GetMember { dest, object, key } => {
                    self.load(object);
                    self.load(key);
                    self.emit(Instruction::simple(OpCode::LoadMember));
                    self.store_temp(*dest);
                }
                TacInstr::SetMember { object, key, value } => {
                    self.load(object);
                    self.load(key);
                    self.load(value);
                    self.emit(Instruction::simple(OpCode::StoreMember));
                    self.emit(Instruction::simple(OpCode::Pop));
                }
                TacInstr::Call {
                    dest,
                    receiver,
                    args,
                    ..
                } => {
                    for operand in instr.operands() {
                        self.load(operand);
                    }
                    let opcode = if receiver.is_some() {
                        OpCode::CallMethod
                    } else {
                        OpCode::Call
                    };
                    self.emit(Instruction::with_operand(
                        opcode,
                        Operand::ArgCount(args.len() as u32),
                    ));
                    self.store_result(*dest);
                }
                TacInstr::New { dest, args, .. } => {
                    for operand in instr.operands() {
                        self.load(operand);
                    }
                    self.emit(Instruction::with_operand(
                        OpCode::New,
                        Operand::ArgCount(args.len() as u32),
                    ));
                    self.store_result(*dest);
                }
                TacInstr::Label(label) => {
                    labels.insert(*label, self.instructions.len());
                }
                TacInstr::Jump(label) => {
                    let at = self.emit(Instruction::with_operand(OpCode::Jmp, Operand::Jump(0)));
                    fixups.push((at, *label));
                }
                TacInstr::JumpIfFalse(cond, label) => {
                    self.load(cond);
                    let at = self.emit(Instruction::with_operand(OpCode::Jne, Operand::Jump(0)));
                    fixups.push((at, *label));
                }
                TacInstr::JumpIfTrue(cond, label) => {
                    self.load(cond);
                    self.emit(Instruction::simple(OpCode::Not));
                    let at = self.emit(Instruction::with_operand(OpCode::Jne, Operand::Jump(0)));
                    fixups.push((at, *label));
                }
                TacInstr::Return(value) => {
                    self.load(value);
                    self.emit(Instruction::simple(OpCode::Return));
                }
            }
        }

        for (at, label) in fixups {
            let target = labels
                .get(&label)
                .copied()
                .ok_or_else(|| Error::CompileError(format!("undefined label {}", label)))?;
            let delta = jump_delta(at, target)?;
            let instruction = &mut self.instructions[at];
            if delta == 0 && instruction.opcode == OpCode::Jne {
                *instruction = Instruction::simple(OpCode::Pop);
            } else {
                instruction.operand = Some(Operand::Jump(delta));
            }
        }
        Ok(())
    }

    fn emit(&mut self, instruction: Instruction) -> usize {
        let index = self.instructions.len();
        self.instructions.push(instruction);
        index
    }

    fn load(&mut self, address: &Address) {
        match address {
            Address::Var(name) => {
                let name = self.context.intern(name);
                self.emit(Instruction::with_operand(OpCode::Load, Operand::Str(name)));
            }
            Address::Temp(temp) => {
                let name = self.context.intern(&Address::temp_binding(*temp));
                self.emit(Instruction::with_operand(OpCode::Load, Operand::Str(name)));
            }
            Address::Const(lit) => {
                let instruction = match lit {
                    Literal::Number(n) => {
                        Instruction::with_operand(OpCode::PushNumber, Operand::Number(*n))
                    }
                    Literal::String(s) => {
                        Instruction::with_operand(OpCode::PushString, Operand::Str(self.context.intern(s)))
                    }
                    Literal::Boolean(true) => Instruction::simple(OpCode::PushTrue),
                    Literal::Boolean(false) => Instruction::simple(OpCode::PushFalse),
                    Literal::Null => Instruction::simple(OpCode::PushNull),
                    Literal::Undefined => Instruction::simple(OpCode::PushUndefined),
                };
                self.emit(instruction);
            }
        }
    }

    fn store(&mut self, address: &Address) -> Result<()> {
        match address {
            Address::Var(name) => {
                let name = self.context.intern(name);
                self.emit(Instruction::with_operand(OpCode::Store, Operand::Str(name)));
                Ok(())
            }
            Address::Temp(temp) => {
                self.store_temp(*temp);
                Ok(())
            }
            Address::Const(_) => Err(Error::CompileError(
                "cannot store into a constant".to_string(),
            )),
        }
    }

    fn store_temp(&mut self, temp: u32) {
        let name = self.context.intern(&Address::temp_binding(temp));
        self.emit(Instruction::with_operand(OpCode::Store, Operand::Str(name)));
    }

    fn store_result(&mut self, dest: Option<u32>) {
        match dest {
            Some(temp) => self.store_temp(temp),
            None => {
                self.emit(Instruction::simple(OpCode::Pop));
            }
        }
    }
}
