//! Bytecode compiler.
//!
//! Transforms an AST into bytecode that can be executed by the VM. Two
//! generators target the same instruction set:
//!
//! - `codegen`: a direct tree walk that emits bytecode as it goes
//! - `tac`: lowering to three-address code, optional optimization passes,
//!   then a single emission pass
//!
//! Both share a [`CompileContext`] that owns the string table and the list of
//! function bodies still waiting to be generated.

pub mod bytecode;
pub mod codegen;
pub mod strings;
pub mod tac;

use std::collections::VecDeque;

use tracing::debug;

pub use bytecode::{Bytecode, FunctionTemplate, Instruction, OpCode, Operand};
pub use codegen::CodeGenerator;
pub use strings::StringTable;

use crate::ast::{Function, Program, Statement};
use crate::config::{EngineConfig, Pipeline};
use crate::{Error, Result};

/// A function body registered during generation but not emitted yet.
#[derive(Debug, Clone, Copy)]
pub struct PendingFunction<'a> {
    /// Index of the template reserved for the body
    pub index: u32,
    /// The function to generate
    pub function: &'a Function,
}

/// State shared by every function body generated for one program.
#[derive(Debug, Default)]
pub struct CompileContext<'a> {
    strings: StringTable,
    functions: Vec<FunctionTemplate>,
    pending: VecDeque<PendingFunction<'a>>,
}

impl<'a> CompileContext<'a> {
    /// Creates an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns a string, returning its table index.
    pub fn intern(&mut self, s: &str) -> u32 {
        self.strings.intern(s)
    }

    /// Reserves a template for `function` and queues its body.
    ///
    /// The entry address is filled in by [`CompileContext::set_entry`] once
    /// the body has been laid out.
    pub fn register_function(&mut self, function: &'a Function, self_binding: bool) -> u32 {
        let name = function.id.as_ref().map(|id| self.strings.intern(&id.name));
        let params = function
            .params
            .iter()
            .map(|param| self.strings.intern(&param.name))
            .collect();
        let index = self.functions.len() as u32;
        self.functions.push(FunctionTemplate {
            name,
            params,
            entry: 0,
            self_binding,
        });
        self.pending.push_back(PendingFunction { index, function });
        index
    }

    /// Takes the next queued body, in registration order.
    pub fn next_pending(&mut self) -> Option<PendingFunction<'a>> {
        self.pending.pop_front()
    }

    /// Records where a function body starts.
    pub fn set_entry(&mut self, index: u32, entry: usize) {
        if let Some(template) = self.functions.get_mut(index as usize) {
            template.entry = entry;
        }
    }

    /// Packages the generated instructions with the tables.
    pub fn finish(self, instructions: Vec<Instruction>) -> Bytecode {
        Bytecode {
            instructions,
            strings: self.strings,
            functions: self.functions,
        }
    }
}

/// Collects the function declarations of a body, including those nested in
/// blocks and control statements but not inside other functions.
pub(crate) fn hoisted_functions(body: &[Statement]) -> Vec<&Function> {
    fn visit<'a>(stmt: &'a Statement, out: &mut Vec<&'a Function>) {
        match stmt {
            Statement::FunctionDeclaration(function) => out.push(function),
            Statement::Block(block) => block.body.iter().for_each(|s| visit(s, out)),
            Statement::If(if_stmt) => {
                visit(&if_stmt.consequent, out);
                if let Some(alternate) = &if_stmt.alternate {
                    visit(alternate, out);
                }
            }
            Statement::While(while_stmt) => visit(&while_stmt.body, out),
            Statement::DoWhile(do_while) => visit(&do_while.body, out),
            Statement::For(for_stmt) => visit(&for_stmt.body, out),
            _ => {}
        }
    }

    let mut out = Vec::new();
    for stmt in body {
        visit(stmt, &mut out);
    }
    out
}

/// Computes the relative operand for a jump at `from` that lands on `to`.
pub(crate) fn jump_delta(from: usize, to: usize) -> Result<i32> {
    let delta = to as i64 - (from as i64 + 1);
    i32::try_from(delta)
        .map_err(|_| Error::CompileError(format!("jump from {} to {} is too far", from, to)))
}

/// Index of the statement whose value becomes the program result.
pub(crate) fn result_statement(body: &[Statement]) -> Option<usize> {
    body.iter()
        .rposition(|stmt| matches!(stmt, Statement::Expression(_)))
}

/// Compiles programs with the pipeline selected by an [`EngineConfig`].
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    config: EngineConfig,
}

impl Compiler {
    /// Creates a compiler for the given configuration.
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Compiles a program to bytecode.
    pub fn compile(&self, program: &Program) -> Result<Bytecode> {
        let bytecode = match self.config.pipeline {
            Pipeline::Direct => CodeGenerator::new().compile(program)?,
            Pipeline::Tac => tac::compile(program, &self.config.passes)?,
        };
        debug!(
            pipeline = %self.config.pipeline,
            instructions = bytecode.len(),
            functions = bytecode.functions.len(),
            "compiled program"
        );
        Ok(bytecode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    #[test]
    fn test_register_function_reserves_template() {
        let program = Parser::new("function f(a, b) {}").parse_program().unwrap();
        let Statement::FunctionDeclaration(function) = &program.body[0] else {
            panic!("expected a declaration");
        };

        let mut context = CompileContext::new();
        let index = context.register_function(function, false);
        context.set_entry(index, 9);
        let pending = context.next_pending().unwrap();
        assert_eq!(pending.index, 0);
        assert!(context.next_pending().is_none());

        let code = context.finish(Vec::new());
        assert_eq!(code.functions[0].entry, 9);
        assert_eq!(code.functions[0].params.len(), 2);
        assert_eq!(code.string(code.functions[0].params[1]).unwrap().as_ref(), "b");
    }

    #[test]
    fn test_hoisted_functions_skip_nested_bodies() {
        let src = "function a() { function inner() {} }\nif (x) { function b() {} }";
        let program = Parser::new(src).parse_program().unwrap();
        let names: Vec<_> = hoisted_functions(&program.body)
            .iter()
            .filter_map(|f| f.id.as_ref().map(|id| id.name.as_str()))
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_result_statement_is_last_expression() {
        let program = Parser::new("1; var a = 2; a; var b;").parse_program().unwrap();
        assert_eq!(result_statement(&program.body), Some(2));
    }
}
