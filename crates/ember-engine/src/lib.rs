// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # ember-engine
//!
//! A small bytecode engine for a dynamic, JavaScript-like language.
//!
//! ## Overview
//!
//! This crate provides:
//! - A lexer and recursive-descent parser for a closed JavaScript subset
//! - Two interchangeable code generators targeting one stack-machine ISA:
//!   a direct tree-walking emitter and a three-address-code (TAC) pipeline
//!   with optional optimization passes
//! - A stack virtual machine with call frames, dynamic scope resolution and
//!   a native call/construct protocol
//! - A tagged value type and a prototype-style object model
//! - A handful of built-in objects (Object, Array, String, Math, console, ...)
//!
//! ## Quick Start
//!
//! ```rust
//! use ember_engine::{Engine, Value};
//!
//! let mut engine = Engine::new();
//! let result = engine.eval("1 + 2").unwrap();
//! assert_eq!(result, Value::Number(3.0));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ast;
pub mod builtins;
pub mod compiler;
pub mod config;
pub mod lexer;
pub mod parser;
pub mod runtime;
pub mod vm;

use std::path::Path;
use std::rc::Rc;

use thiserror::Error;
use tracing::debug;

// Re-exports for convenience
pub use compiler::{Bytecode, Compiler};
pub use config::{EngineConfig, OptimizationPasses, Pipeline};
pub use runtime::value::Value;
pub use vm::Vm;

/// The main engine instance.
///
/// Owns a virtual machine whose global bindings persist across calls to
/// [`Engine::eval`], so a REPL session can build on earlier input.
pub struct Engine {
    config: EngineConfig,
    vm: Vm,
}

impl Engine {
    /// Creates a new engine with the default configuration.
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    /// Creates a new engine with the given configuration.
    pub fn with_config(config: EngineConfig) -> Self {
        Self {
            config,
            vm: Vm::new(),
        }
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Replaces the active configuration. Globals are kept.
    pub fn set_config(&mut self, config: EngineConfig) {
        self.config = config;
    }

    /// Parses and compiles source code without running it.
    pub fn compile(&self, source: &str) -> Result<Bytecode> {
        let program = parser::Parser::new(source).parse_program()?;
        debug!(statements = program.body.len(), "parsed program");
        Compiler::new(self.config.clone()).compile(&program)
    }

    /// Evaluates source code and returns the program result.
    ///
    /// The result is the value of the last top-level expression statement,
    /// or `undefined` when there is none.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use ember_engine::{Engine, Value};
    ///
    /// let mut engine = Engine::new();
    /// engine.eval("var a = 20;").unwrap();
    /// assert_eq!(engine.eval("a + 2").unwrap(), Value::Number(22.0));
    /// ```
    pub fn eval(&mut self, source: &str) -> Result<Value> {
        let bytecode = self.compile(source)?;
        self.vm.execute(Rc::new(bytecode))
    }

    /// Evaluates source code from a file.
    pub fn eval_file(&mut self, path: &Path) -> Result<Value> {
        let source = std::fs::read_to_string(path).map_err(|e| Error::Io(e.to_string()))?;
        self.eval(&source)
    }

    /// Compiles source code and renders its disassembly.
    pub fn disassemble(&self, source: &str) -> Result<String> {
        Ok(self.compile(source)?.to_string())
    }

    /// Looks up a global binding left behind by earlier evaluations.
    pub fn global(&self, name: &str) -> Option<Value> {
        self.vm.global(name)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur while compiling or running a program.
///
/// Every error is fatal to the current run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Syntax error during parsing
    #[error("SyntaxError: {0}")]
    SyntaxError(String),
    /// Malformed input reaching code generation
    #[error("CompileError: {0}")]
    CompileError(String),
    /// Invalid conversion or a non-callable callee
    #[error("TypeError: {0}")]
    TypeError(String),
    /// Reference to an unbound variable
    #[error("ReferenceError: {0}")]
    ReferenceError(String),
    /// Violation of a bytecode invariant (bad jump, stack underflow, ...)
    #[error("VmError: {0}")]
    VmError(String),
    /// I/O error
    #[error("IOError: {0}")]
    Io(String),
}

/// Result type used throughout the engine.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eval_returns_last_expression() {
        let mut engine = Engine::new();
        assert_eq!(engine.eval("1; 2; 3").unwrap(), Value::Number(3.0));
    }

    #[test]
    fn test_eval_without_expression_is_undefined() {
        let mut engine = Engine::new();
        assert_eq!(engine.eval("var a = 1;").unwrap(), Value::Undefined);
    }

    #[test]
    fn test_globals_survive_between_evals() {
        let mut engine = Engine::new();
        engine.eval("function sq(x) { return x * x; }").unwrap();
        assert_eq!(engine.eval("sq(7)").unwrap(), Value::Number(49.0));
        assert_eq!(engine.global("sq").map(|v| v.is_function()), Some(true));
    }

    #[test]
    fn test_error_display() {
        let err = Error::ReferenceError("x is not defined".into());
        assert_eq!(err.to_string(), "ReferenceError: x is not defined");
    }

    #[test]
    fn test_syntax_error_is_reported() {
        let mut engine = Engine::new();
        assert!(matches!(engine.eval("var = ;"), Err(Error::SyntaxError(_))));
    }

    #[test]
    fn test_disassemble_lists_instructions() {
        let engine = Engine::with_config(EngineConfig::default().with_pipeline(Pipeline::Direct));
        let listing = engine.disassemble("1 + 2").unwrap();
        assert!(listing.contains("ADD"));
        assert!(listing.contains("RETURN"));
    }
}
