//! Parser for Ember source code.
//!
//! Transforms a stream of tokens into an Abstract Syntax Tree (AST).
//!
//! ## Usage
//!
//! ```rust
//! use ember_engine::parser::Parser;
//!
//! let mut parser = Parser::new("var x = 1 + 2;");
//! let program = parser.parse_program().expect("Should parse");
//! ```

mod parser;

pub use parser::Parser;
