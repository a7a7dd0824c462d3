//! Lexical analysis (tokenization) for Ember source code.
//!
//! The lexer transforms source text into a stream of tokens that can be
//! consumed by the parser. Each token records whether a line break came
//! before it, which the parser uses for automatic semicolon insertion.
//!
//! ## Usage
//!
//! ```rust
//! use ember_engine::lexer::{Scanner, TokenKind};
//!
//! let mut scanner = Scanner::new("var x = 42;");
//!
//! loop {
//!     let token = scanner.next_token();
//!     if matches!(token.kind, TokenKind::Eof) {
//!         break;
//!     }
//!     println!("{:?}", token.kind);
//! }
//! ```

mod scanner;
mod token;

pub use scanner::Scanner;
pub use token::{Span, Token, TokenKind};
