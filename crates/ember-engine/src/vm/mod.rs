//! The bytecode virtual machine.
//!
//! ## Structure
//!
//! - `interpreter` - The dispatch loop, frames, name resolution and the
//!   call/construct protocol
//! - `comparison` - Equality and relational comparison

mod interpreter;

pub mod comparison;

// Re-export public API
pub use interpreter::Vm;
