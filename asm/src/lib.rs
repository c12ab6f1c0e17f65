//! Two-pass assembler for the 16-bit teaching CPU.
//!
//! Instructions are collected into a [`Program`], validated against the
//! opcode table as they are added. [`Program::link`] assigns word addresses
//! and fills the label table, after which [`Program::encode`] (or
//! [`Program::write_hex`]) emits the machine code with every label resolved.

pub mod context;
pub mod error;
pub mod expr;
pub mod hex;
pub mod inst;
pub mod lexer;
pub mod parser;
pub mod program;
pub mod testbench;
pub mod util;

pub use arch::{Opcode, Reg, Word};
pub use context::Context;
pub use error::{Error, Mismatch};
pub use expr::{ArithmeticError, BinaryOp, Expr, UnaryOp};
pub use hex::{CodeSink, HexWriter};
pub use inst::Instruction;
pub use parser::{parse_into, parse_program};
pub use program::Program;
