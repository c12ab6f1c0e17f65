//! Instruction set of the 16-bit teaching CPU.
//!
//! Everything here is static data: the opcode table with the operand shape
//! each opcode expects, and the register file names.

pub mod op;
pub mod reg;

pub use op::{ImmedNeeded, OpSpec, Opcode, RegsNeeded};
pub use reg::Reg;

/// Machine word of the CPU.
pub type Word = u16;
