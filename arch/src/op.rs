use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Register operands an opcode expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegsNeeded {
    None,
    Source,
    Dest,
    Both,
}

/// Whether an opcode takes a trailing constant word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImmedNeeded {
    No,
    Yes,
    Optional,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpSpec {
    pub opcode: Opcode,
    pub regs: RegsNeeded,
    pub immed: ImmedNeeded,
}

// The discriminant is the opcode number stored in bits 14..8 of an
// instruction word. Append new opcodes at the end to keep existing images.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    IntoPrimitive,
    TryFromPrimitive,
    EnumString,
    EnumIter,
    Display,
)]
#[repr(u8)]
pub enum Opcode {
    NOP,
    MOV,
    ADD,
    ADC,
    SUB,
    SBC,
    AND,
    OR,
    XOR,
    CMP,
    CPC,
    LDI,
    ADDI,
    ADCI,
    SUBI,
    SBCI,
    ANDI,
    ORI,
    XORI,
    CPI,
    CPCI,
    LSL,
    LSR,
    ROL,
    ROR,
    ASR,
    SWAP,
    INC,
    DEC,
    LD,
    ST,
    LDS,
    STS,
    IN,
    OUT,
    BRZ,
    BRNZ,
    BRC,
    BRNC,
    JMP,
    RCALL,
    RRET,
    BREAK,
}

impl Opcode {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_ascii_uppercase().parse::<Self>() {
            Ok(op) => Ok(op),
            Err(_) => Err(format!("Undefined Op: {s}")),
        }
    }

    /// Number stored in the instruction word.
    pub fn code(self) -> u8 {
        self.into()
    }

    pub fn spec(self) -> OpSpec {
        use ImmedNeeded as I;
        use Opcode::*;
        use RegsNeeded as R;
        let (regs, immed) = match self {
            NOP => (R::None, I::No),
            MOV => (R::Both, I::No),
            ADD | ADC | SUB | SBC | AND | OR | XOR => (R::Both, I::No),
            CMP | CPC => (R::Both, I::No),
            LDI => (R::Dest, I::Yes),
            ADDI | ADCI | SUBI | SBCI | ANDI | ORI | XORI => (R::Dest, I::Yes),
            CPI | CPCI => (R::Dest, I::Yes),
            LSL | LSR | ROL | ROR | ASR | SWAP | INC | DEC => (R::Dest, I::No),
            LD | ST => (R::Both, I::Optional),
            LDS => (R::Dest, I::Yes),
            STS => (R::Source, I::Yes),
            IN => (R::Dest, I::Yes),
            OUT => (R::Source, I::Yes),
            BRZ | BRNZ | BRC | BRNC => (R::None, I::Yes),
            JMP => (R::None, I::Yes),
            RCALL => (R::Dest, I::Yes),
            RRET => (R::Source, I::No),
            BREAK => (R::None, I::No),
        };
        OpSpec {
            opcode: self,
            regs,
            immed,
        }
    }

    pub fn regs_needed(self) -> RegsNeeded {
        self.spec().regs
    }

    pub fn immed_needed(self) -> ImmedNeeded {
        self.spec().immed
    }
}
