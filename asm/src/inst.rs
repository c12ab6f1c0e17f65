use std::fmt;

use arch::{ImmedNeeded, Opcode, Reg, RegsNeeded, Word};

use crate::context::Context;
use crate::error::{Error, Mismatch};
use crate::expr::{ArithmeticError, Expr};
use crate::hex::CodeSink;

/// Set in the instruction word when a constant word follows it.
pub const LONG: Word = 0x8000;

/// One program step, validated against its opcode's operand shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    opcode: Opcode,
    dest: Reg,
    source: Reg,
    expr: Option<Expr>,
    label: Option<String>,
    size: usize,
}

impl Instruction {
    /// General form: registers are taken as given, only the constant is
    /// checked against the opcode.
    pub fn new(opcode: Opcode, dest: Reg, source: Reg, expr: Option<Expr>) -> Result<Self, Error> {
        match (opcode.immed_needed(), &expr) {
            (ImmedNeeded::No, Some(_)) => {
                return Err(Error::OperandMismatch(opcode, Mismatch::NoConstant))
            }
            (ImmedNeeded::Yes, None) => {
                return Err(Error::OperandMismatch(opcode, Mismatch::NeedsConstant))
            }
            _ => {}
        }
        let size = if expr.is_some() { 2 } else { 1 };
        Ok(Instruction {
            opcode,
            dest,
            source,
            expr,
            label: None,
            size,
        })
    }

    /// Single register form; the register lands in whichever field the
    /// opcode reads, the other field is R0.
    pub fn with_reg(opcode: Opcode, reg: Reg, expr: Option<Expr>) -> Result<Self, Error> {
        match opcode.regs_needed() {
            RegsNeeded::Source => Self::new(opcode, Reg::R0, reg, expr),
            RegsNeeded::Dest => Self::new(opcode, reg, Reg::R0, expr),
            RegsNeeded::None => Err(Error::OperandMismatch(opcode, Mismatch::NoRegister)),
            RegsNeeded::Both => Err(Error::OperandMismatch(opcode, Mismatch::NeedsBothRegisters)),
        }
    }

    pub fn with_regs(opcode: Opcode, dest: Reg, source: Reg) -> Result<Self, Error> {
        if opcode.regs_needed() != RegsNeeded::Both {
            return Err(Error::OperandMismatch(opcode, Mismatch::NeedsBothRegisters));
        }
        Self::new(opcode, dest, source, None)
    }

    pub fn with_expr(opcode: Opcode, expr: Option<Expr>) -> Result<Self, Error> {
        match opcode.regs_needed() {
            RegsNeeded::None => Self::new(opcode, Reg::R0, Reg::R0, expr),
            RegsNeeded::Both => Err(Error::OperandMismatch(opcode, Mismatch::NeedsBothRegisters)),
            _ => Err(Error::OperandMismatch(opcode, Mismatch::NeedsRegister)),
        }
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn dest(&self) -> Reg {
        self.dest
    }

    pub fn source(&self) -> Reg {
        self.source
    }

    pub fn expr(&self) -> Option<&Expr> {
        self.expr.as_ref()
    }

    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    pub(crate) fn set_label(&mut self, label: String) {
        self.label = Some(label);
    }

    /// Words occupied in the image. Depends only on whether a constant is
    /// present, never on its value.
    pub fn size(&self) -> usize {
        self.size
    }

    /// First word: long flag, opcode number, dest and source fields.
    pub fn word(&self) -> Word {
        let long = if self.expr.is_some() { LONG } else { 0 };
        long | (self.opcode.code() as Word) << 8
            | Word::from(self.dest) << 4
            | Word::from(self.source)
    }

    /// Push the machine words of this instruction, evaluating the constant
    /// against `ctx`, whose address must be this instruction's address.
    pub fn encode<S: CodeSink + ?Sized>(&self, ctx: &Context, sink: &mut S) -> Result<(), Error> {
        let constant = match &self.expr {
            Some(expr) => Some(to_word(expr.eval(ctx)?)?),
            None => None,
        };
        sink.push(self.word())?;
        if let Some(constant) = constant {
            sink.push(constant)?;
        }
        Ok(())
    }
}

fn to_word(value: i64) -> Result<Word, ArithmeticError> {
    if (-0x8000..=0xFFFF).contains(&value) {
        Ok(value as Word)
    } else {
        Err(ArithmeticError::OutOfRange(value))
    }
}

impl Instruction {
    /// Assembly text without the label.
    pub fn asm(&self) -> String {
        let mut args = Vec::new();
        match self.opcode.regs_needed() {
            RegsNeeded::None => {}
            RegsNeeded::Source => args.push(self.source.to_string()),
            RegsNeeded::Dest => args.push(self.dest.to_string()),
            RegsNeeded::Both => {
                args.push(self.dest.to_string());
                args.push(self.source.to_string());
            }
        }
        if let Some(expr) = &self.expr {
            args.push(expr.to_string());
        }
        if args.is_empty() {
            self.opcode.to_string()
        } else {
            format!("{} {}", self.opcode, args.join(", "))
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(label) = &self.label {
            write!(f, "{label}: ")?;
        }
        write!(f, "{}", self.asm())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(inst: &Instruction, ctx: &Context) -> Vec<Word> {
        let mut code = Vec::new();
        inst.encode(ctx, &mut code).unwrap();
        code
    }

    fn mismatch(result: Result<Instruction, Error>) -> Mismatch {
        match result {
            Err(Error::OperandMismatch(_, m)) => m,
            other => panic!("expected an operand mismatch, got {:?}", other),
        }
    }

    #[test]
    fn two_register_word_layout() {
        let inst = Instruction::with_regs(Opcode::ADD, Reg::R1, Reg::R2).unwrap();
        let code = words(&inst, &Context::new());
        assert_eq!(code.len(), 1);
        assert_eq!(code[0] & LONG, 0);
        assert_eq!((code[0] >> 8) & 0x7F, Opcode::ADD.code() as Word);
        assert_eq!((code[0] >> 4) & 0xF, 1);
        assert_eq!(code[0] & 0xF, 2);
    }

    #[test]
    fn constant_follows_instruction_word() {
        let inst = Instruction::with_reg(Opcode::LDI, Reg::R3, Some(Expr::Lit(0x1234))).unwrap();
        let code = words(&inst, &Context::new());
        assert_eq!(code, vec![LONG | (Opcode::LDI.code() as Word) << 8 | 0x30, 0x1234]);
    }

    #[test]
    fn negative_constant_is_twos_complement() {
        let inst = Instruction::with_expr(Opcode::JMP, Some(Expr::Lit(-1))).unwrap();
        assert_eq!(words(&inst, &Context::new())[1], 0xFFFF);
    }

    #[test]
    fn constant_out_of_range() {
        for value in [0x10000, -0x8001] {
            let inst = Instruction::with_expr(Opcode::JMP, Some(Expr::Lit(value))).unwrap();
            let mut code = Vec::new();
            let err = inst.encode(&Context::new(), &mut code).unwrap_err();
            assert!(matches!(
                err,
                Error::Arithmetic(ArithmeticError::OutOfRange(v)) if v == value
            ));
            assert!(code.is_empty());
        }
    }

    #[test]
    fn size_depends_on_constant_presence_only() {
        let short = Instruction::new(Opcode::LD, Reg::R1, Reg::R2, None).unwrap();
        let zero = Instruction::new(Opcode::LD, Reg::R1, Reg::R2, Some(Expr::Lit(0))).unwrap();
        let far = Instruction::new(Opcode::LD, Reg::R1, Reg::R2, Some(Expr::ident("far"))).unwrap();
        assert_eq!(short.size(), 1);
        assert_eq!(zero.size(), 2);
        assert_eq!(far.size(), 2);
    }

    #[test]
    fn single_register_routing() {
        let inc = Instruction::with_reg(Opcode::INC, Reg::R5, None).unwrap();
        assert_eq!((inc.dest(), inc.source()), (Reg::R5, Reg::R0));
        let out = Instruction::with_reg(Opcode::OUT, Reg::R5, Some(Expr::Lit(2))).unwrap();
        assert_eq!((out.dest(), out.source()), (Reg::R0, Reg::R5));
    }

    macro_rules! test_mismatch {
        ($($name:ident: $result:expr => $kind:ident,)*) => {
            $(
                #[test]
                fn $name() {
                    assert_eq!(mismatch($result), Mismatch::$kind);
                }
            )*
        }
    }

    test_mismatch! {
        constant_not_wanted: Instruction::new(Opcode::ADD, Reg::R0, Reg::R1, Some(Expr::Lit(1))) => NoConstant,
        constant_missing: Instruction::new(Opcode::LDI, Reg::R0, Reg::R0, None) => NeedsConstant,
        register_not_wanted: Instruction::with_reg(Opcode::BRNZ, Reg::R0, Some(Expr::Lit(1))) => NoRegister,
        one_register_for_two: Instruction::with_reg(Opcode::MOV, Reg::R0, None) => NeedsBothRegisters,
        two_registers_for_one: Instruction::with_regs(Opcode::INC, Reg::R0, Reg::R1) => NeedsBothRegisters,
        register_missing: Instruction::with_expr(Opcode::LDI, Some(Expr::Lit(1))) => NeedsRegister,
        registers_missing: Instruction::with_expr(Opcode::LD, None) => NeedsBothRegisters,
        jump_without_target: Instruction::with_expr(Opcode::JMP, None) => NeedsConstant,
    }

    #[test]
    fn display() {
        let mut inst = Instruction::with_reg(
            Opcode::LDI,
            Reg::R1,
            Some(Expr::binary(crate::expr::BinaryOp::Add, Expr::ident("end"), Expr::Lit(1))),
        )
        .unwrap();
        inst.set_label("top".to_string());
        assert_eq!(inst.to_string(), "top: LDI R1, (end + 1)");
        let nop = Instruction::with_expr(Opcode::NOP, None).unwrap();
        assert_eq!(nop.to_string(), "NOP");
    }
}
