use std::fmt;
use std::io::Write;

use arch::{Opcode, Reg, Word};
use tracing::debug;

use crate::context::Context;
use crate::error::Error;
use crate::expr::Expr;
use crate::hex::{CodeSink, HexWriter};
use crate::inst::Instruction;

/// Ordered list of instructions plus the state of the two assembly passes.
///
/// Build with the `add*` methods and [`Program::label`], resolve addresses
/// with [`Program::link`], then emit code with [`Program::encode`] or
/// [`Program::write_hex`] as often as needed.
#[derive(Debug, Default)]
pub struct Program {
    insts: Vec<Instruction>,
    context: Context,
    pending: Option<String>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a validated instruction, handing it the pending label.
    pub fn push(&mut self, mut inst: Instruction) -> &mut Self {
        if let Some(label) = self.pending.take() {
            inst.set_label(label);
        }
        self.insts.push(inst);
        // addresses computed by an earlier link no longer apply
        self.context.clear();
        self
    }

    pub fn add(
        &mut self,
        opcode: Opcode,
        dest: Reg,
        source: Reg,
        expr: Option<Expr>,
    ) -> Result<&mut Self, Error> {
        let inst = Instruction::new(opcode, dest, source, expr)?;
        Ok(self.push(inst))
    }

    pub fn add_reg(&mut self, opcode: Opcode, reg: Reg) -> Result<&mut Self, Error> {
        let inst = Instruction::with_reg(opcode, reg, None)?;
        Ok(self.push(inst))
    }

    pub fn add_reg_expr(&mut self, opcode: Opcode, reg: Reg, expr: Expr) -> Result<&mut Self, Error> {
        let inst = Instruction::with_reg(opcode, reg, Some(expr))?;
        Ok(self.push(inst))
    }

    pub fn add_regs(&mut self, opcode: Opcode, dest: Reg, source: Reg) -> Result<&mut Self, Error> {
        let inst = Instruction::with_regs(opcode, dest, source)?;
        Ok(self.push(inst))
    }

    pub fn add_expr(&mut self, opcode: Opcode, expr: Expr) -> Result<&mut Self, Error> {
        let inst = Instruction::with_expr(opcode, Some(expr))?;
        Ok(self.push(inst))
    }

    /// Opcode without any operand, e.g. `NOP`.
    pub fn add_op(&mut self, opcode: Opcode) -> Result<&mut Self, Error> {
        let inst = Instruction::with_expr(opcode, None)?;
        Ok(self.push(inst))
    }

    /// Bind `name` to the next instruction added. Only one label may wait
    /// at a time; a second one is rejected and the first stays pending.
    pub fn label(&mut self, name: impl Into<String>) -> Result<&mut Self, Error> {
        let label = name.into();
        if let Some(pending) = &self.pending {
            return Err(Error::LabelPending {
                pending: pending.clone(),
                label,
            });
        }
        self.pending = Some(label);
        Ok(self)
    }

    pub fn pending_label(&self) -> Option<&str> {
        self.pending.as_deref()
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.insts
    }

    pub fn len(&self) -> usize {
        self.insts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.insts.is_empty()
    }

    /// Words occupied by the whole image.
    pub fn size(&self) -> usize {
        self.insts.iter().map(Instruction::size).sum()
    }

    /// First pass: assign an address to every instruction and record the
    /// labels. Constants are not evaluated, so labels may be used before
    /// they are defined.
    pub fn link(&mut self) -> Result<&mut Self, Error> {
        self.context.clear();
        if let Some(label) = &self.pending {
            return Err(Error::DanglingLabel(label.clone()));
        }

        let mut addr = 0;
        for inst in &self.insts {
            if let Some(label) = inst.label() {
                if let Err(err) = self.context.add_identifier(label, addr) {
                    self.context.clear();
                    return Err(err);
                }
                debug!(label, addr, "label");
            }
            addr += inst.size();
        }

        debug!(instructions = self.insts.len(), words = addr, "linked");
        Ok(self)
    }

    /// Address of a label defined by the last successful link.
    pub fn resolve(&self, label: &str) -> Result<usize, Error> {
        self.context
            .get(label)
            .ok_or_else(|| Error::UnresolvedSymbol(label.to_string()))
    }

    pub fn symbols(&self) -> impl Iterator<Item = (&str, usize)> {
        self.context.symbols()
    }

    /// Visit every instruction together with the context positioned at its
    /// address. The walk stops when `visit` returns `Ok(false)` or an error.
    pub fn traverse<F>(&mut self, mut visit: F) -> Result<(), Error>
    where
        F: FnMut(&Instruction, &Context) -> Result<bool, Error>,
    {
        let mut addr = 0;
        for inst in &self.insts {
            self.context.set_addr(addr);
            if !visit(inst, &self.context)? {
                break;
            }
            addr += inst.size();
        }
        self.context.set_addr(0);
        Ok(())
    }

    /// Second pass: evaluate the constants and push every machine word to
    /// `sink` in program order.
    pub fn encode<S: CodeSink + ?Sized>(&mut self, sink: &mut S) -> Result<&mut Self, Error> {
        self.traverse(|inst, ctx| {
            inst.encode(ctx, &mut *sink)?;
            Ok(true)
        })?;
        debug!(words = self.size(), "encoded");
        Ok(self)
    }

    pub fn machine_code(&mut self) -> Result<Vec<Word>, Error> {
        let mut code = Vec::with_capacity(self.size());
        self.encode(&mut code)?;
        Ok(code)
    }

    pub fn write_hex<W: Write>(&mut self, out: W) -> Result<&mut Self, Error> {
        let mut hex = HexWriter::new(out)?;
        self.encode(&mut hex)?;
        hex.finish()?;
        Ok(self)
    }

    pub fn write_hex_file(&mut self, path: &str) -> Result<&mut Self, Error> {
        let file =
            std::fs::File::create(path).map_err(|e| Error::FileCreate(path.to_string(), e))?;
        self.write_hex(std::io::BufWriter::new(file))
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for inst in &self.insts {
            writeln!(f, "{inst}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Mismatch;

    fn counter() -> Program {
        let mut p = Program::new();
        p.add_regs(Opcode::XOR, Reg::R0, Reg::R0)
            .unwrap()
            .label("L1")
            .unwrap()
            .add_reg(Opcode::INC, Reg::R0)
            .unwrap()
            .add_expr(Opcode::BRNZ, Expr::ident("L1"))
            .unwrap();
        p
    }

    #[test]
    fn pending_label_goes_to_next_instruction() {
        let p = counter();
        let labels: Vec<_> = p.instructions().iter().map(|i| i.label()).collect();
        assert_eq!(labels, vec![None, Some("L1"), None]);
        assert_eq!(p.pending_label(), None);
    }

    #[test]
    fn second_pending_label_is_rejected() {
        let mut p = Program::new();
        p.label("first").unwrap();
        let err = p.label("second").unwrap_err();
        assert!(matches!(
            err,
            Error::LabelPending { ref pending, ref label } if pending == "first" && label == "second"
        ));
        p.add_op(Opcode::NOP).unwrap();
        assert_eq!(p.instructions()[0].label(), Some("first"));
    }

    #[test]
    fn failed_add_leaves_program_unchanged() {
        let mut p = Program::new();
        p.label("here").unwrap();
        let err = p.add_reg(Opcode::ADD, Reg::R1).unwrap_err();
        assert!(matches!(
            err,
            Error::OperandMismatch(Opcode::ADD, Mismatch::NeedsBothRegisters)
        ));
        assert!(p.is_empty());
        assert_eq!(p.pending_label(), Some("here"));
    }

    #[test]
    fn link_assigns_word_addresses() {
        let mut p = Program::new();
        p.label("a")
            .unwrap()
            .add_reg_expr(Opcode::LDI, Reg::R0, Expr::Lit(1))
            .unwrap()
            .label("b")
            .unwrap()
            .add_op(Opcode::NOP)
            .unwrap()
            .label("c")
            .unwrap()
            .add_expr(Opcode::JMP, Expr::ident("a"))
            .unwrap();
        p.link().unwrap();
        assert_eq!(p.resolve("a").unwrap(), 0);
        assert_eq!(p.resolve("b").unwrap(), 2);
        assert_eq!(p.resolve("c").unwrap(), 3);
        assert_eq!(p.size(), 5);
    }

    #[test]
    fn dangling_label_fails_link() {
        let mut p = counter();
        p.label("end").unwrap();
        assert!(matches!(p.link(), Err(Error::DanglingLabel(ref s)) if s == "end"));
    }

    #[test]
    fn dangling_label_drops_previous_link() {
        let mut p = counter();
        p.link().unwrap();
        assert_eq!(p.resolve("L1").unwrap(), 1);
        p.label("tail").unwrap();
        assert!(p.link().is_err());
        assert!(matches!(p.resolve("L1"), Err(Error::UnresolvedSymbol(_))));
        assert_eq!(p.symbols().count(), 0);
    }

    #[test]
    fn traverse_stops_early() {
        let mut p = counter();
        p.link().unwrap();
        let mut seen = Vec::new();
        p.traverse(|inst, ctx| {
            seen.push((inst.opcode(), ctx.addr()));
            Ok(inst.opcode() != Opcode::INC)
        })
        .unwrap();
        assert_eq!(seen, vec![(Opcode::XOR, 0), (Opcode::INC, 1)]);
    }

    #[test]
    fn add_after_link_drops_symbols() {
        let mut p = counter();
        p.link().unwrap();
        p.add_op(Opcode::BREAK).unwrap();
        assert!(matches!(p.resolve("L1"), Err(Error::UnresolvedSymbol(_))));
        assert!(matches!(p.machine_code(), Err(Error::UnresolvedSymbol(_))));
    }

    #[test]
    fn display_lists_instructions() {
        assert_eq!(counter().to_string(), "XOR R0, R0\nL1: INC R0\nBRNZ L1\n");
    }
}
