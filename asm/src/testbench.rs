//! Test scripts for the processor circuit.
//!
//! A [`ProcessorTest`] assembles a short program, loads it into the ROM of
//! the simulated CPU and clocks it once per machine word, then compares the
//! named signals against the expected values.

use std::io::Read;

use arch::{Reg, Word};
use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::Error;
use crate::parser::parse_program;

const CARRY: &str = "Carry";

#[derive(Debug, Clone)]
pub struct ProcessorTest {
    label: String,
    init: Vec<(String, i64)>,
    checks: IndexMap<String, i64>,
    source: String,
    code: Vec<Word>,
}

impl ProcessorTest {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            init: Vec::new(),
            checks: IndexMap::new(),
            source: String::new(),
            code: Vec::new(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn code(&self) -> &[Word] {
        &self.code
    }

    pub fn set_register(&mut self, reg: Reg, value: i64) -> &mut Self {
        self.init.push((reg.to_string(), value));
        self
    }

    pub fn set_carry(&mut self, carry: bool) -> &mut Self {
        self.init.push((CARRY.to_string(), carry as i64));
        self
    }

    /// Assemble `source` into the ROM image of this test.
    pub fn run(&mut self, source: &str) -> Result<&mut Self, Error> {
        let mut program = parse_program(source)?;
        program.link()?;
        let mut code = Vec::with_capacity(program.size());
        program.traverse(|inst, ctx| {
            inst.encode(ctx, &mut code)?;
            Ok(true)
        })?;
        self.source = source.to_string();
        self.code = code;
        Ok(self)
    }

    /// Like [`ProcessorTest::run`], and the image must be exactly `words` long.
    pub fn run_sized(&mut self, source: &str, words: usize) -> Result<&mut Self, Error> {
        self.run(source)?;
        if self.code.len() != words {
            return Err(Error::CodeSize {
                expected: words,
                actual: self.code.len(),
            });
        }
        Ok(self)
    }

    pub fn check_register(&mut self, reg: Reg, value: i64) -> Result<&mut Self, Error> {
        self.check(reg.to_string(), value)
    }

    pub fn check_carry(&mut self, carry: bool) -> Result<&mut Self, Error> {
        self.check(CARRY.to_string(), carry as i64)
    }

    fn check(&mut self, name: String, value: i64) -> Result<&mut Self, Error> {
        if self.checks.contains_key(&name) {
            return Err(Error::DuplicateCheck(name));
        }
        self.checks.insert(name, value);
        Ok(self)
    }

    pub fn script(&self) -> String {
        let mut c = String::from("# auto generated, do not modify\nClk");
        for name in self.checks.keys() {
            c.push(' ');
            c.push_str(name);
        }
        c.push('\n');
        for (name, value) in &self.init {
            c.push_str(&format!("init {name}={value};\n"));
        }
        c.push_str("# ");
        c.push_str(&self.source.trim().replace('\n', "\n# "));

        let program = self
            .code
            .iter()
            .map(|w| format!("0x{w:x}"))
            .collect::<Vec<_>>()
            .join(",");
        c.push_str(&format!("\nprogram({program})\n"));

        let clock_line = format!("C{}\n", " X".repeat(self.checks.len()));
        if self.code.len() > 1 {
            c.push_str(&format!("repeat ({}) ", self.code.len()));
        }
        c.push_str(&clock_line);

        c.push('0');
        for value in self.checks.values() {
            c.push_str(&format!(" {value}"));
        }
        c.push('\n');
        for (name, value) in &self.checks {
            c.push_str(&format!("# {name}={value}\n"));
        }
        c
    }
}

/// Test description as written in a YAML test file.
#[derive(Debug, Clone, Deserialize)]
pub struct TestCase {
    pub label: String,
    pub source: String,
    #[serde(default)]
    pub size: Option<usize>,
    #[serde(default)]
    pub init: IndexMap<Reg, i64>,
    #[serde(default)]
    pub carry: Option<bool>,
    #[serde(default)]
    pub expect: IndexMap<Reg, i64>,
    #[serde(default)]
    pub carry_out: Option<bool>,
}

impl TestCase {
    pub fn build(&self) -> Result<ProcessorTest, Error> {
        let mut test = ProcessorTest::new(&self.label);
        for (reg, value) in &self.init {
            test.set_register(*reg, *value);
        }
        if let Some(carry) = self.carry {
            test.set_carry(carry);
        }
        match self.size {
            Some(words) => test.run_sized(&self.source, words)?,
            None => test.run(&self.source)?,
        };
        for (reg, value) in &self.expect {
            test.check_register(*reg, *value)?;
        }
        if let Some(carry) = self.carry_out {
            test.check_carry(carry)?;
        }
        Ok(test)
    }
}

pub fn load_cases<R: Read>(reader: R) -> Result<Vec<TestCase>, Error> {
    Ok(serde_yaml::from_reader(reader)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_word_program_has_no_repeat() {
        let mut t = ProcessorTest::new("inc");
        t.set_register(Reg::R0, 1).set_carry(false);
        t.run("  inc r0\n").unwrap();
        t.check_register(Reg::R0, 2).unwrap().check_carry(false).unwrap();
        assert_eq!(
            t.script(),
            "# auto generated, do not modify\n\
             Clk R0 Carry\n\
             init R0=1;\n\
             init Carry=0;\n\
             # inc r0\n\
             program(0x1b00)\n\
             C X X\n\
             0 2 0\n\
             # R0=2\n\
             # Carry=0\n"
        );
    }

    #[test]
    fn duplicate_check() {
        let mut t = ProcessorTest::new("dup");
        t.check_register(Reg::R1, 1).unwrap();
        let err = t.check_register(Reg::R1, 2).unwrap_err();
        assert!(matches!(err, Error::DuplicateCheck(ref s) if s == "R1"));
    }

    #[test]
    fn wrong_size() {
        let mut t = ProcessorTest::new("size");
        let err = t.run_sized("ldi r0, 5", 1).unwrap_err();
        assert!(matches!(err, Error::CodeSize { expected: 1, actual: 2 }));
    }
}
