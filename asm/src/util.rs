use arch::Word;
use color_print::{cformat, cprintln};

use crate::error::Error;
use crate::program::Program;

/// One instruction of a linked program with its address and machine code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub addr: usize,
    pub words: Vec<Word>,
    pub label: Option<String>,
    pub text: String,
}

/// Encode `program` instruction by instruction. The program must be linked.
pub fn listing(program: &mut Program) -> Result<Vec<Row>, Error> {
    let mut rows = Vec::with_capacity(program.len());
    program.traverse(|inst, ctx| {
        let mut words = Vec::with_capacity(inst.size());
        inst.encode(ctx, &mut words)?;
        rows.push(Row {
            addr: ctx.addr(),
            words,
            label: inst.label().map(str::to_string),
            text: inst.asm(),
        });
        Ok(true)
    })?;
    Ok(rows)
}

pub fn print_dump(program: &mut Program) -> Result<(), Error> {
    let rows = listing(program)?;
    println!("{}+{}", "-".repeat(19), "-".repeat(45));
    for row in &rows {
        let code = row
            .words
            .iter()
            .map(|w| format!("{:04X}", w))
            .collect::<Vec<_>>()
            .join(" ");
        let label = match &row.label {
            Some(label) => cformat!("<g>{}:</>", label),
            None => String::new(),
        };
        cprintln!(
            "[<c>{:04X}</>] <y>{:<9}</> | {:<10} <r>{}</>",
            row.addr,
            code,
            label,
            row.text
        );
    }
    println!("{}+{}", "-".repeat(19), "-".repeat(45));
    for (name, addr) in program.symbols() {
        cprintln!("  <g>{:<16}</> = <c>0x{:04X}</>", name, addr);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_program;

    #[test]
    fn rows_follow_addresses() {
        let mut p = parse_program("start: ldi r1, 3\nloop: dec r1\n brnz loop\n").unwrap();
        p.link().unwrap();
        let rows = listing(&mut p).unwrap();
        let addrs: Vec<_> = rows.iter().map(|r| r.addr).collect();
        assert_eq!(addrs, vec![0, 2, 3]);
        assert_eq!(rows[0].label.as_deref(), Some("start"));
        assert_eq!(rows[0].text, "LDI R1, 3");
        assert_eq!(rows[2].words.len(), 2);
        assert_eq!(rows[2].words[1], 2);
    }
}
