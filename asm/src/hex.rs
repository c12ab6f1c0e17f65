use std::io::Write;

use arch::Word;

use crate::error::Error;

/// First line of a raw hex image, understood by the simulator's ROM loader.
pub const HEADER: &str = "v2.0 raw";

/// Receiver of machine words, one call per word in program order.
pub trait CodeSink {
    fn push(&mut self, word: Word) -> Result<(), Error>;
}

impl CodeSink for Vec<Word> {
    fn push(&mut self, word: Word) -> Result<(), Error> {
        Vec::push(self, word);
        Ok(())
    }
}

/// Writes words as lowercase hex, one per line, after the [`HEADER`].
pub struct HexWriter<W: Write> {
    out: W,
}

impl<W: Write> HexWriter<W> {
    pub fn new(mut out: W) -> Result<Self, Error> {
        writeln!(out, "{HEADER}").map_err(Error::FileWrite)?;
        Ok(Self { out })
    }

    pub fn finish(mut self) -> Result<W, Error> {
        self.out.flush().map_err(Error::FileWrite)?;
        Ok(self.out)
    }
}

impl<W: Write> CodeSink for HexWriter<W> {
    fn push(&mut self, word: Word) -> Result<(), Error> {
        writeln!(self.out, "{word:x}").map_err(Error::FileWrite)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_are_unpadded_lowercase() {
        let mut hex = HexWriter::new(Vec::new()).unwrap();
        for word in [0x0000, 0x0a, 0x8b12, 0xFFFF] {
            hex.push(word).unwrap();
        }
        let out = String::from_utf8(hex.finish().unwrap()).unwrap();
        assert_eq!(out, "v2.0 raw\n0\na\n8b12\nffff\n");
    }
}
