use indexmap::IndexMap;

use crate::error::Error;

/// Resolution environment threaded through the link and encode passes:
/// the address of the instruction being processed and the label table.
#[derive(Debug, Clone, Default)]
pub struct Context {
    addr: usize,
    symbols: IndexMap<String, usize>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.addr = 0;
        self.symbols.clear();
    }

    pub fn set_addr(&mut self, addr: usize) -> &mut Self {
        self.addr = addr;
        self
    }

    pub fn addr(&self) -> usize {
        self.addr
    }

    pub fn add_identifier(&mut self, name: impl Into<String>, addr: usize) -> Result<(), Error> {
        let name = name.into();
        if self.symbols.contains_key(&name) {
            return Err(Error::DuplicateLabel(name));
        }
        self.symbols.insert(name, addr);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.symbols.get(name).copied()
    }

    /// Labels in the order they were defined, which is address order.
    pub fn symbols(&self) -> impl Iterator<Item = (&str, usize)> {
        self.symbols.iter().map(|(name, addr)| (name.as_str(), *addr))
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}
