//! This module contains the program metadata used to resolve code addresses to function names.

use crate::types::Address;
use anyhow::{anyhow, Result};
use elf::{endian::AnyEndian, ElfBytes};
use serde::{Deserialize, Serialize};
use std::{io::Read, rc::Rc, sync::Arc};

/// Placeholder returned when the symbol table is empty.
pub const UNKNOWN_SYMBOL: &str = "!unknown";

/// Placeholder returned for addresses below the first symbol.
pub const START_SYMBOL: &str = "!start";

/// Placeholder returned for addresses past the end of the nearest preceding symbol.
pub const GAP_SYMBOL: &str = "!gap";

/// A [SymbolTable] resolves a code address to the name of the function containing it.
///
/// Lookups must be pure: the stack tracker calls them freely while reconciling its model and
/// compares the results by value.
pub trait SymbolTable {
    /// Returns the symbol containing `address`, or an address-independent placeholder if the
    /// address is not mapped.
    fn lookup_symbol(&self, address: Address) -> &str;
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    /// The name of the symbol.
    pub name: String,
    /// The start address of the symbol.
    pub start: u64,
    /// The size of the symbol.
    pub size: u64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "MetaDump")]
pub struct Meta {
    /// The symbols in the binary, sorted by start address.
    symbols: Vec<Symbol>,
}

/// The serialized form of [Meta]. Symbols may appear in any order.
#[derive(Deserialize)]
struct MetaDump {
    symbols: Vec<Symbol>,
}

impl From<MetaDump> for Meta {
    fn from(dump: MetaDump) -> Self {
        Self::new(dump.symbols)
    }
}

impl Meta {
    /// Create [Meta] from a list of symbols in any order.
    pub fn new(mut symbols: Vec<Symbol>) -> Self {
        symbols.sort_by_key(|symbol| symbol.start);
        Self { symbols }
    }

    /// Create [Meta] from an elf file
    pub fn from_elf(elf: ElfBytes<AnyEndian>) -> Result<Self> {
        let (parsing_table, string_table) =
            elf.symbol_table()?.ok_or_else(|| anyhow!("No symbol table found"))?;

        let symbols = parsing_table
            .iter()
            .map(|symbol| {
                let name = string_table.get(symbol.st_name as usize)?;

                Ok::<_, anyhow::Error>(Symbol {
                    name: name.to_string(),
                    start: symbol.st_value,
                    size: symbol.st_size,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(target: "howitzer::meta", "Loaded {} symbols from ELF", symbols.len());
        Ok(Self::new(symbols))
    }

    /// Create [Meta] from a JSON metadata dump.
    pub fn from_json<R: Read>(reader: R) -> Result<Self> {
        let meta: Meta = serde_json::from_reader(reader)?;
        tracing::debug!(target: "howitzer::meta", "Loaded {} symbols from JSON", meta.symbols().len());
        Ok(meta)
    }

    /// Returns the symbols, sorted by start address.
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    /// Lookup a symbol name by address
    pub fn lookup(&self, address: Address) -> &str {
        if self.symbols.is_empty() {
            return UNKNOWN_SYMBOL;
        }

        let i = self.symbols.partition_point(|symbol| symbol.start <= address);
        if i == 0 {
            return START_SYMBOL;
        }

        let out = &self.symbols[i - 1];
        if out.start.saturating_add(out.size) < address {
            return GAP_SYMBOL;
        }

        &out.name
    }

    /// Returns the start address of the first symbol named `name`, if any.
    pub fn symbol_start(&self, name: &str) -> Option<Address> {
        self.symbols.iter().find(|symbol| symbol.name == name).map(|symbol| symbol.start)
    }
}

impl SymbolTable for Meta {
    fn lookup_symbol(&self, address: Address) -> &str {
        self.lookup(address)
    }
}

impl<T: SymbolTable + ?Sized> SymbolTable for &T {
    fn lookup_symbol(&self, address: Address) -> &str {
        (**self).lookup_symbol(address)
    }
}

impl<T: SymbolTable + ?Sized> SymbolTable for Rc<T> {
    fn lookup_symbol(&self, address: Address) -> &str {
        (**self).lookup_symbol(address)
    }
}

impl<T: SymbolTable + ?Sized> SymbolTable for Arc<T> {
    fn lookup_symbol(&self, address: Address) -> &str {
        (**self).lookup_symbol(address)
    }
}

#[cfg(test)]
mod test {
    use super::{Meta, Symbol, SymbolTable, GAP_SYMBOL, START_SYMBOL, UNKNOWN_SYMBOL};
    use crate::test_utils::fixture_meta;
    use std::rc::Rc;

    #[test]
    fn lookup_empty() {
        let meta = Meta::default();
        assert_eq!(meta.lookup(0), UNKNOWN_SYMBOL);
        assert_eq!(meta.lookup(0x1000), UNKNOWN_SYMBOL);
    }

    #[test]
    fn lookup_placeholders() {
        let meta = fixture_meta();

        assert_eq!(meta.lookup(0x0fff), START_SYMBOL);
        assert_eq!(meta.lookup(0x1000), "runtime.main");
        assert_eq!(meta.lookup(0x10ff), "runtime.main");
        // The end of a symbol is inclusive.
        assert_eq!(meta.lookup(0x1100), "runtime.main");
        assert_eq!(meta.lookup(0x1101), GAP_SYMBOL);
        assert_eq!(meta.lookup(0x2000), "main.main");
        assert_eq!(meta.lookup(0x4010), "main.leaf");
        assert_eq!(meta.lookup(0xffff_0000), GAP_SYMBOL);
    }

    #[test]
    fn new_sorts_symbols() {
        let meta = Meta::new(vec![
            Symbol { name: "b".to_string(), start: 0x20, size: 0x10 },
            Symbol { name: "a".to_string(), start: 0x10, size: 0x10 },
        ]);
        assert_eq!(meta.symbols()[0].name, "a");
        assert_eq!(meta.lookup(0x18), "a");
        assert_eq!(meta.lookup(0x28), "b");
    }

    #[test]
    fn from_json_sorts_symbols() {
        let raw = r#"{"symbols":[
            {"name":"main.main","start":8192,"size":256},
            {"name":"runtime.main","start":4096,"size":256}
        ]}"#;
        let meta = Meta::from_json(raw.as_bytes()).unwrap();

        assert_eq!(meta.symbols().len(), 2);
        assert_eq!(meta.symbols()[0].name, "runtime.main");
        assert_eq!(meta.lookup(0x2010), "main.main");
    }

    #[test]
    fn deserialize_sorts_symbols() {
        let raw = r#"{"symbols":[
            {"name":"main.main","start":8192,"size":256},
            {"name":"runtime.main","start":4096,"size":256}
        ]}"#;
        let meta = serde_json::from_str::<Meta>(raw).unwrap();

        assert_eq!(meta.symbols()[0].name, "runtime.main");
        assert_eq!(meta.lookup(0x1010), "runtime.main");
        assert_eq!(meta.lookup(0x2010), "main.main");
        assert_eq!(meta, Meta::from_json(raw.as_bytes()).unwrap());
    }

    #[test]
    fn lookup_top_of_address_space() {
        let meta = Meta::new(vec![Symbol {
            name: "high".to_string(),
            start: u64::MAX - 0x10,
            size: 0x100,
        }]);
        assert_eq!(meta.lookup(u64::MAX - 0x10), "high");
        assert_eq!(meta.lookup(u64::MAX), "high");
    }

    #[test]
    fn from_json_rejects_garbage() {
        assert!(Meta::from_json(&b"{\"symbols\": 4}"[..]).is_err());
    }

    #[test]
    fn symbol_start() {
        let meta = fixture_meta();
        assert_eq!(meta.symbol_start("main.main"), Some(0x2000));
        assert_eq!(meta.symbol_start("runtime.gcenable"), None);
    }

    #[test]
    fn symbol_table_through_handles() {
        let meta = Rc::new(fixture_meta());
        assert_eq!(meta.lookup_symbol(0x3004), "main.inner");
        assert_eq!((&*meta).lookup_symbol(0x3004), "main.inner");
    }
}
