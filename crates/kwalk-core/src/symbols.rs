//! Kernel symbol resolution.

use std::{collections::HashMap, path::Path};

use crate::{Va, WalkError};

/// A mapping from kernel symbol names to virtual addresses.
#[derive(Debug, Default, Clone)]
pub struct SymbolTable {
    symbols: HashMap<String, Va>,
}

impl SymbolTable {
    /// Creates an empty symbol table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a `System.map` style listing.
    ///
    /// Each line holds `<hex address> <type> <name>`. The `slide` (KASLR
    /// offset) is added to every address. Malformed lines are skipped.
    pub fn from_system_map(text: &str, slide: u64) -> Self {
        let mut symbols = HashMap::new();

        for (index, line) in text.lines().enumerate() {
            let mut parts = line.split_whitespace();
            let (Some(address), Some(_kind), Some(name)) =
                (parts.next(), parts.next(), parts.next())
            else {
                if !line.trim().is_empty() {
                    tracing::trace!(line = index + 1, "skipping malformed System.map line");
                }
                continue;
            };

            let Ok(address) = u64::from_str_radix(address, 16) else {
                tracing::trace!(line = index + 1, "skipping System.map line with bad address");
                continue;
            };

            // First definition wins; later duplicates are usually local aliases.
            symbols
                .entry(name.to_owned())
                .or_insert(Va(address.wrapping_add(slide)));
        }

        tracing::debug!(count = symbols.len(), "parsed System.map");
        Self { symbols }
    }

    /// Loads a `System.map` file.
    pub fn load_system_map(path: impl AsRef<Path>, slide: u64) -> Result<Self, WalkError> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::from_system_map(&text, slide))
    }

    /// Inserts or overrides a symbol.
    pub fn insert(&mut self, name: impl Into<String>, address: Va) {
        self.symbols.insert(name.into(), address);
    }

    /// Looks up a symbol, returning `None` if it is unknown.
    pub fn get(&self, name: &str) -> Option<Va> {
        self.symbols.get(name).copied()
    }

    /// Resolves a symbol.
    pub fn resolve(&self, name: &str) -> Result<Va, WalkError> {
        self.get(name)
            .ok_or_else(|| WalkError::UnknownSymbol(name.to_owned()))
    }

    /// Resolves the first symbol of `names` that is present.
    ///
    /// Useful for symbols renamed across kernel versions.
    pub fn resolve_any<'n>(&self, names: &[&'n str]) -> Result<(Va, &'n str), WalkError> {
        names
            .iter()
            .find_map(|&name| self.get(name).map(|address| (address, name)))
            .ok_or_else(|| WalkError::UnknownSymbol(names.join("|")))
    }

    /// Returns the number of symbols.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Returns `true` if the table has no symbols.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SYSTEM_MAP: &str = "\
ffffffff81000000 T _text
ffffffff82613940 D init_task
ffffffff82200300 R sys_call_table

garbage
zzzzzzzzzzzzzzzz T broken
ffffffff82a5e2c0 b log_buf
";

    #[test]
    fn parses_system_map() {
        let symbols = SymbolTable::from_system_map(SYSTEM_MAP, 0);

        assert_eq!(symbols.len(), 4);
        assert_eq!(symbols.get("init_task"), Some(Va(0xffffffff82613940)));
        assert_eq!(symbols.get("log_buf"), Some(Va(0xffffffff82a5e2c0)));
        assert_eq!(symbols.get("broken"), None);
    }

    #[test]
    fn applies_kaslr_slide() {
        let symbols = SymbolTable::from_system_map(SYSTEM_MAP, 0x1e00000);

        assert_eq!(symbols.get("_text"), Some(Va(0xffffffff82e00000)));
    }

    #[test]
    fn resolve_reports_missing_symbol() {
        let symbols = SymbolTable::from_system_map(SYSTEM_MAP, 0);

        assert!(matches!(
            symbols.resolve("ia32_sys_call_table"),
            Err(WalkError::UnknownSymbol(name)) if name == "ia32_sys_call_table"
        ));
    }

    #[test]
    fn resolve_any_picks_first_present() {
        let mut symbols = SymbolTable::new();
        symbols.insert("init_level4_pgt", Va(0xffffffff81c0a000));

        let (address, name) = symbols
            .resolve_any(&["init_top_pgt", "init_level4_pgt"])
            .unwrap();

        assert_eq!(name, "init_level4_pgt");
        assert_eq!(address, Va(0xffffffff81c0a000));
        assert!(symbols.resolve_any(&["nope"]).is_err());
    }
}
