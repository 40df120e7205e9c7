//! Exported symbols and how dependency exports are merged.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::message::Message;
use crate::core::ModuleName;

/// An exported entity: the module that defines it and its name there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub origin: ModuleName,
    pub entity: String,
}

impl Symbol {
    pub fn new(origin: ModuleName, entity: impl Into<String>) -> Self {
        Symbol {
            origin,
            entity: entity.into(),
        }
    }
}

/// Symbols visible under their exported names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolTable {
    entries: BTreeMap<String, Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        SymbolTable::default()
    }

    /// Export `symbol` as `name`, replacing any previous binding.
    pub fn declare(&mut self, name: impl Into<String>, symbol: Symbol) -> Option<Symbol> {
        self.entries.insert(name.into(), symbol)
    }

    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Symbol)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Merge the exports of several dependencies into one table.
    ///
    /// Dependencies are visited in the given order and the first binding of a
    /// name wins. A later dependency exporting a different symbol under a
    /// taken name is reported as an info message attributed to `dependent`;
    /// re-exports of the very same symbol are silent.
    pub fn merge_first_wins<'a>(
        dependent: ModuleName,
        exports: impl IntoIterator<Item = (ModuleName, &'a SymbolTable)>,
    ) -> (SymbolTable, Vec<Message>) {
        let mut merged = SymbolTable::new();
        let mut provider: BTreeMap<String, ModuleName> = BTreeMap::new();
        let mut messages = Vec::new();

        for (dependency, table) in exports {
            for (name, symbol) in table.iter() {
                match merged.entries.get(name) {
                    None => {
                        merged.entries.insert(name.to_string(), symbol.clone());
                        provider.insert(name.to_string(), dependency);
                    }
                    Some(existing) if existing == symbol => {}
                    Some(_) => {
                        let winner = provider
                            .get(name)
                            .map(|m| m.to_string())
                            .unwrap_or_default();
                        messages.push(
                            Message::info(format!(
                                "`{}` exported by `{}` is shadowed by `{}` in `{}`",
                                name, dependency, winner, dependent
                            ))
                            .classified("symbol-shadowed"),
                        );
                    }
                }
            }
        }

        (merged, messages)
    }
}

impl FromIterator<(String, Symbol)> for SymbolTable {
    fn from_iter<I: IntoIterator<Item = (String, Symbol)>>(iter: I) -> Self {
        SymbolTable {
            entries: iter.into_iter().collect(),
        }
    }
}
