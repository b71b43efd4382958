use std::path::Path;

use crate::error::RenderError;
use crate::table::{Table, load_table};

/// The dictionary behind `{{key}}` tokens.
///
/// Entries keep their file order, which is also the substitution order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyValueStore {
    entries: Vec<(String, String)>,
}

/// A store built from a table, plus the lines of rows that were too short
/// to hold a key and a value.
#[derive(Debug)]
pub struct LoadedStore {
    pub store: KeyValueStore,
    pub skipped_lines: Vec<u64>,
}

impl KeyValueStore {
    pub fn new() -> Self {
        KeyValueStore::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        KeyValueStore {
            entries: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Use the first two cells of every row as key and value.
    /// Cells past the second are ignored.
    pub fn from_table(table: &Table) -> LoadedStore {
        let mut entries = Vec::with_capacity(table.len());
        let mut skipped_lines = Vec::new();
        for row in &table.rows {
            match row.cells.as_slice() {
                [key, value, ..] => entries.push((key.clone(), value.clone())),
                _ => skipped_lines.push(row.line),
            }
        }
        LoadedStore {
            store: KeyValueStore { entries },
            skipped_lines,
        }
    }

    pub fn load(path: &Path) -> Result<LoadedStore, RenderError> {
        let table = load_table(path)?;
        Ok(Self::from_table(&table))
    }

    /// First value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn entries(&self) -> &[(String, String)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
