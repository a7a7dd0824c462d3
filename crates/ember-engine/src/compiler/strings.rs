//! The interned string table.

use std::rc::Rc;

use rustc_hash::FxHashMap;

/// An append-only, deduplicated table of strings.
///
/// Indices are stable: once a string is assigned an index it keeps it.
#[derive(Debug, Clone, Default)]
pub struct StringTable {
    strings: Vec<Rc<str>>,
    index: FxHashMap<Rc<str>, u32>,
}

impl StringTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the index of `s`, adding it if it is not present yet.
    pub fn intern(&mut self, s: &str) -> u32 {
        if let Some(&index) = self.index.get(s) {
            return index;
        }
        let index = self.strings.len() as u32;
        let shared: Rc<str> = Rc::from(s);
        self.strings.push(shared.clone());
        self.index.insert(shared, index);
        index
    }

    /// Looks up a string by index.
    pub fn get(&self, index: u32) -> Option<&Rc<str>> {
        self.strings.get(index as usize)
    }

    /// Returns the number of strings.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Returns true if the table is empty.
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Iterates over the strings in index order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.strings.iter().map(|s| s.as_ref())
    }
}

impl PartialEq for StringTable {
    fn eq(&self, other: &Self) -> bool {
        self.strings == other.strings
    }
}
