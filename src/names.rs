//! Fresh-name allocation.
//!
//! The builder owns one `NameTable` and routes every generated binding
//! name through it, so display names are unique within a build.

use std::collections::{HashMap, HashSet};

/// A monotone allocator of display-name-unique identifiers.
#[derive(Debug, Default)]
pub struct NameTable {
    used: HashSet<String>,
    counters: HashMap<String, u32>,
}

impl NameTable {
    pub fn new() -> Self {
        NameTable::default()
    }

    /// Return `hint` if it has not been handed out, otherwise `hint{k}`
    /// for the smallest positive `k` that is still free.
    pub fn get_unique_name(&mut self, hint: &str) -> String {
        if self.used.insert(hint.to_string()) {
            return hint.to_string();
        }
        let counter = self.counters.entry(hint.to_string()).or_insert(0);
        loop {
            *counter += 1;
            let candidate = format!("{}{}", hint, counter);
            if self.used.insert(candidate.clone()) {
                return candidate;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_use_keeps_hint() {
        let mut table = NameTable::new();
        assert_eq!(table.get_unique_name("x"), "x");
    }

    #[test]
    fn test_reuse_appends_counter() {
        let mut table = NameTable::new();
        assert_eq!(table.get_unique_name("lv"), "lv");
        assert_eq!(table.get_unique_name("lv"), "lv1");
        assert_eq!(table.get_unique_name("lv"), "lv2");
    }

    #[test]
    fn test_explicit_hint_collision() {
        let mut table = NameTable::new();
        assert_eq!(table.get_unique_name("lv1"), "lv1");
        assert_eq!(table.get_unique_name("lv"), "lv");
        // lv1 is taken by the explicit hint above
        assert_eq!(table.get_unique_name("lv"), "lv2");
    }

    #[test]
    fn test_all_names_distinct() {
        let mut table = NameTable::new();
        let names: Vec<_> = (0..100).map(|_| table.get_unique_name("v")).collect();
        let unique: std::collections::HashSet<_> = names.iter().collect();
        assert_eq!(unique.len(), names.len());
    }
}
