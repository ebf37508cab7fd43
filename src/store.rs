// MIT License - Copyright (c) 2026 Peter Wright
// In-memory entity state

use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::topic::Category;

/// Raw field values of one entity, exactly as received on the wire.
pub type FieldMap = HashMap<String, String>;

/// Records of one category plus the order in which IDs were first seen.
#[derive(Debug, Default)]
struct CategoryTable {
    order: Vec<String>,
    records: HashMap<String, FieldMap>,
}

impl CategoryTable {
    fn ensure(&mut self, id: &str) -> bool {
        if self.records.contains_key(id) {
            return false;
        }
        self.order.push(id.to_string());
        self.records.insert(id.to_string(), FieldMap::new());
        true
    }
}

/// Authoritative state of every input and partition seen so far.
///
/// One lock per category; no lock is ever held across an `.await` or while
/// observers run. Records are never removed.
#[derive(Debug, Default)]
pub struct StateStore {
    inputs: RwLock<CategoryTable>,
    partitions: RwLock<CategoryTable>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, category: Category) -> &RwLock<CategoryTable> {
        match category {
            Category::Inputs => &self.inputs,
            Category::Partitions => &self.partitions,
        }
    }

    // Poisoned locks are recovered
    fn read(&self, category: Category) -> RwLockReadGuard<'_, CategoryTable> {
        self.table(category)
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self, category: Category) -> RwLockWriteGuard<'_, CategoryTable> {
        self.table(category)
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Create an empty record for `id` if it does not exist yet.
    ///
    /// Returns `true` only for the call that created the record.
    pub fn ensure(&self, category: Category, id: &str) -> bool {
        self.write(category).ensure(id)
    }

    /// Set one field, creating the record if needed (last write wins).
    pub fn set_field(&self, category: Category, id: &str, field: &str, value: &str) {
        let mut table = self.write(category);
        table.ensure(id);
        if let Some(record) = table.records.get_mut(id) {
            record.insert(field.to_string(), value.to_string());
        }
    }

    /// Copy of the fields of one entity. Unknown IDs yield an empty map.
    pub fn get(&self, category: Category, id: &str) -> FieldMap {
        self.read(category)
            .records
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    /// Single field lookup.
    pub fn field(&self, category: Category, id: &str, field: &str) -> Option<String> {
        self.read(category)
            .records
            .get(id)
            .and_then(|record| record.get(field))
            .cloned()
    }

    /// Whether a record for `id` exists.
    pub fn contains(&self, category: Category, id: &str) -> bool {
        self.read(category).records.contains_key(id)
    }

    /// Known IDs in first-seen order.
    pub fn ids(&self, category: Category) -> Vec<String> {
        self.read(category).order.clone()
    }

    /// Number of known entities in a category.
    pub fn len(&self, category: Category) -> usize {
        self.read(category).order.len()
    }

    pub fn is_empty(&self) -> bool {
        Category::ALL.iter().all(|c| self.len(*c) == 0)
    }

    /// Sorted deep copy of a whole category.
    pub fn dump(&self, category: Category) -> BTreeMap<String, BTreeMap<String, String>> {
        self.read(category)
            .records
            .iter()
            .map(|(id, fields)| {
                let sorted = fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect();
                (id.clone(), sorted)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ensure_reports_creation_once() {
        let store = StateStore::new();
        assert!(store.ensure(Category::Inputs, "7"));
        assert!(!store.ensure(Category::Inputs, "7"));
        // Categories are independent
        assert!(store.ensure(Category::Partitions, "7"));
    }

    #[test]
    fn test_set_field_merges() {
        let store = StateStore::new();
        store.set_field(Category::Inputs, "9", "status", "2");
        store.set_field(Category::Inputs, "9", "block", "1");
        store.set_field(Category::Inputs, "9", "status", "3");

        let record = store.get(Category::Inputs, "9");
        assert_eq!(record.len(), 2);
        assert_eq!(record.get("status").map(String::as_str), Some("3"));
        assert_eq!(record.get("block").map(String::as_str), Some("1"));
        assert_eq!(
            store.field(Category::Inputs, "9", "block").as_deref(),
            Some("1")
        );
    }

    #[test]
    fn test_unknown_reads_are_empty() {
        let store = StateStore::new();
        assert!(store.get(Category::Partitions, "missing").is_empty());
        assert_eq!(store.field(Category::Partitions, "missing", "status"), None);
        assert!(!store.contains(Category::Partitions, "missing"));
        assert!(store.is_empty());
    }

    #[test]
    fn test_ids_keep_first_seen_order() {
        let store = StateStore::new();
        for id in ["10", "2", "33", "2", "10"] {
            store.set_field(Category::Inputs, id, "status", "1");
        }
        assert_eq!(store.ids(Category::Inputs), vec!["10", "2", "33"]);
        assert_eq!(store.len(Category::Inputs), 3);
        assert_eq!(store.len(Category::Partitions), 0);
    }

    #[test]
    fn test_get_returns_copy() {
        let store = StateStore::new();
        store.set_field(Category::Inputs, "1", "status", "1");
        let mut copy = store.get(Category::Inputs, "1");
        copy.insert("status".to_string(), "4".to_string());
        assert_eq!(
            store.field(Category::Inputs, "1", "status").as_deref(),
            Some("1")
        );
    }

    #[test]
    fn test_dump_is_sorted() {
        let store = StateStore::new();
        store.set_field(Category::Partitions, "2", "ready", "1");
        store.set_field(Category::Partitions, "1", "status", "0");
        let dump = store.dump(Category::Partitions);
        let ids: Vec<_> = dump.keys().cloned().collect();
        assert_eq!(ids, vec!["1", "2"]);
    }
}
