//! Journal of entity changes made inside a transaction.
//!
//! Every add / remove / set / delete appends a `JournalEntry`, and each
//! collection keeps a `CollectionDiff` that collapses the entries down to the
//! net effect per entity id. At the outermost transaction boundary the store
//! takes the journal as a `ChangeSet`.

use crate::change_set::ChangeSet;
use alloc::collections::{BTreeMap, BTreeSet};
use alloc::string::String;
use alloc::vec::Vec;
use lumen_core::{EntityId, PropertyBag, Value};

/// Kind of a journal entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Add,
    Remove,
    Set,
    Delete,
}

/// A single recorded change.
#[derive(Clone, Debug, PartialEq)]
pub enum JournalEntry {
    /// An entity was added.
    Add {
        collection: String,
        id: EntityId,
        properties: PropertyBag,
    },
    /// An entity was removed. `properties` holds its final state.
    Remove {
        collection: String,
        id: EntityId,
        properties: PropertyBag,
    },
    /// A property was written. `old` is `None` if the property was new.
    Set {
        collection: String,
        id: EntityId,
        property: String,
        old: Option<Value>,
        new: Value,
    },
    /// A property was deleted.
    Delete {
        collection: String,
        id: EntityId,
        property: String,
        old: Value,
    },
}

impl JournalEntry {
    /// Returns the collection name for this entry.
    pub fn collection(&self) -> &str {
        match self {
            JournalEntry::Add { collection, .. } => collection,
            JournalEntry::Remove { collection, .. } => collection,
            JournalEntry::Set { collection, .. } => collection,
            JournalEntry::Delete { collection, .. } => collection,
        }
    }

    /// Returns the entity id for this entry.
    pub fn id(&self) -> &str {
        match self {
            JournalEntry::Add { id, .. } => id,
            JournalEntry::Remove { id, .. } => id,
            JournalEntry::Set { id, .. } => id,
            JournalEntry::Delete { id, .. } => id,
        }
    }

    /// Returns the kind of this entry.
    pub fn kind(&self) -> ChangeKind {
        match self {
            JournalEntry::Add { .. } => ChangeKind::Add,
            JournalEntry::Remove { .. } => ChangeKind::Remove,
            JournalEntry::Set { .. } => ChangeKind::Set,
            JournalEntry::Delete { .. } => ChangeKind::Delete,
        }
    }

    /// Returns the property touched by a set or delete.
    pub fn property(&self) -> Option<&str> {
        match self {
            JournalEntry::Set { property, .. } | JournalEntry::Delete { property, .. } => {
                Some(property)
            }
            _ => None,
        }
    }
}

/// Net changes to one collection.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CollectionDiff {
    added: BTreeSet<EntityId>,
    modified: BTreeSet<EntityId>,
    removed: BTreeSet<EntityId>,
}

impl CollectionDiff {
    /// Creates an empty diff.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an addition.
    pub fn add(&mut self, id: &str) {
        // Removed then re-added within one transaction nets out to a modify
        if self.removed.remove(id) {
            self.modified.insert(EntityId::from(id));
        } else {
            self.added.insert(EntityId::from(id));
        }
    }

    /// Records a property change.
    pub fn modify(&mut self, id: &str) {
        if self.added.contains(id) {
            return;
        }
        self.modified.insert(EntityId::from(id));
    }

    /// Records a removal.
    pub fn remove(&mut self, id: &str) {
        if self.added.remove(id) {
            return;
        }
        self.modified.remove(id);
        self.removed.insert(EntityId::from(id));
    }

    /// Returns the ids added.
    pub fn added(&self) -> &BTreeSet<EntityId> {
        &self.added
    }

    /// Returns the ids modified.
    pub fn modified(&self) -> &BTreeSet<EntityId> {
        &self.modified
    }

    /// Returns the ids removed.
    pub fn removed(&self) -> &BTreeSet<EntityId> {
        &self.removed
    }

    /// Returns true if there are no net changes.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.modified.is_empty() && self.removed.is_empty()
    }
}

/// Journal for recording changes within a transaction.
#[derive(Debug, Default)]
pub struct Journal {
    entries: Vec<JournalEntry>,
    diffs: BTreeMap<String, CollectionDiff>,
}

impl Journal {
    /// Creates an empty journal.
    pub fn new() -> Self {
        Self::default()
    }

    fn diff(&mut self, collection: &str) -> &mut CollectionDiff {
        self.diffs.entry(String::from(collection)).or_default()
    }

    /// Records an entity addition.
    pub fn record_add(&mut self, collection: &str, id: &str, properties: PropertyBag) {
        self.diff(collection).add(id);
        self.entries.push(JournalEntry::Add {
            collection: String::from(collection),
            id: EntityId::from(id),
            properties,
        });
    }

    /// Records an entity removal.
    pub fn record_remove(&mut self, collection: &str, id: &str, properties: PropertyBag) {
        self.diff(collection).remove(id);
        self.entries.push(JournalEntry::Remove {
            collection: String::from(collection),
            id: EntityId::from(id),
            properties,
        });
    }

    /// Records a property write.
    pub fn record_set(
        &mut self,
        collection: &str,
        id: &str,
        property: &str,
        old: Option<Value>,
        new: Value,
    ) {
        self.diff(collection).modify(id);
        self.entries.push(JournalEntry::Set {
            collection: String::from(collection),
            id: EntityId::from(id),
            property: String::from(property),
            old,
            new,
        });
    }

    /// Records a property deletion.
    pub fn record_delete(&mut self, collection: &str, id: &str, property: &str, old: Value) {
        self.diff(collection).modify(id);
        self.entries.push(JournalEntry::Delete {
            collection: String::from(collection),
            id: EntityId::from(id),
            property: String::from(property),
            old,
        });
    }

    /// Returns the recorded entries.
    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    /// Returns true if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Takes everything recorded so far, leaving the journal empty.
    pub fn take(&mut self) -> ChangeSet {
        let entries = core::mem::take(&mut self.entries);
        let mut diffs = core::mem::take(&mut self.diffs);
        diffs.retain(|_, diff| !diff.is_empty());
        ChangeSet::new(entries, diffs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::props;

    #[test]
    fn test_journal_records_in_order() {
        let mut journal = Journal::new();
        journal.record_add("people", "sam", props([("name", "sam")]));
        journal.record_set("people", "sam", "age", None, Value::from(30));
        journal.record_delete("people", "sam", "age", Value::from(30));

        let kinds: Vec<ChangeKind> = journal.entries().iter().map(|e| e.kind()).collect();
        assert_eq!(kinds, [ChangeKind::Add, ChangeKind::Set, ChangeKind::Delete]);
        assert_eq!(journal.entries()[1].property(), Some("age"));
        assert_eq!(journal.entries()[0].collection(), "people");
        assert_eq!(journal.entries()[0].id(), "sam");
    }

    #[test]
    fn test_take_empties_journal() {
        let mut journal = Journal::new();
        journal.record_add("people", "sam", PropertyBag::new());
        let changes = journal.take();
        assert_eq!(changes.len(), 1);
        assert!(journal.is_empty());
        assert!(journal.take().is_empty());
    }

    #[test]
    fn test_diff_add_then_modify_stays_added() {
        let mut diff = CollectionDiff::new();
        diff.add("sam");
        diff.modify("sam");
        assert!(diff.added().contains("sam"));
        assert!(diff.modified().is_empty());
    }

    #[test]
    fn test_diff_add_then_remove_cancels() {
        let mut journal = Journal::new();
        journal.record_add("people", "sam", PropertyBag::new());
        journal.record_remove("people", "sam", PropertyBag::new());
        let changes = journal.take();
        // Entries are kept, but the net diff is empty and dropped
        assert_eq!(changes.len(), 2);
        assert!(changes.diff("people").is_none());
    }

    #[test]
    fn test_diff_remove_then_add_is_modify() {
        let mut diff = CollectionDiff::new();
        diff.remove("sam");
        diff.add("sam");
        assert!(diff.removed().is_empty());
        assert!(diff.modified().contains("sam"));
    }

    #[test]
    fn test_diff_modify_then_remove_is_remove() {
        let mut diff = CollectionDiff::new();
        diff.modify("sam");
        diff.remove("sam");
        assert!(diff.modified().is_empty());
        assert!(diff.removed().contains("sam"));
    }
}
