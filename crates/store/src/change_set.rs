//! Change sets delivered to change subscribers.
//!
//! A `ChangeSet` is everything one outermost transaction recorded: the raw
//! journal entries in order plus the collapsed per-collection diffs.

use crate::journal::{CollectionDiff, JournalEntry};
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

/// Changes committed by one transaction.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChangeSet {
    entries: Vec<JournalEntry>,
    diffs: BTreeMap<String, CollectionDiff>,
}

impl ChangeSet {
    /// Creates a change set. Empty diffs should already be dropped.
    pub fn new(entries: Vec<JournalEntry>, diffs: BTreeMap<String, CollectionDiff>) -> Self {
        Self { entries, diffs }
    }

    /// Returns the journal entries in the order they were recorded.
    #[inline]
    pub fn entries(&self) -> &[JournalEntry] {
        &self.entries
    }

    /// Returns the number of entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no change was recorded.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the net diff of a collection, if it changed.
    pub fn diff(&self, collection: &str) -> Option<&CollectionDiff> {
        self.diffs.get(collection)
    }

    /// Returns the names of the collections with net changes.
    pub fn collections(&self) -> impl Iterator<Item = &str> {
        self.diffs.keys().map(|name| name.as_str())
    }

    /// Returns the entries touching one collection.
    pub fn entries_for<'a>(&'a self, collection: &'a str) -> impl Iterator<Item = &'a JournalEntry> {
        self.entries
            .iter()
            .filter(move |entry| entry.collection() == collection)
    }
}
