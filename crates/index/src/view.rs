//! Trackable index views.
//!
//! An `IndexView` is a cheap handle to one live index level. Every read goes
//! through the level's publishers, so a cell reading a view depends on
//! exactly what it looked at: a key lookup depends on that key only, a key
//! enumeration on the key set, and anything touching the full contents on
//! the whole level.

use crate::entries::IndexEntries;
use crate::schema::IndexKind;
use crate::traits::IndexedEntity;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use lumen_core::{EntityId, Value};
use lumen_reactive::Trackable;

/// A live, trackable view of one index level.
pub struct IndexView<E> {
    node: Rc<IndexEntries<E>>,
}

impl<E> Clone for IndexView<E> {
    fn clone(&self) -> Self {
        Self {
            node: self.node.clone(),
        }
    }
}

/// Value snapshot of an index level: its generation and the ids it holds in
/// index order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexSnapshot {
    pub generation: u64,
    pub ids: Vec<EntityId>,
}

impl<E: IndexedEntity + 'static> IndexView<E> {
    pub(crate) fn new(node: Rc<IndexEntries<E>>) -> Self {
        Self { node }
    }

    /// Returns the kind of the viewed level.
    #[inline]
    pub fn kind(&self) -> IndexKind {
        self.node.kind()
    }

    /// Returns the level's generation. Tracks the whole level.
    pub fn generation(&self) -> u64 {
        self.node.publishers().track_whole();
        self.node.publishers().generation()
    }

    /// Returns the number of entities at or below the level. Tracks the
    /// whole level.
    pub fn len(&self) -> usize {
        self.node.publishers().track_whole();
        self.node.len()
    }

    /// Returns true if the level holds no entity. Tracks the whole level.
    pub fn is_empty(&self) -> bool {
        self.node.publishers().track_whole();
        self.node.is_empty()
    }

    /// Returns the keys of a hash level in ascending order. Tracks the key set.
    pub fn keys(&self) -> Vec<Value> {
        self.node.publishers().track_keys();
        self.node.keys()
    }

    /// Returns true if a hash level holds `key`. Tracks that key only.
    pub fn contains_key(&self, key: &Value) -> bool {
        self.node.publishers().track_property(key);
        self.node.contains_key(key)
    }

    /// Looks up `key` in a UniqueHash level. Tracks that key only.
    pub fn get(&self, key: &Value) -> Option<Rc<E>> {
        match &*self.node {
            IndexEntries::UniqueHash(unique) => {
                unique.publishers().track_property(key);
                unique.get(key)
            }
            _ => None,
        }
    }

    /// Returns the bucket under `key` of a ManyHash level. Tracks that key
    /// only; reading the bucket's contents tracks the bucket.
    pub fn bucket(&self, key: &Value) -> Option<IndexView<E>> {
        match &*self.node {
            IndexEntries::ManyHash(many) => {
                many.publishers().track_property(key);
                many.bucket(key).map(IndexView::new)
            }
            _ => None,
        }
    }

    /// Returns every entity at or below the level in index order. Tracks the
    /// whole level.
    pub fn entities(&self) -> Vec<Rc<E>> {
        self.node.publishers().track_whole();
        let mut out = Vec::new();
        self.node.collect_entities(&mut out);
        out
    }

    /// Returns the ids of `entities()`. Tracks the whole level.
    pub fn ids(&self) -> Vec<EntityId> {
        self.entities()
            .iter()
            .map(|entity| String::from(entity.entity_id()))
            .collect()
    }

    /// Returns true if both views point at the same live level.
    pub fn ptr_eq(&self, other: &IndexView<E>) -> bool {
        Rc::ptr_eq(&self.node, &other.node)
    }
}

impl<E: IndexedEntity + 'static> Trackable for IndexView<E> {
    type View = IndexSnapshot;

    fn track_view(&self) -> IndexSnapshot {
        IndexSnapshot {
            generation: self.generation(),
            ids: self.ids(),
        }
    }
}
