//! Live index state.
//!
//! `IndexEntries` mirrors one schema level with live data. Each variant owns
//! its own publishers: a publisher per key, the key-set publisher and the
//! whole-object publisher. Hash levels notify a key's publisher and the
//! key-set publisher only when that key appears or disappears; every level
//! notifies its whole-object publisher whenever anything below it changed.
//!
//! Every mutation reports whether the level changed, so parents know when to
//! notify their own whole-object publisher.

use crate::many::ManyEntries;
use crate::schema::{IndexKind, IndexSchema};
use crate::sort::SortEntries;
use crate::stats::IndexStats;
use crate::traits::{IndexedEntity, PropertyOverride};
use crate::unique::UniqueEntries;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use lumen_core::{Result, Value};
use lumen_reactive::{ObjectPublishers, Runtime};

/// State shared by every level of one index.
pub(crate) struct IndexContext {
    pub(crate) name: String,
    pub(crate) runtime: Rc<Runtime>,
    pub(crate) stats: IndexStats,
}

/// One live level of an index.
pub enum IndexEntries<E> {
    UniqueHash(UniqueEntries<E>),
    ManyHash(ManyEntries<E>),
    Sort(SortEntries<E>),
}

impl<E: IndexedEntity + 'static> IndexEntries<E> {
    pub(crate) fn new(ctx: &Rc<IndexContext>, schema: &IndexSchema, label: String) -> Rc<Self> {
        let publishers = ObjectPublishers::new(ctx.runtime.clone(), label);
        let entries = match schema {
            IndexSchema::UniqueHash { property } => {
                IndexEntries::UniqueHash(UniqueEntries::new(ctx.clone(), property.clone(), publishers))
            }
            IndexSchema::ManyHash { property, child } => IndexEntries::ManyHash(ManyEntries::new(
                ctx.clone(),
                property.clone(),
                (**child).clone(),
                publishers,
            )),
            IndexSchema::Sort { directives } => {
                IndexEntries::Sort(SortEntries::new(ctx.clone(), directives.clone(), publishers))
            }
        };
        Rc::new(entries)
    }

    /// Returns the kind of this level.
    pub fn kind(&self) -> IndexKind {
        match self {
            IndexEntries::UniqueHash(_) => IndexKind::UniqueHash,
            IndexEntries::ManyHash(_) => IndexKind::ManyHash,
            IndexEntries::Sort(_) => IndexKind::Sort,
        }
    }

    /// Returns the publishers of this level.
    pub fn publishers(&self) -> &ObjectPublishers<Value> {
        match self {
            IndexEntries::UniqueHash(u) => u.publishers(),
            IndexEntries::ManyHash(m) => m.publishers(),
            IndexEntries::Sort(s) => s.publishers(),
        }
    }

    /// Returns the number of entities at or below this level. Untracked.
    pub fn len(&self) -> usize {
        match self {
            IndexEntries::UniqueHash(u) => u.len(),
            IndexEntries::ManyHash(m) => m.len(),
            IndexEntries::Sort(s) => s.len(),
        }
    }

    /// Returns true if no entity is at or below this level. Untracked.
    pub fn is_empty(&self) -> bool {
        match self {
            IndexEntries::UniqueHash(u) => u.is_empty(),
            IndexEntries::ManyHash(m) => m.is_empty(),
            IndexEntries::Sort(s) => s.is_empty(),
        }
    }

    /// Returns the keys of a hash level in ascending order. Untracked.
    pub fn keys(&self) -> Vec<Value> {
        match self {
            IndexEntries::UniqueHash(u) => u.keys(),
            IndexEntries::ManyHash(m) => m.keys(),
            IndexEntries::Sort(_) => Vec::new(),
        }
    }

    /// Returns true if a hash level holds `key`. Untracked.
    pub fn contains_key(&self, key: &Value) -> bool {
        match self {
            IndexEntries::UniqueHash(u) => u.get(key).is_some(),
            IndexEntries::ManyHash(m) => m.bucket(key).is_some(),
            IndexEntries::Sort(_) => false,
        }
    }

    /// Appends every entity at or below this level, in index order. Untracked.
    ///
    /// Hash levels are walked in ascending key order.
    pub fn collect_entities(&self, out: &mut Vec<Rc<E>>) {
        match self {
            IndexEntries::UniqueHash(u) => u.collect_entities(out),
            IndexEntries::ManyHash(m) => m.collect_entities(out),
            IndexEntries::Sort(s) => s.collect_entities(out),
        }
    }

    pub(crate) fn added(&self, entity: &Rc<E>) -> Result<bool> {
        let result = match self {
            IndexEntries::UniqueHash(u) => u.added(entity),
            IndexEntries::ManyHash(m) => m.added(entity),
            IndexEntries::Sort(s) => Ok(s.added(entity)),
        };
        self.settle(result)
    }

    pub(crate) fn removed(&self, entity: &Rc<E>, over: Option<PropertyOverride<'_>>) -> Result<bool> {
        let result = match self {
            IndexEntries::UniqueHash(u) => Ok(u.removed(entity, over)),
            IndexEntries::ManyHash(m) => m.removed(entity, over),
            IndexEntries::Sort(s) => Ok(s.removed(entity, over)),
        };
        self.settle(result)
    }

    pub(crate) fn property_changed(
        &self,
        entity: &Rc<E>,
        property: &str,
        old: Option<&Value>,
        new: Option<&Value>,
    ) -> Result<bool> {
        let result = match self {
            IndexEntries::UniqueHash(u) => u.property_changed(entity, property, old, new),
            IndexEntries::ManyHash(m) => m.property_changed(entity, property, old, new),
            IndexEntries::Sort(s) => Ok(s.property_changed(entity, property, old)),
        };
        self.settle(result)
    }

    /// Notifies the whole-object publisher unless the level is known to be
    /// untouched. A failed update may have applied part of its effect, so it
    /// counts as a change.
    fn settle(&self, result: Result<bool>) -> Result<bool> {
        if !matches!(result, Ok(false)) {
            self.publishers().notify_whole();
        }
        result
    }
}
