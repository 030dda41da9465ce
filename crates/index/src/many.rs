//! ManyHash level: key to a nested bucket.
//!
//! An absent key property files the entity under `Value::Null`. Buckets are
//! created on first use and pruned when their last entity leaves.

use crate::entries::{IndexContext, IndexEntries};
use crate::schema::IndexSchema;
use crate::traits::{read_property, IndexedEntity, PropertyOverride};
use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use hashbrown::HashMap;
use log::debug;
use lumen_core::{Result, Value};
use lumen_reactive::ObjectPublishers;

/// Live state of a ManyHash level.
pub struct ManyEntries<E> {
    ctx: Rc<IndexContext>,
    property: String,
    child: IndexSchema,
    publishers: ObjectPublishers<Value>,
    buckets: RefCell<HashMap<Value, Rc<IndexEntries<E>>>>,
}

impl<E: IndexedEntity + 'static> ManyEntries<E> {
    pub(crate) fn new(
        ctx: Rc<IndexContext>,
        property: String,
        child: IndexSchema,
        publishers: ObjectPublishers<Value>,
    ) -> Self {
        Self {
            ctx,
            property,
            child,
            publishers,
            buckets: RefCell::new(HashMap::new()),
        }
    }

    /// Returns the key property.
    #[inline]
    pub fn property(&self) -> &str {
        &self.property
    }

    #[inline]
    pub(crate) fn publishers(&self) -> &ObjectPublishers<Value> {
        &self.publishers
    }

    pub fn len(&self) -> usize {
        self.buckets.borrow().values().map(|bucket| bucket.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.borrow().is_empty()
    }

    /// Returns the number of buckets.
    pub fn bucket_count(&self) -> usize {
        self.buckets.borrow().len()
    }

    /// Returns the bucket for `key`. Untracked.
    pub fn bucket(&self, key: &Value) -> Option<Rc<IndexEntries<E>>> {
        self.buckets.borrow().get(key).cloned()
    }

    pub(crate) fn keys(&self) -> Vec<Value> {
        let mut keys: Vec<Value> = self.buckets.borrow().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub(crate) fn collect_entities(&self, out: &mut Vec<Rc<E>>) {
        for key in self.keys() {
            if let Some(bucket) = self.bucket(&key) {
                bucket.collect_entities(out);
            }
        }
    }

    fn key_of(&self, entity: &E, over: Option<PropertyOverride<'_>>) -> Value {
        read_property(entity, &self.property, over).unwrap_or(Value::Null)
    }

    pub(crate) fn added(&self, entity: &Rc<E>) -> Result<bool> {
        let key = self.key_of(entity, None);
        self.update_bucket(key, |bucket| bucket.added(entity))
    }

    pub(crate) fn removed(&self, entity: &Rc<E>, over: Option<PropertyOverride<'_>>) -> Result<bool> {
        let key = self.key_of(entity, over);
        let bucket = self.bucket(&key);
        let Some(bucket) = bucket else {
            return Ok(false);
        };
        let result = bucket.removed(entity, over);
        if bucket.is_empty() {
            self.prune(&key);
            return result.map(|_| true);
        }
        result
    }

    /// Moves the entity between buckets when this level's key changed, and
    /// otherwise hands the event to the entity's current bucket.
    pub(crate) fn property_changed(
        &self,
        entity: &Rc<E>,
        property: &str,
        old: Option<&Value>,
        new: Option<&Value>,
    ) -> Result<bool> {
        if property == self.property {
            let old_key = old.cloned().unwrap_or(Value::Null);
            let new_key = new.cloned().unwrap_or(Value::Null);
            if old_key != new_key {
                let over = PropertyOverride {
                    property,
                    value: old,
                };
                let removed = self.removed(entity, Some(over))?;
                let added = self.update_bucket(new_key, |bucket| bucket.added(entity))?;
                return Ok(removed || added);
            }
        }

        // The entity is filed under its current key. A missing bucket is
        // created in case the change makes the entity visible to the child.
        let key = self.key_of(entity, None);
        self.update_bucket(key, |bucket| bucket.property_changed(entity, property, old, new))
    }

    /// Runs `f` on the bucket for `key`, creating it first if needed, then
    /// keeps or prunes the bucket depending on whether it ended up empty.
    fn update_bucket<F>(&self, key: Value, f: F) -> Result<bool>
    where
        F: FnOnce(&IndexEntries<E>) -> Result<bool>,
    {
        let existing = self.bucket(&key);
        let (bucket, created) = match existing {
            Some(bucket) => (bucket, false),
            None => {
                let label = format!("{}[{}]", self.publishers.label(), key);
                let bucket = IndexEntries::new(&self.ctx, &self.child, label);
                self.buckets.borrow_mut().insert(key.clone(), bucket.clone());
                (bucket, true)
            }
        };

        let result = f(&bucket);

        if bucket.is_empty() {
            if created {
                // Never observable: nothing landed in it
                self.buckets.borrow_mut().remove(&key);
                return result.map(|_| false);
            }
            self.prune(&key);
            return result.map(|_| true);
        }

        if created {
            self.ctx.stats.bucket_created();
            debug!("index {}: bucket {} created", self.ctx.name, key);
            self.publishers.notify_property(&key);
            self.publishers.notify_keys();
        }
        result.map(|changed| changed || created)
    }

    fn prune(&self, key: &Value) {
        if self.buckets.borrow_mut().remove(key).is_none() {
            return;
        }
        self.ctx.stats.bucket_pruned();
        debug!("index {}: bucket {} pruned", self.ctx.name, key);
        self.publishers.notify_property(key);
        self.publishers.notify_keys();
        self.publishers.discard(key);
    }
}
