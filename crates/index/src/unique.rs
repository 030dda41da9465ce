//! UniqueHash level: key to a single entity.
//!
//! Entities whose key property is absent or null are not indexed.

use crate::entries::IndexContext;
use crate::traits::{read_property, IndexedEntity, PropertyOverride};
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use hashbrown::HashMap;
use log::warn;
use lumen_core::{Error, Result, Value};
use lumen_reactive::ObjectPublishers;

/// Live state of a UniqueHash level.
pub struct UniqueEntries<E> {
    ctx: Rc<IndexContext>,
    property: String,
    publishers: ObjectPublishers<Value>,
    map: RefCell<HashMap<Value, Rc<E>>>,
}

impl<E: IndexedEntity> UniqueEntries<E> {
    pub(crate) fn new(ctx: Rc<IndexContext>, property: String, publishers: ObjectPublishers<Value>) -> Self {
        Self {
            ctx,
            property,
            publishers,
            map: RefCell::new(HashMap::new()),
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
        self.map.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.borrow().is_empty()
    }

    /// Returns the entity stored under `key`. Untracked.
    pub fn get(&self, key: &Value) -> Option<Rc<E>> {
        self.map.borrow().get(key).cloned()
    }

    pub(crate) fn keys(&self) -> Vec<Value> {
        let mut keys: Vec<Value> = self.map.borrow().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub(crate) fn collect_entities(&self, out: &mut Vec<Rc<E>>) {
        let map = self.map.borrow();
        for key in self.keys() {
            if let Some(entity) = map.get(&key) {
                out.push(entity.clone());
            }
        }
    }

    fn key_of(&self, entity: &E, over: Option<PropertyOverride<'_>>) -> Option<Value> {
        read_property(entity, &self.property, over).filter(|key| !key.is_null())
    }

    pub(crate) fn added(&self, entity: &Rc<E>) -> Result<bool> {
        match self.key_of(entity, None) {
            Some(key) => self.insert(key, entity),
            None => Ok(false),
        }
    }

    pub(crate) fn removed(&self, entity: &Rc<E>, over: Option<PropertyOverride<'_>>) -> bool {
        match self.key_of(entity, over) {
            Some(key) => self.remove(&key, entity),
            None => false,
        }
    }

    /// Re-keys the entity when the key property changed. The old key is
    /// released before the new one is claimed, so a violation leaves the
    /// entity out of the index.
    pub(crate) fn property_changed(
        &self,
        entity: &Rc<E>,
        property: &str,
        old: Option<&Value>,
        new: Option<&Value>,
    ) -> Result<bool> {
        if property != self.property {
            return Ok(false);
        }
        let mut changed = false;
        if let Some(old_key) = old.filter(|key| !key.is_null()) {
            changed |= self.remove(old_key, entity);
        }
        if let Some(new_key) = new.filter(|key| !key.is_null()) {
            changed |= self.insert(new_key.clone(), entity)?;
        }
        Ok(changed)
    }

    fn insert(&self, key: Value, entity: &Rc<E>) -> Result<bool> {
        {
            let mut map = self.map.borrow_mut();
            if let Some(existing) = map.get(&key) {
                if existing.entity_id() == entity.entity_id() {
                    return Ok(false);
                }
                warn!(
                    "index {}: {} and {} share key {} on property {}",
                    self.ctx.name,
                    existing.entity_id(),
                    entity.entity_id(),
                    key,
                    self.property
                );
                return Err(Error::unique_key_violation(
                    key,
                    self.property.as_str(),
                    self.ctx.name.as_str(),
                ));
            }
            map.insert(key.clone(), entity.clone());
        }
        self.ctx.stats.entity_added();
        self.publishers.notify_property(&key);
        self.publishers.notify_keys();
        Ok(true)
    }

    fn remove(&self, key: &Value, entity: &E) -> bool {
        {
            let mut map = self.map.borrow_mut();
            let held = map
                .get(key)
                .is_some_and(|existing| existing.entity_id() == entity.entity_id());
            if !held {
                return false;
            }
            map.remove(key);
        }
        self.ctx.stats.entity_removed();
        self.publishers.notify_property(key);
        self.publishers.notify_keys();
        self.publishers.discard(key);
        true
    }
}
