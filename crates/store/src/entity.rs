//! Entities and the tracking accessor layer.
//!
//! Every read and write of an entity's property bag goes through
//! `EntityState`. Reads register the active subscriber on the matching
//! publisher; writes that change a value notify the property's publisher and
//! the whole-object publisher (plus the key-set publisher when a property
//! appears or disappears) and report the change to the owning collection.

use crate::collection::Collection;
use alloc::boxed::Box;
use alloc::format;
use alloc::rc::{Rc, Weak};
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use log::debug;
use lumen_core::{EntityId, Error, PropertyBag, Result, Value};
use lumen_index::IndexedEntity;
use lumen_reactive::{CacheCell, ObjectPublishers, Query, Runtime, TraceKind, Trackable};

/// Shared handle to an entity.
pub type Entity = Rc<EntityState>;

/// An immutable snapshot of an entity.
///
/// A fresh view is built after every change, so two views of the same entity
/// compare unequal (and are distinct allocations) exactly when the entity
/// changed in between.
#[derive(Clone, Debug, PartialEq)]
pub struct EntityView {
    pub id: EntityId,
    pub generation: u64,
    pub properties: PropertyBag,
}

impl EntityView {
    /// Returns a property of the snapshot.
    pub fn get(&self, property: &str) -> Option<&Value> {
        self.properties.get(property)
    }
}

/// Runtime state of one entity.
pub struct EntityState {
    id: EntityId,
    me: Weak<EntityState>,
    runtime: Rc<Runtime>,
    bag: RefCell<PropertyBag>,
    removed: Cell<bool>,
    publishers: ObjectPublishers<String>,
    owner: Weak<Collection>,
    view: RefCell<Option<Rc<EntityView>>>,
    cells: RefCell<Vec<Box<dyn CacheCell>>>,
}

impl EntityState {
    pub(crate) fn new(
        runtime: Rc<Runtime>,
        owner: Weak<Collection>,
        id: EntityId,
        bag: PropertyBag,
    ) -> Entity {
        Rc::new_cyclic(|me| EntityState {
            publishers: ObjectPublishers::new(runtime.clone(), id.clone()),
            id,
            me: me.clone(),
            runtime,
            bag: RefCell::new(bag),
            removed: Cell::new(false),
            owner,
            view: RefCell::new(None),
            cells: RefCell::new(Vec::new()),
        })
    }

    /// Returns the entity id.
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns true once the entity has been removed from its collection.
    #[inline]
    pub fn is_removed(&self) -> bool {
        self.removed.get()
    }

    // ==================== Tracked reads ====================

    fn track(&self, property: &str) {
        if self.runtime.is_tracking() {
            self.publishers.track_property(&String::from(property));
        }
    }

    /// Reads a property. Tracks that property.
    pub fn get(&self, property: &str) -> Option<Value> {
        self.track(property);
        self.bag.borrow().get(property).cloned()
    }

    /// Returns true if the property exists. Tracks that property.
    pub fn has(&self, property: &str) -> bool {
        self.track(property);
        self.bag.borrow().contains_key(property)
    }

    /// Returns the property names in ascending order. Tracks the key set.
    pub fn keys(&self) -> Vec<String> {
        self.publishers.track_keys();
        self.bag.borrow().keys().cloned().collect()
    }

    /// Returns the current snapshot. Tracks the whole entity.
    pub fn view(&self) -> Rc<EntityView> {
        self.publishers.track_whole();
        if let Some(view) = self.view.borrow().as_ref() {
            return view.clone();
        }
        let view = Rc::new(EntityView {
            id: self.id.clone(),
            generation: self.publishers.generation(),
            properties: self.bag.borrow().clone(),
        });
        *self.view.borrow_mut() = Some(view.clone());
        view
    }

    /// Returns the generation counter. Tracks the whole entity.
    pub fn generation(&self) -> u64 {
        self.publishers.track_whole();
        self.publishers.generation()
    }

    /// Reads a property without registering a dependency.
    pub fn peek(&self, property: &str) -> Option<Value> {
        self.bag.borrow().get(property).cloned()
    }

    // ==================== Writes ====================

    fn check_writable(&self) -> Result<()> {
        self.runtime.check_mutable()?;
        if self.removed.get() {
            return Err(Error::entity_removed(self.id.as_str()));
        }
        Ok(())
    }

    /// Writes a property.
    ///
    /// Writing the value a property already holds is a no-op. Floats count
    /// as the same value only when their bits match, so `0.0 -> -0.0` is a
    /// change while rewriting a NaN is not. Index errors propagate after the
    /// bag has been updated.
    pub fn set(&self, property: &str, value: impl Into<Value>) -> Result<()> {
        self.check_writable()?;
        let value = value.into();
        self.runtime.trace(
            TraceKind::Set,
            || format!("{}.{}", self.id, property),
            || {
                let old = self
                    .bag
                    .borrow_mut()
                    .insert(String::from(property), value.clone());
                if old.as_ref().is_some_and(|old| old.is_identical(&value)) {
                    return Ok(());
                }
                self.changed(property, old.is_none());
                self.report(property, old.as_ref(), Some(&value))
            },
        )
    }

    /// Deletes a property. Deleting a missing property is a no-op.
    pub fn delete(&self, property: &str) -> Result<()> {
        self.check_writable()?;
        self.runtime.trace(
            TraceKind::Delete,
            || format!("{}.{}", self.id, property),
            || {
                let old = self.bag.borrow_mut().remove(property);
                let Some(old) = old else {
                    return Ok(());
                };
                self.changed(property, true);
                self.report(property, Some(&old), None)
            },
        )
    }

    /// Writes several properties, stopping at the first error.
    pub fn update(&self, properties: PropertyBag) -> Result<()> {
        for (property, value) in properties {
            self.set(&property, value)?;
        }
        Ok(())
    }

    fn changed(&self, property: &str, key_set_changed: bool) {
        self.view.borrow_mut().take();
        self.publishers.notify_property(&String::from(property));
        if key_set_changed {
            self.publishers.notify_keys();
        }
        self.publishers.notify_whole();
    }

    fn report(&self, property: &str, old: Option<&Value>, new: Option<&Value>) -> Result<()> {
        match (self.owner.upgrade(), self.me.upgrade()) {
            (Some(owner), Some(me)) => owner.entity_property_changed(&me, property, old, new),
            _ => Ok(()),
        }
    }

    // ==================== Per-instance cells ====================

    /// Declares a query owned by this entity. It is named `<id>.<name>` and
    /// removed together with the entity.
    pub fn declare_query<T, F>(&self, name: &str, compute: F) -> Result<Query<T>>
    where
        T: Clone + 'static,
        F: Fn() -> Result<T> + 'static,
    {
        if self.removed.get() {
            return Err(Error::entity_removed(self.id.as_str()));
        }
        let query = self
            .runtime
            .create_query(format!("{}.{}", self.id, name), compute);
        self.cells.borrow_mut().push(Box::new(query.clone()));
        Ok(query)
    }

    /// Returns the number of declared cells still attached.
    pub fn declared_cells(&self) -> usize {
        self.cells.borrow().len()
    }

    /// Marks the entity removed, removes its cells, notifies observers of
    /// the whole entity and drops its publishers.
    pub(crate) fn detach(&self) {
        self.removed.set(true);
        let cells = core::mem::take(&mut *self.cells.borrow_mut());
        for cell in &cells {
            cell.remove();
        }
        debug!("entity {} detached, {} cells removed", self.id, cells.len());
        self.view.borrow_mut().take();
        self.publishers.notify_whole();
        self.publishers.discard_all();
    }

    /// Returns a clone of the property bag. Untracked.
    pub fn snapshot(&self) -> PropertyBag {
        self.bag.borrow().clone()
    }
}

impl IndexedEntity for EntityState {
    fn entity_id(&self) -> &str {
        &self.id
    }

    fn peek(&self, property: &str) -> Option<Value> {
        EntityState::peek(self, property)
    }
}

impl Trackable for EntityState {
    type View = Rc<EntityView>;

    fn track_view(&self) -> Rc<EntityView> {
        self.view()
    }
}

impl core::fmt::Debug for EntityState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EntityState")
            .field("id", &self.id)
            .field("removed", &self.removed.get())
            .field("properties", &*self.bag.borrow())
            .finish()
    }
}
