//! Collections of entities.
//!
//! A collection owns the live entity map, is itself an observable object (one
//! publisher per id, a key-set publisher and a whole-collection publisher),
//! records every mutation in the store journal and forwards it to its indexes
//! and custom observers through the `EntityObserver` contract.

use crate::entity::{Entity, EntityState};
use crate::journal::Journal;
use alloc::collections::BTreeMap;
use alloc::format;
use alloc::rc::{Rc, Weak};
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use log::{debug, warn};
use lumen_core::{EntityId, Error, PropertyBag, Result, Value};
use lumen_index::{EntityObserver, Index, IndexKind, IndexSchema};
use lumen_reactive::{ObjectPublishers, Runtime, TraceKind, Trackable};

/// Snapshot of a collection's id set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IdsSnapshot {
    pub generation: u64,
    pub ids: Vec<EntityId>,
}

/// A named set of entities.
pub struct Collection {
    name: String,
    me: Weak<Collection>,
    runtime: Rc<Runtime>,
    journal: Rc<RefCell<Journal>>,
    entities: RefCell<BTreeMap<EntityId, Entity>>,
    publishers: ObjectPublishers<EntityId>,
    indexes: RefCell<Vec<Rc<Index<EntityState>>>>,
    observers: RefCell<Vec<Rc<dyn EntityObserver<EntityState>>>>,
    next_index: Cell<usize>,
}

impl Collection {
    pub(crate) fn new(
        runtime: Rc<Runtime>,
        journal: Rc<RefCell<Journal>>,
        name: impl Into<String>,
    ) -> Rc<Self> {
        let name = name.into();
        Rc::new_cyclic(|me| Collection {
            publishers: ObjectPublishers::new(runtime.clone(), name.clone()),
            name,
            me: me.clone(),
            runtime,
            journal,
            entities: RefCell::new(BTreeMap::new()),
            indexes: RefCell::new(Vec::new()),
            observers: RefCell::new(Vec::new()),
            next_index: Cell::new(1),
        })
    }

    /// Returns the collection name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    // ==================== Mutations ====================

    /// Adds an entity.
    ///
    /// The entity stays added even if an index rejects it; the first index
    /// error is returned after every index and observer has seen the entity.
    pub fn add(&self, id: impl Into<EntityId>, properties: PropertyBag) -> Result<Entity> {
        self.runtime.check_mutable()?;
        let id = id.into();
        self.runtime.trace(
            TraceKind::Add,
            || format!("{}.{}", self.name, id),
            || {
                if self.entities.borrow().contains_key(&id) {
                    return Err(Error::duplicate_entity(self.name.as_str(), id.as_str()));
                }
                let entity = EntityState::new(
                    self.runtime.clone(),
                    self.me.clone(),
                    id.clone(),
                    properties.clone(),
                );
                self.entities.borrow_mut().insert(id.clone(), entity.clone());
                self.publishers.notify_property(&id);
                self.publishers.notify_keys();
                self.publishers.notify_whole();
                self.journal
                    .borrow_mut()
                    .record_add(&self.name, &id, properties);

                self.dispatch(|observer| observer.on_entity_added(&id, &entity))?;
                Ok(entity)
            },
        )
    }

    /// Removes an entity.
    ///
    /// The entity leaves every index, its declared cells are removed and it
    /// becomes terminally removed.
    pub fn remove(&self, id: &str) -> Result<()> {
        self.runtime.check_mutable()?;
        let entity = self
            .entities
            .borrow()
            .get(id)
            .cloned()
            .ok_or_else(|| Error::entity_not_found(self.name.as_str(), id))?;
        self.runtime.trace(
            TraceKind::Remove,
            || format!("{}.{}", self.name, id),
            || {
                let indexed = self.dispatch(|observer| observer.on_entity_removed(&entity));

                self.entities.borrow_mut().remove(id);
                self.journal
                    .borrow_mut()
                    .record_remove(&self.name, id, entity.snapshot());
                entity.detach();

                let key = EntityId::from(id);
                self.publishers.notify_property(&key);
                self.publishers.notify_keys();
                self.publishers.notify_whole();
                self.publishers.discard(&key);
                indexed
            },
        )
    }

    /// Called by an entity after one of its properties changed.
    pub(crate) fn entity_property_changed(
        &self,
        entity: &Entity,
        property: &str,
        old: Option<&Value>,
        new: Option<&Value>,
    ) -> Result<()> {
        {
            let mut journal = self.journal.borrow_mut();
            match (old, new) {
                (_, Some(new)) => {
                    journal.record_set(&self.name, entity.id(), property, old.cloned(), new.clone())
                }
                (Some(old), None) => {
                    journal.record_delete(&self.name, entity.id(), property, old.clone())
                }
                (None, None) => {}
            }
        }
        self.dispatch(|observer| observer.on_entity_property_changed(entity, property, old, new))
    }

    /// Feeds an event to every index, then every custom observer.
    ///
    /// All of them see the event; the first error is returned.
    fn dispatch<F>(&self, f: F) -> Result<()>
    where
        F: Fn(&dyn EntityObserver<EntityState>) -> Result<()>,
    {
        let indexes = self.indexes.borrow().clone();
        let observers = self.observers.borrow().clone();
        let mut first = None;
        let mut deliver = |observer: &dyn EntityObserver<EntityState>| {
            if let Err(err) = f(observer) {
                if first.is_none() {
                    first = Some(err);
                } else {
                    warn!("{}: further observer error: {}", self.name, err);
                }
            }
        };
        for index in &indexes {
            let index: &Index<EntityState> = index;
            deliver(index);
        }
        for observer in &observers {
            deliver(observer.as_ref());
        }
        first.map_or(Ok(()), Err)
    }

    // ==================== Tracked reads ====================

    /// Returns an entity. Tracks that id.
    pub fn get(&self, id: &str) -> Option<Entity> {
        if self.runtime.is_tracking() {
            self.publishers.track_property(&EntityId::from(id));
        }
        self.entities.borrow().get(id).cloned()
    }

    /// Returns true if the id is present. Tracks that id.
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Returns the ids in ascending order. Tracks the key set.
    pub fn ids(&self) -> Vec<EntityId> {
        self.publishers.track_keys();
        self.entities.borrow().keys().cloned().collect()
    }

    /// Returns the number of entities. Tracks the key set.
    pub fn len(&self) -> usize {
        self.publishers.track_keys();
        self.entities.borrow().len()
    }

    /// Returns true if the collection is empty. Tracks the key set.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the entities in id order. Tracks the key set.
    pub fn entities(&self) -> Vec<Entity> {
        self.publishers.track_keys();
        self.entities.borrow().values().cloned().collect()
    }

    /// Returns a snapshot of the id set. Tracks the whole collection.
    pub fn view(&self) -> IdsSnapshot {
        self.publishers.track_whole();
        IdsSnapshot {
            generation: self.publishers.generation(),
            ids: self.entities.borrow().keys().cloned().collect(),
        }
    }

    /// Returns the generation counter. Tracks the whole collection.
    pub fn generation(&self) -> u64 {
        self.publishers.track_whole();
        self.publishers.generation()
    }

    // ==================== Indexes ====================

    /// Returns a unique index over `terms`, creating it if needed.
    pub fn unique_index(&self, terms: &[&str]) -> Result<Rc<Index<EntityState>>> {
        self.register(None, IndexSchema::parse(terms, true)?)
    }

    /// Returns a many-valued hash index over `terms`, creating it if needed.
    pub fn many_index(&self, terms: &[&str]) -> Result<Rc<Index<EntityState>>> {
        let schema = IndexSchema::parse(terms, false)?;
        if schema.kind() != IndexKind::ManyHash {
            return Err(Error::invalid_schema(format!(
                "many index needs a leading '=' term, got {}",
                schema
            )));
        }
        self.register(None, schema)
    }

    /// Returns a sort index over `terms`, creating it if needed.
    pub fn sort_index(&self, terms: &[&str]) -> Result<Rc<Index<EntityState>>> {
        let schema = IndexSchema::parse(terms, false)?;
        if schema.kind() != IndexKind::Sort {
            return Err(Error::invalid_schema(format!(
                "sort index takes only '+' and '-' terms, got {}",
                schema
            )));
        }
        self.register(None, schema)
    }

    /// Returns the index called `name`, creating it over `terms` if needed.
    ///
    /// An existing index with that name but a different schema is an error.
    pub fn named_index(
        &self,
        name: &str,
        terms: &[&str],
        unique: bool,
    ) -> Result<Rc<Index<EntityState>>> {
        self.register(Some(name), IndexSchema::parse(terms, unique)?)
    }

    fn register(&self, name: Option<&str>, schema: IndexSchema) -> Result<Rc<Index<EntityState>>> {
        for index in self.indexes.borrow().iter() {
            let same_name = name.is_some_and(|name| index.name() == name);
            let same_schema = index.matches_schema(&schema);
            match (same_name, same_schema) {
                (true, true) => return Ok(index.clone()),
                (true, false) => {
                    return Err(Error::invalid_schema(format!(
                        "index {} already exists as {}",
                        index.name(),
                        index.schema()
                    )))
                }
                (false, true) if name.is_none() => return Ok(index.clone()),
                _ => {}
            }
        }

        let name = match name {
            Some(name) => String::from(name),
            None => {
                let next = self.next_index.get();
                self.next_index.set(next + 1);
                format!("index{}", next)
            }
        };
        let index = Rc::new(Index::new(self.runtime.clone(), name, schema));

        // Populating an index is not a read of the collection by the caller
        let entities: Vec<Entity> = self.entities.borrow().values().cloned().collect();
        self.runtime.untracked(|| {
            entities
                .iter()
                .try_for_each(|entity| index.on_entity_added(entity.id(), entity))
        })?;

        debug!(
            "{}: registered index {} over {} entities",
            self.name,
            index.name(),
            entities.len()
        );
        self.indexes.borrow_mut().push(index.clone());
        Ok(index)
    }

    /// Returns the registered indexes in registration order.
    pub fn indexes(&self) -> Vec<Rc<Index<EntityState>>> {
        self.indexes.borrow().clone()
    }

    /// Registers a custom observer fed the same events as the indexes.
    pub fn add_observer(&self, observer: Rc<dyn EntityObserver<EntityState>>) {
        self.observers.borrow_mut().push(observer);
    }
}

impl Trackable for Collection {
    type View = IdsSnapshot;

    fn track_view(&self) -> IdsSnapshot {
        self.view()
    }
}

impl core::fmt::Debug for Collection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("entities", &self.entities.borrow().len())
            .field("indexes", &self.indexes.borrow().len())
            .finish()
    }
}
