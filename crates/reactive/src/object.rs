//! Per-object change-publisher registry.
//!
//! Every mutable object (an entity, a collection's id map, an index node) owns
//! one `ObjectPublishers`: a publisher per key, one for its key set and one
//! for the object as a whole. Publishers are created on first tracked read and
//! can be discarded on demand. The registry also carries the object's
//! generation counter, bumped every time the whole-object publisher fires.

use crate::publisher::Publisher;
use crate::runtime::Runtime;
use crate::trace::TraceKind;
use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use core::cell::{Cell, RefCell};
use core::fmt::Display;
use core::hash::Hash;
use hashbrown::HashMap;

/// The publishers owned by one mutable object.
pub struct ObjectPublishers<K> {
    runtime: Rc<Runtime>,
    label: String,
    keyed: RefCell<HashMap<K, Rc<Publisher>>>,
    keys: RefCell<Option<Rc<Publisher>>>,
    whole: RefCell<Option<Rc<Publisher>>>,
    generation: Cell<u64>,
}

impl<K: Hash + Eq + Clone + Display> ObjectPublishers<K> {
    /// Creates an empty registry. `label` prefixes every publisher name.
    pub fn new(runtime: Rc<Runtime>, label: impl Into<String>) -> Self {
        Self {
            runtime,
            label: label.into(),
            keyed: RefCell::new(HashMap::new()),
            keys: RefCell::new(None),
            whole: RefCell::new(None),
            generation: Cell::new(0),
        }
    }

    /// Returns the runtime.
    #[inline]
    pub fn runtime(&self) -> &Rc<Runtime> {
        &self.runtime
    }

    /// Returns the diagnostic label.
    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the generation counter.
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation.get()
    }

    /// Returns the publisher for `key`, creating it if needed.
    pub fn publisher(&self, key: &K) -> Rc<Publisher> {
        if let Some(publisher) = self.keyed.borrow().get(key) {
            return publisher.clone();
        }
        let publisher = Publisher::new(format!("{}.{}", self.label, key));
        self.keyed.borrow_mut().insert(key.clone(), publisher.clone());
        publisher
    }

    /// Returns the key-set publisher, creating it if needed.
    pub fn keys_publisher(&self) -> Rc<Publisher> {
        self.keys
            .borrow_mut()
            .get_or_insert_with(|| Publisher::new(format!("{}.@keys", self.label)))
            .clone()
    }

    /// Returns the whole-object publisher, creating it if needed.
    pub fn whole_publisher(&self) -> Rc<Publisher> {
        self.whole
            .borrow_mut()
            .get_or_insert_with(|| Publisher::new(format!("{}.@self", self.label)))
            .clone()
    }

    /// Registers the active subscriber on `key`'s publisher.
    pub fn track_property(&self, key: &K) {
        if self.runtime.is_tracking() {
            self.runtime.track(&self.publisher(key));
        }
    }

    /// Registers the active subscriber on the key-set publisher.
    pub fn track_keys(&self) {
        if self.runtime.is_tracking() {
            self.runtime.track(&self.keys_publisher());
        }
    }

    /// Registers the active subscriber on the whole-object publisher.
    pub fn track_whole(&self) {
        if self.runtime.is_tracking() {
            self.runtime.track(&self.whole_publisher());
        }
    }

    /// Notifies `key`'s publisher, if it was ever created.
    pub fn notify_property(&self, key: &K) {
        let publisher = self.keyed.borrow().get(key).cloned();
        if let Some(publisher) = publisher {
            self.notify(&publisher);
        }
    }

    /// Notifies the key-set publisher, if it was ever created.
    pub fn notify_keys(&self) {
        let publisher = self.keys.borrow().clone();
        if let Some(publisher) = publisher {
            self.notify(&publisher);
        }
    }

    /// Bumps the generation and notifies the whole-object publisher.
    pub fn notify_whole(&self) {
        self.generation.set(self.generation.get() + 1);
        let publisher = self.whole.borrow().clone();
        if let Some(publisher) = publisher {
            self.notify(&publisher);
        }
    }

    fn notify(&self, publisher: &Rc<Publisher>) {
        if !publisher.has_subscribers() {
            return;
        }
        self.runtime.trace(
            TraceKind::Notify,
            || String::from(publisher.name()),
            || publisher.notify(),
        );
    }

    /// Drops the publisher for `key`.
    pub fn discard(&self, key: &K) {
        self.keyed.borrow_mut().remove(key);
    }

    /// Drops every publisher.
    pub fn discard_all(&self) {
        self.keyed.borrow_mut().clear();
        *self.keys.borrow_mut() = None;
        *self.whole.borrow_mut() = None;
    }

    /// Returns the number of keyed publishers currently materialized.
    pub fn materialized(&self) -> usize {
        self.keyed.borrow().len()
    }
}
