//! The store facade.

use crate::change_set::ChangeSet;
use crate::collection::Collection;
use crate::journal::Journal;
use crate::subscription::{SubscriptionId, SubscriptionManager};
use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use log::debug;
use lumen_core::Result;
use lumen_reactive::{Query, QueryBuilder, Runtime, RuntimeConfig, TraceRecorder, Trackable};

/// An in-memory reactive entity store.
///
/// # Example
///
/// ```rust
/// use lumen_core::props;
/// use lumen_store::Store;
///
/// let store = Store::new();
/// let people = store.collection("people");
/// let by_name = people.sort_index(&["+name"]).unwrap();
///
/// store
///     .transaction(|| {
///         people.add("e1", props([("name", "sam")]))?;
///         people.add("e2", props([("name", "maggie")]))?;
///         Ok(())
///     })
///     .unwrap();
///
/// assert_eq!(by_name.proxy().ids(), ["e2", "e1"]);
/// ```
pub struct Store {
    runtime: Rc<Runtime>,
    journal: Rc<RefCell<Journal>>,
    collections: RefCell<BTreeMap<String, Rc<Collection>>>,
    subscriptions: RefCell<SubscriptionManager>,
    recorder: Option<TraceRecorder>,
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

impl Store {
    /// Creates a store with the default configuration.
    pub fn new() -> Self {
        Self::with_config(RuntimeConfig::default())
    }

    /// Creates a store with the given configuration.
    pub fn with_config(config: RuntimeConfig) -> Self {
        let trace = config.get_trace_events();
        let runtime = Runtime::with_config(config);
        let recorder = trace.then(|| {
            let recorder = TraceRecorder::new();
            runtime.set_event_sink(Some(Box::new(recorder.clone())));
            recorder
        });
        Self {
            runtime,
            journal: Rc::new(RefCell::new(Journal::new())),
            collections: RefCell::new(BTreeMap::new()),
            subscriptions: RefCell::new(SubscriptionManager::new()),
            recorder,
        }
    }

    /// Returns the shared runtime.
    #[inline]
    pub fn runtime(&self) -> &Rc<Runtime> {
        &self.runtime
    }

    /// Returns the collection called `name`, creating it if needed.
    pub fn collection(&self, name: &str) -> Rc<Collection> {
        if let Some(collection) = self.collections.borrow().get(name) {
            return collection.clone();
        }
        debug!("creating collection {}", name);
        let collection = Collection::new(self.runtime.clone(), self.journal.clone(), name);
        self.collections
            .borrow_mut()
            .insert(String::from(name), collection.clone());
        collection
    }

    /// Returns the names of the existing collections.
    pub fn collection_names(&self) -> Vec<String> {
        self.collections.borrow().keys().cloned().collect()
    }

    /// Runs `f` inside a transaction.
    ///
    /// When the outermost transaction finishes, after both worklists have
    /// been drained, the recorded changes are delivered to change
    /// subscribers. This happens even if `f` failed, since nothing is rolled
    /// back.
    pub fn transaction<R>(&self, f: impl FnOnce() -> Result<R>) -> Result<R> {
        let outermost = !self.runtime.in_transaction();
        let result = self.runtime.transaction(f);
        if outermost {
            self.publish();
        }
        result
    }

    fn publish(&self) {
        let changes: ChangeSet = self.journal.borrow_mut().take();
        if changes.is_empty() {
            return;
        }
        let callbacks = self.subscriptions.borrow().callbacks();
        debug!(
            "publishing {} changes to {} subscribers",
            changes.len(),
            callbacks.len()
        );
        for callback in callbacks {
            callback(&changes);
        }
    }

    /// Runs `f` with dependency tracking suspended.
    pub fn untracked<R>(&self, f: impl FnOnce() -> R) -> R {
        self.runtime.untracked(f)
    }

    // ==================== Cells ====================

    /// Creates an `AfterTransaction` query. See `Runtime::create_query`.
    pub fn create_query<T, F>(&self, name: impl Into<String>, compute: F) -> Query<T>
    where
        T: Clone + 'static,
        F: Fn() -> Result<T> + 'static,
    {
        self.runtime.create_query(name, compute)
    }

    /// Returns a builder for a query with a callback or a custom flush point.
    pub fn query_builder(&self, name: impl Into<String>) -> QueryBuilder {
        QueryBuilder::new(name)
    }

    /// Creates a query returning a trackable object's view. See
    /// `Runtime::create_tracked_query`.
    pub fn create_tracked_query<O, F>(&self, name: impl Into<String>, compute: F) -> Query<O::View>
    where
        O: Trackable,
        F: Fn() -> Result<O> + 'static,
    {
        self.runtime.create_tracked_query(name, compute)
    }

    /// Creates a reaction and evaluates it once inside a store transaction,
    /// so writes made by the first run reach change subscribers. See
    /// `Runtime::create_reaction`.
    pub fn create_reaction<F>(&self, name: impl Into<String>, compute: F) -> Result<Query<()>>
    where
        F: Fn() -> Result<()> + 'static,
    {
        self.transaction(|| self.runtime.create_reaction(name, compute))
    }

    // ==================== Change subscriptions ====================

    /// Registers a callback receiving the changes of every outermost
    /// transaction that recorded something.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&ChangeSet) + 'static,
    {
        self.subscriptions.borrow_mut().subscribe(callback)
    }

    /// Removes a change subscription. Returns false if it did not exist.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscriptions.borrow_mut().unsubscribe(id)
    }

    /// Returns the trace recorder installed by `RuntimeConfig::trace_events`.
    pub fn trace_recorder(&self) -> Option<&TraceRecorder> {
        self.recorder.as_ref()
    }
}
