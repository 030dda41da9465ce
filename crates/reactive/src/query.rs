//! Query / reaction cache cells.
//!
//! A `Query` wraps a zero-argument computation. Reading `value()` evaluates it
//! with the query as the active subscriber, so every tracked read inside
//! becomes a dependency; the dependency set is cleared before each evaluation
//! and rebuilt from exactly what the computation reads. The result is cached
//! until one of those dependencies notifies.
//!
//! Cell states: `Uncached -> Evaluating -> Cached | Uncached`, and `Removed`
//! from any state.

use crate::publisher::{next_subscriber_id, Dependencies, Publisher, Subscriber, SubscriberId};
use crate::runtime::Runtime;
use crate::trace::TraceKind;
use crate::worklist::NotifyAt;
use alloc::boxed::Box;
use alloc::format;
use alloc::rc::{Rc, Weak};
use alloc::string::String;
use core::cell::{Cell, RefCell};
use log::{debug, warn};
use lumen_core::{Error, Result};

/// Invalidation callback of a query.
pub type InvalidateCallback = Box<dyn Fn() -> Result<()>>;

/// Lifecycle state of a cache cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellState {
    Uncached,
    Cached,
    Evaluating,
    Removed,
}

/// An object a query can return in place of a plain value.
///
/// `track_view` subscribes the active subscriber to the object's whole-object
/// publisher and returns the object's current view. Views carry a generation
/// counter, so "the same object after an internal mutation" compares unequal.
pub trait Trackable {
    type View: Clone + 'static;

    fn track_view(&self) -> Self::View;
}

impl<T: Trackable + ?Sized> Trackable for Rc<T> {
    type View = T::View;

    fn track_view(&self) -> Self::View {
        (**self).track_view()
    }
}

/// Type-erased handle to a cell, used by owners that remove cells in bulk.
pub trait CacheCell {
    fn name(&self) -> &str;
    fn state(&self) -> CellState;
    fn remove(&self);
}

struct QueryInner<T> {
    id: SubscriberId,
    name: String,
    runtime: Rc<Runtime>,
    me: Weak<QueryInner<T>>,
    compute: Box<dyn Fn() -> Result<T>>,
    on_invalidate: Option<InvalidateCallback>,
    rerun: bool,
    notify_at: NotifyAt,
    state: Cell<CellState>,
    cached: RefCell<Option<T>>,
    invalidated_while_evaluating: Cell<bool>,
    evaluations: Cell<u64>,
    dependencies: Dependencies,
    publisher: Rc<Publisher>,
}

/// A memoized, dependency-tracked computation.
///
/// Cloning a `Query` yields another handle to the same cell.
pub struct Query<T> {
    inner: Rc<QueryInner<T>>,
}

impl<T> Clone for Query<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Builder for queries with an invalidation callback or a non-default flush
/// timing.
///
/// # Example
///
/// ```rust
/// use lumen_reactive::{NotifyAt, QueryBuilder, Runtime};
///
/// let runtime = Runtime::new();
/// let query = QueryBuilder::new("answer")
///     .notify_at(NotifyAt::TransactionEnd)
///     .on_invalidate(|| Ok(()))
///     .build(&runtime, || Ok(42));
/// assert_eq!(query.value().unwrap(), 42);
/// assert_eq!(query.notify_at(), NotifyAt::TransactionEnd);
/// ```
pub struct QueryBuilder {
    name: String,
    on_invalidate: Option<InvalidateCallback>,
    notify_at: NotifyAt,
    rerun: bool,
}

impl QueryBuilder {
    /// Starts a query named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            on_invalidate: None,
            notify_at: NotifyAt::default(),
            rerun: false,
        }
    }

    /// Sets the callback queued whenever the query is invalidated.
    pub fn on_invalidate<F>(mut self, callback: F) -> Self
    where
        F: Fn() -> Result<()> + 'static,
    {
        self.on_invalidate = Some(Box::new(callback));
        self
    }

    /// Sets the worklist the invalidation callback is queued on.
    pub fn notify_at(mut self, notify_at: NotifyAt) -> Self {
        self.notify_at = notify_at;
        self
    }

    /// Makes the query re-evaluate itself as its invalidation callback.
    pub(crate) fn rerun_on_invalidate(mut self) -> Self {
        self.rerun = true;
        self
    }

    /// Builds the query. Nothing is evaluated until `value()` is read.
    pub fn build<T, F>(self, runtime: &Rc<Runtime>, compute: F) -> Query<T>
    where
        T: Clone + 'static,
        F: Fn() -> Result<T> + 'static,
    {
        let publisher = Publisher::new(format!("{}.@value", self.name));
        let inner = Rc::new_cyclic(|me| QueryInner {
            id: next_subscriber_id(),
            name: self.name,
            runtime: runtime.clone(),
            me: me.clone(),
            compute: Box::new(compute),
            on_invalidate: self.on_invalidate,
            rerun: self.rerun,
            notify_at: self.notify_at,
            state: Cell::new(CellState::Uncached),
            cached: RefCell::new(None),
            invalidated_while_evaluating: Cell::new(false),
            evaluations: Cell::new(0),
            dependencies: Dependencies::new(),
            publisher,
        });
        Query { inner }
    }
}

impl<T: Clone + 'static> Query<T> {
    /// Returns the memoized value, evaluating the computation if needed.
    ///
    /// Reading a query inside another cell makes that cell depend on it.
    pub fn value(&self) -> Result<T> {
        let inner = &self.inner;
        match inner.state.get() {
            CellState::Removed => return Err(Error::cell_removed(inner.name.as_str())),
            CellState::Evaluating => {
                warn!("query {} read its own value while evaluating", inner.name);
                return Err(Error::self_referential_cycle(inner.name.as_str()));
            }
            CellState::Cached => {
                let cached = inner.cached.borrow().clone();
                if let Some(value) = cached {
                    inner.runtime.track(&inner.publisher);
                    return Ok(value);
                }
            }
            CellState::Uncached => {}
        }

        let value = inner.evaluate()?;
        inner.runtime.track(&inner.publisher);
        Ok(value)
    }
}

impl<T> Query<T> {
    /// Returns the query name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the current cell state.
    #[inline]
    pub fn state(&self) -> CellState {
        self.inner.state.get()
    }

    /// Returns true if a value is cached. A cached `None` or `()` counts.
    #[inline]
    pub fn has_cached_value(&self) -> bool {
        self.inner.state.get() == CellState::Cached
    }

    /// Returns true once `remove()` has been called.
    #[inline]
    pub fn is_removed(&self) -> bool {
        self.inner.state.get() == CellState::Removed
    }

    /// Returns the flush timing of the invalidation callback.
    #[inline]
    pub fn notify_at(&self) -> NotifyAt {
        self.inner.notify_at
    }

    /// Returns how many times the computation has run.
    #[inline]
    pub fn evaluations(&self) -> u64 {
        self.inner.evaluations.get()
    }

    /// Returns the number of publishers the query currently depends on.
    pub fn dependency_count(&self) -> usize {
        self.inner.dependencies.len()
    }

    /// Returns the names of the publishers the query currently depends on.
    pub fn dependency_names(&self) -> alloc::vec::Vec<String> {
        self.inner.dependencies.names()
    }

    /// Unsubscribes from everything and marks the query removed. Later reads
    /// fail with `Error::CellRemoved`.
    pub fn remove(&self) {
        let inner = &self.inner;
        if inner.state.get() == CellState::Removed {
            return;
        }
        debug!("removing query {}", inner.name);
        inner.state.set(CellState::Removed);
        inner.cached.borrow_mut().take();
        inner.dependencies.clear(inner.id);
    }
}

impl<T> CacheCell for Query<T> {
    fn name(&self) -> &str {
        Query::name(self)
    }

    fn state(&self) -> CellState {
        Query::state(self)
    }

    fn remove(&self) {
        Query::remove(self)
    }
}

impl<T: Clone + 'static> QueryInner<T> {
    fn evaluate(&self) -> Result<T> {
        let Some(me) = self.me.upgrade() else {
            return Err(Error::cell_removed(self.name.as_str()));
        };

        self.state.set(CellState::Evaluating);
        self.invalidated_while_evaluating.set(false);
        self.dependencies.clear(self.id);

        let subscriber: Rc<dyn Subscriber> = me;
        let result = self.runtime.trace(
            TraceKind::Evaluate,
            || self.name.clone(),
            || self.runtime.with_subscriber(subscriber, || (self.compute)()),
        );
        self.evaluations.set(self.evaluations.get() + 1);

        if self.state.get() == CellState::Removed {
            return result;
        }

        match result {
            Ok(value) => {
                if self.invalidated_while_evaluating.get() {
                    // A cell that invalidates itself is re-driven, never cached
                    debug!("query {} invalidated while evaluating, not caching", self.name);
                    self.state.set(CellState::Uncached);
                } else {
                    *self.cached.borrow_mut() = Some(value.clone());
                    self.state.set(CellState::Cached);
                }
                Ok(value)
            }
            Err(err) => {
                self.state.set(CellState::Uncached);
                Err(err)
            }
        }
    }
}

impl<T: Clone + 'static> Subscriber for QueryInner<T> {
    fn subscriber_id(&self) -> SubscriberId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn dependencies(&self) -> &Dependencies {
        &self.dependencies
    }

    fn notify_change(&self) {
        match self.state.get() {
            CellState::Removed => return,
            CellState::Evaluating => self.invalidated_while_evaluating.set(true),
            CellState::Cached | CellState::Uncached => {
                self.cached.borrow_mut().take();
                self.state.set(CellState::Uncached);
                self.dependencies.clear(self.id);
            }
        }

        self.runtime.trace(
            TraceKind::Invalidate,
            || self.name.clone(),
            || {
                if self.rerun || self.on_invalidate.is_some() {
                    if let Some(me) = self.me.upgrade() {
                        self.runtime.enqueue(me, self.notify_at);
                    }
                }
                self.publisher.notify();
            },
        );
    }

    fn run_invalidation(&self) -> Result<()> {
        if self.state.get() == CellState::Removed {
            return Ok(());
        }
        if self.rerun {
            if let Some(me) = self.me.upgrade() {
                Query { inner: me }.value()?;
            }
            return Ok(());
        }
        match &self.on_invalidate {
            Some(callback) => callback(),
            None => Ok(()),
        }
    }
}
