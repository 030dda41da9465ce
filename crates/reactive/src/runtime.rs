//! The reactive runtime.
//!
//! A `Runtime` is shared (`Rc`) by every object of one store. It owns the
//! active-subscriber stack used for dependency tracking, the transaction depth
//! consulted before every write, the two notification worklists, and the
//! optional trace sink.

use crate::config::RuntimeConfig;
use crate::publisher::{Publisher, Subscriber};
use crate::query::{Query, QueryBuilder, Trackable};
use crate::trace::{EventSink, TraceEvent, TraceKind};
use crate::worklist::{NotifyAt, Worklist};
use alloc::boxed::Box;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::{Cell, RefCell};
use log::{debug, warn};
use lumen_core::{Error, Result};

/// Shared state of one reactive store.
pub struct Runtime {
    config: RuntimeConfig,
    /// `None` entries mark untracked scopes.
    active: RefCell<Vec<Option<Rc<dyn Subscriber>>>>,
    depth: Cell<usize>,
    transaction_end: Worklist,
    after_transaction: Worklist,
    sink: RefCell<Option<Box<dyn EventSink>>>,
}

impl Runtime {
    /// Creates a runtime with the default configuration.
    pub fn new() -> Rc<Self> {
        Self::with_config(RuntimeConfig::default())
    }

    /// Creates a runtime with the given configuration.
    pub fn with_config(config: RuntimeConfig) -> Rc<Self> {
        let threshold = config.get_cycle_threshold();
        Rc::new(Self {
            config,
            active: RefCell::new(Vec::new()),
            depth: Cell::new(0),
            transaction_end: Worklist::new("transactionEnd", threshold),
            after_transaction: Worklist::new("afterTransaction", threshold),
            sink: RefCell::new(None),
        })
    }

    /// Returns the configuration.
    #[inline]
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    // ==================== Dependency tracking ====================

    /// Returns true if reads currently register dependencies.
    pub fn is_tracking(&self) -> bool {
        matches!(self.active.borrow().last(), Some(Some(_)))
    }

    /// Registers the active subscriber, if any, on `publisher`.
    pub fn track(&self, publisher: &Rc<Publisher>) {
        let active = match self.active.borrow().last() {
            Some(Some(subscriber)) => subscriber.clone(),
            _ => return,
        };
        if active.dependencies().add(publisher) {
            publisher.add_subscriber(active.subscriber_id(), Rc::downgrade(&active));
        }
    }

    /// Runs `f` with `subscriber` as the active subscriber.
    pub fn with_subscriber<R>(&self, subscriber: Rc<dyn Subscriber>, f: impl FnOnce() -> R) -> R {
        self.active.borrow_mut().push(Some(subscriber));
        let result = f();
        self.active.borrow_mut().pop();
        result
    }

    /// Runs `f` with no active subscriber; reads inside do not register
    /// dependencies.
    pub fn untracked<R>(&self, f: impl FnOnce() -> R) -> R {
        self.active.borrow_mut().push(None);
        let result = f();
        self.active.borrow_mut().pop();
        result
    }

    // ==================== Transactions ====================

    /// Returns true while a transaction is active.
    #[inline]
    pub fn in_transaction(&self) -> bool {
        self.depth.get() > 0
    }

    /// Fails unless a transaction is active.
    pub fn check_mutable(&self) -> Result<()> {
        if self.in_transaction() {
            Ok(())
        } else {
            Err(Error::MutationOutsideTransaction)
        }
    }

    /// Runs `f` inside a transaction.
    ///
    /// Nested calls collapse into the outermost one. When the outermost body
    /// returns, the `TransactionEnd` worklist is drained while the transaction
    /// is still active, the transaction ends, and then the `AfterTransaction`
    /// worklist is drained. Both worklists are drained even when `f` fails;
    /// the body's error takes precedence over a drain error.
    pub fn transaction<R>(&self, f: impl FnOnce() -> Result<R>) -> Result<R> {
        let depth = self.depth.get();
        self.depth.set(depth + 1);
        if depth > 0 {
            let result = f();
            self.depth.set(depth);
            return result;
        }

        debug!("transaction begin");
        let result = f();
        let drained = self.flush_transaction_end();
        self.depth.set(0);
        let drained = drained.and(self.flush_after_transaction());
        debug!("transaction end");

        match (result, drained) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(err)) => Err(err),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(drain_err)) => {
                warn!("flush after failed transaction also failed: {}", drain_err);
                Err(err)
            }
        }
    }

    /// Queues an invalidated subscriber on the worklist for `notify_at`.
    pub fn enqueue(&self, subscriber: Rc<dyn Subscriber>, notify_at: NotifyAt) {
        match notify_at {
            NotifyAt::TransactionEnd => self.transaction_end.push(subscriber),
            NotifyAt::AfterTransaction => self.after_transaction.push(subscriber),
        };
    }

    /// Drains the `TransactionEnd` worklist.
    pub fn flush_transaction_end(&self) -> Result<()> {
        self.untracked(|| self.transaction_end.drain())
    }

    /// Drains the `AfterTransaction` worklist.
    pub fn flush_after_transaction(&self) -> Result<()> {
        self.untracked(|| self.after_transaction.drain())
    }

    /// Returns the number of subscribers waiting on the worklist for `notify_at`.
    pub fn pending(&self, notify_at: NotifyAt) -> usize {
        match notify_at {
            NotifyAt::TransactionEnd => self.transaction_end.len(),
            NotifyAt::AfterTransaction => self.after_transaction.len(),
        }
    }

    // ==================== Cells ====================

    /// Creates an `AfterTransaction` query with no invalidation callback.
    pub fn create_query<T, F>(self: &Rc<Self>, name: impl Into<String>, compute: F) -> Query<T>
    where
        T: Clone + 'static,
        F: Fn() -> Result<T> + 'static,
    {
        QueryBuilder::new(name).build(self, compute)
    }

    /// Creates a query whose computation returns a trackable object.
    ///
    /// The query subscribes to the object's whole-object publisher and caches
    /// the object's current view, so a change anywhere inside the object
    /// invalidates it even when the computation would return the same object.
    pub fn create_tracked_query<O, F>(
        self: &Rc<Self>,
        name: impl Into<String>,
        compute: F,
    ) -> Query<O::View>
    where
        O: Trackable,
        F: Fn() -> Result<O> + 'static,
    {
        QueryBuilder::new(name).build(self, move || Ok(compute()?.track_view()))
    }

    /// Creates a reaction: a `TransactionEnd` cell that evaluates once now and
    /// re-evaluates itself every time it is invalidated.
    ///
    /// The first evaluation runs inside a transaction, joining the caller's
    /// if there is one, so a reaction may write on its first run.
    pub fn create_reaction<F>(self: &Rc<Self>, name: impl Into<String>, compute: F) -> Result<Query<()>>
    where
        F: Fn() -> Result<()> + 'static,
    {
        let reaction = QueryBuilder::new(name)
            .notify_at(NotifyAt::TransactionEnd)
            .rerun_on_invalidate()
            .build(self, compute);
        self.transaction(|| reaction.value())?;
        Ok(reaction)
    }

    // ==================== Tracing ====================

    /// Installs (or removes, with `None`) the trace event sink.
    pub fn set_event_sink(&self, sink: Option<Box<dyn EventSink>>) {
        *self.sink.borrow_mut() = sink;
    }

    /// Returns true if a trace event sink is installed.
    pub fn has_event_sink(&self) -> bool {
        self.sink.borrow().is_some()
    }

    /// Runs `f` as a traced operation. `label` is only evaluated when a sink
    /// is installed.
    pub fn trace<R>(&self, kind: TraceKind, label: impl FnOnce() -> String, f: impl FnOnce() -> R) -> R {
        if self.sink.borrow().is_none() {
            return f();
        }
        if let Some(sink) = self.sink.borrow_mut().as_mut() {
            sink.enter(TraceEvent {
                kind,
                label: label(),
            });
        }
        let result = f();
        if let Some(sink) = self.sink.borrow_mut().as_mut() {
            sink.exit();
        }
        result
    }
}
