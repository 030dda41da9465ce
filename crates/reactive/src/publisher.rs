//! Publisher / subscriber graph.
//!
//! A `Publisher` is one observable cell. Notifying it calls every registered
//! subscriber and then forgets all of them: a subscriber that still cares has
//! to register again the next time it reads the publisher. This is what keeps
//! dependency edges from going stale.

use alloc::rc::{Rc, Weak};
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::sync::atomic::{AtomicU64, Ordering};
use hashbrown::HashSet;
use log::trace;
use lumen_core::Result;

/// Unique identifier for a publisher.
pub type PublisherId = u64;

/// Unique identifier for a subscriber.
pub type SubscriberId = u64;

/// Global publisher ID counter.
static NEXT_PUBLISHER_ID: AtomicU64 = AtomicU64::new(1);

/// Global subscriber ID counter.
static NEXT_SUBSCRIBER_ID: AtomicU64 = AtomicU64::new(1);

/// Allocates a fresh subscriber ID.
pub fn next_subscriber_id() -> SubscriberId {
    NEXT_SUBSCRIBER_ID.fetch_add(1, Ordering::Relaxed)
}

/// Anything that can depend on publishers.
pub trait Subscriber {
    /// Returns the subscriber ID.
    fn subscriber_id(&self) -> SubscriberId;

    /// Returns the diagnostic name.
    fn name(&self) -> &str;

    /// Returns the publishers this subscriber currently depends on.
    fn dependencies(&self) -> &Dependencies;

    /// Called by a publisher this subscriber depends on when it changes.
    fn notify_change(&self);

    /// Runs the invalidation callback. Called when this subscriber is popped
    /// off a notification worklist.
    fn run_invalidation(&self) -> Result<()>;
}

/// One observable cell.
pub struct Publisher {
    id: PublisherId,
    name: String,
    subscribers: RefCell<Vec<(SubscriberId, Weak<dyn Subscriber>)>>,
}

impl Publisher {
    /// Creates a new publisher.
    pub fn new(name: impl Into<String>) -> Rc<Self> {
        Rc::new(Self {
            id: NEXT_PUBLISHER_ID.fetch_add(1, Ordering::Relaxed),
            name: name.into(),
            subscribers: RefCell::new(Vec::new()),
        })
    }

    /// Returns the publisher ID.
    #[inline]
    pub fn id(&self) -> PublisherId {
        self.id
    }

    /// Returns the diagnostic name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }

    /// Returns true if at least one subscriber is registered.
    pub fn has_subscribers(&self) -> bool {
        !self.subscribers.borrow().is_empty()
    }

    /// Registers a subscriber, dropping entries whose subscriber is gone.
    ///
    /// Callers go through `Dependencies::add`, which guarantees a subscriber
    /// is registered at most once.
    pub fn add_subscriber(&self, id: SubscriberId, subscriber: Weak<dyn Subscriber>) {
        let mut subscribers = self.subscribers.borrow_mut();
        subscribers.retain(|(_, weak)| weak.strong_count() > 0);
        subscribers.push((id, subscriber));
    }

    /// Unregisters a subscriber.
    pub fn remove_subscriber(&self, id: SubscriberId) {
        self.subscribers.borrow_mut().retain(|(sid, _)| *sid != id);
    }

    /// Notifies every subscriber, then clears the subscriber list.
    pub fn notify(&self) {
        let subscribers = core::mem::take(&mut *self.subscribers.borrow_mut());
        if subscribers.is_empty() {
            return;
        }
        trace!("notify {} ({} subscribers)", self.name, subscribers.len());
        for (_, subscriber) in subscribers {
            if let Some(subscriber) = subscriber.upgrade() {
                subscriber.notify_change();
            }
        }
    }
}

impl core::fmt::Debug for Publisher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Publisher")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// The set of publishers a subscriber depends on.
#[derive(Default)]
pub struct Dependencies {
    publishers: RefCell<Vec<Rc<Publisher>>>,
    ids: RefCell<HashSet<PublisherId>>,
}

impl Dependencies {
    /// Creates an empty dependency set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a dependency. Returns false if it was already recorded.
    pub fn add(&self, publisher: &Rc<Publisher>) -> bool {
        if !self.ids.borrow_mut().insert(publisher.id()) {
            return false;
        }
        self.publishers.borrow_mut().push(publisher.clone());
        true
    }

    /// Unregisters `subscriber` from every recorded publisher and forgets them.
    pub fn clear(&self, subscriber: SubscriberId) {
        let publishers = core::mem::take(&mut *self.publishers.borrow_mut());
        self.ids.borrow_mut().clear();
        for publisher in publishers {
            publisher.remove_subscriber(subscriber);
        }
    }

    /// Returns true if `publisher` is recorded.
    pub fn contains(&self, publisher: &Publisher) -> bool {
        self.ids.borrow().contains(&publisher.id())
    }

    /// Returns the number of recorded publishers.
    pub fn len(&self) -> usize {
        self.publishers.borrow().len()
    }

    /// Returns true if no publisher is recorded.
    pub fn is_empty(&self) -> bool {
        self.publishers.borrow().is_empty()
    }

    /// Returns the names of the recorded publishers, in subscription order.
    pub fn names(&self) -> Vec<String> {
        self.publishers
            .borrow()
            .iter()
            .map(|p| String::from(p.name()))
            .collect()
    }
}
