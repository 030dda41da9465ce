//! Change subscriptions.
//!
//! Subscribers receive the `ChangeSet` of every outermost transaction that
//! recorded something.

use crate::change_set::ChangeSet;
use alloc::rc::Rc;
use alloc::vec::Vec;
use hashbrown::HashMap;

/// Unique identifier for a subscription.
pub type SubscriptionId = u64;

/// Callback type for change notifications.
pub type ChangeCallback = Rc<dyn Fn(&ChangeSet)>;

/// Manages change subscriptions of one store.
pub struct SubscriptionManager {
    subscriptions: HashMap<SubscriptionId, ChangeCallback>,
    next_id: SubscriptionId,
}

impl Default for SubscriptionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionManager {
    /// Creates a new subscription manager.
    pub fn new() -> Self {
        Self {
            subscriptions: HashMap::new(),
            next_id: 1,
        }
    }

    /// Subscribes to changes with the given callback.
    ///
    /// Returns the subscription ID that can be used to unsubscribe.
    pub fn subscribe<F>(&mut self, callback: F) -> SubscriptionId
    where
        F: Fn(&ChangeSet) + 'static,
    {
        let id = self.next_id;
        self.next_id += 1;
        self.subscriptions.insert(id, Rc::new(callback));
        id
    }

    /// Unsubscribes by ID.
    ///
    /// Returns true if the subscription was found and removed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscriptions.remove(&id).is_some()
    }

    /// Returns the callbacks in subscription order.
    ///
    /// The manager is not borrowed while callbacks run, so a callback may
    /// subscribe, unsubscribe or open another transaction.
    pub fn callbacks(&self) -> Vec<ChangeCallback> {
        let mut ids: Vec<&SubscriptionId> = self.subscriptions.keys().collect();
        ids.sort_unstable();
        ids.into_iter()
            .filter_map(|id| self.subscriptions.get(id).cloned())
            .collect()
    }

    /// Returns the number of subscriptions.
    #[inline]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Returns true if there are no subscriptions.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}
