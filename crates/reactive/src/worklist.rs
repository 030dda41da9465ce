//! Notification worklist.
//!
//! A FIFO queue of invalidated subscribers waiting for their invalidation
//! callback. A subscriber queued twice before the queue drains is processed
//! once. Within one drain pass a subscriber's callback may run at most
//! `threshold` times; one more run aborts the drain as a cycle.

use crate::publisher::{Subscriber, SubscriberId};
use alloc::collections::VecDeque;
use alloc::rc::Rc;
use core::cell::{Cell, RefCell};
use hashbrown::{HashMap, HashSet};
use log::{trace, warn};
use lumen_core::{Error, Result};

/// When an invalidated cell's callback is delivered.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum NotifyAt {
    /// Drained before the outermost transaction returns, while it is still
    /// active. Used by reactions.
    TransactionEnd,
    /// Drained after the outermost transaction has ended.
    #[default]
    AfterTransaction,
}

/// A queue of subscribers awaiting their invalidation callback.
pub struct Worklist {
    label: &'static str,
    threshold: usize,
    queue: RefCell<VecDeque<Rc<dyn Subscriber>>>,
    queued: RefCell<HashSet<SubscriberId>>,
    runs: RefCell<HashMap<SubscriberId, usize>>,
    draining: Cell<bool>,
}

impl Worklist {
    /// Creates an empty worklist.
    pub fn new(label: &'static str, threshold: usize) -> Self {
        Self {
            label,
            threshold,
            queue: RefCell::new(VecDeque::new()),
            queued: RefCell::new(HashSet::new()),
            runs: RefCell::new(HashMap::new()),
            draining: Cell::new(false),
        }
    }

    /// Returns the cycle threshold.
    #[inline]
    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Returns the number of queued subscribers.
    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Returns true if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }

    /// Returns true while a drain pass is running.
    #[inline]
    pub fn is_draining(&self) -> bool {
        self.draining.get()
    }

    /// Queues a subscriber. Returns false if it is already queued.
    pub fn push(&self, subscriber: Rc<dyn Subscriber>) -> bool {
        if !self.queued.borrow_mut().insert(subscriber.subscriber_id()) {
            return false;
        }
        trace!("{}: queued {}", self.label, subscriber.name());
        self.queue.borrow_mut().push_back(subscriber);
        true
    }

    /// Drains the queue, including anything queued while draining.
    ///
    /// A re-entrant call returns immediately; the outer pass picks up the new
    /// entries. On error the remaining queue is discarded.
    pub fn drain(&self) -> Result<()> {
        if self.draining.get() {
            return Ok(());
        }
        self.draining.set(true);
        let result = self.drain_pass();
        self.draining.set(false);
        self.runs.borrow_mut().clear();
        if result.is_err() {
            self.clear();
        }
        result
    }

    fn drain_pass(&self) -> Result<()> {
        loop {
            let next = self.queue.borrow_mut().pop_front();
            let Some(subscriber) = next else {
                return Ok(());
            };
            let id = subscriber.subscriber_id();
            self.queued.borrow_mut().remove(&id);

            let runs = {
                let mut runs = self.runs.borrow_mut();
                let count = runs.entry(id).or_insert(0);
                *count += 1;
                *count
            };
            if runs > self.threshold {
                warn!(
                    "{}: {} invalidated more than {} times, aborting flush",
                    self.label,
                    subscriber.name(),
                    self.threshold
                );
                return Err(Error::invalidation_cycle(subscriber.name(), self.threshold));
            }

            subscriber.run_invalidation()?;
        }
    }

    /// Discards every queued subscriber.
    pub fn clear(&self) {
        self.queue.borrow_mut().clear();
        self.queued.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::{next_subscriber_id, Dependencies};
    use alloc::rc::Weak;
    use alloc::vec::Vec;

    /// Re-queues itself on every run until `stop_after` runs.
    struct Bouncer {
        id: SubscriberId,
        runs: Cell<usize>,
        stop_after: usize,
        deps: Dependencies,
        worklist: Weak<Worklist>,
        me: Weak<Bouncer>,
        log: Rc<RefCell<Vec<SubscriberId>>>,
    }

    impl Bouncer {
        fn new(
            worklist: &Rc<Worklist>,
            stop_after: usize,
            log: &Rc<RefCell<Vec<SubscriberId>>>,
        ) -> Rc<Self> {
            Rc::new_cyclic(|me| Self {
                id: next_subscriber_id(),
                runs: Cell::new(0),
                stop_after,
                deps: Dependencies::new(),
                worklist: Rc::downgrade(worklist),
                me: me.clone(),
                log: log.clone(),
            })
        }
    }

    impl Subscriber for Bouncer {
        fn subscriber_id(&self) -> SubscriberId {
            self.id
        }

        fn name(&self) -> &str {
            "bouncer"
        }

        fn dependencies(&self) -> &Dependencies {
            &self.deps
        }

        fn notify_change(&self) {}

        fn run_invalidation(&self) -> Result<()> {
            self.runs.set(self.runs.get() + 1);
            self.log.borrow_mut().push(self.id);
            if self.runs.get() < self.stop_after {
                if let (Some(worklist), Some(me)) = (self.worklist.upgrade(), self.me.upgrade()) {
                    worklist.push(me);
                }
            }
            Ok(())
        }
    }

    #[test]
    fn test_push_deduplicates() {
        let worklist = Rc::new(Worklist::new("test", 20));
        let log = Rc::new(RefCell::new(Vec::new()));
        let a = Bouncer::new(&worklist, 1, &log);

        assert!(worklist.push(a.clone()));
        assert!(!worklist.push(a.clone()));
        assert_eq!(worklist.len(), 1);

        worklist.drain().unwrap();
        assert_eq!(a.runs.get(), 1);
        assert!(worklist.is_empty());
    }

    #[test]
    fn test_drain_is_fifo() {
        let worklist = Rc::new(Worklist::new("test", 20));
        let log = Rc::new(RefCell::new(Vec::new()));
        let a = Bouncer::new(&worklist, 1, &log);
        let b = Bouncer::new(&worklist, 1, &log);
        let c = Bouncer::new(&worklist, 1, &log);

        worklist.push(b.clone());
        worklist.push(a.clone());
        worklist.push(c.clone());
        worklist.drain().unwrap();

        assert_eq!(*log.borrow(), [b.id, a.id, c.id]);
    }

    #[test]
    fn test_drain_processes_entries_added_while_draining() {
        let worklist = Rc::new(Worklist::new("test", 20));
        let log = Rc::new(RefCell::new(Vec::new()));
        let a = Bouncer::new(&worklist, 5, &log);

        worklist.push(a.clone());
        worklist.drain().unwrap();
        assert_eq!(a.runs.get(), 5);
    }

    #[test]
    fn test_threshold_runs_allowed() {
        let worklist = Rc::new(Worklist::new("test", 20));
        let log = Rc::new(RefCell::new(Vec::new()));
        let a = Bouncer::new(&worklist, 20, &log);

        worklist.push(a.clone());
        assert!(worklist.drain().is_ok());
        assert_eq!(a.runs.get(), 20);
    }

    #[test]
    fn test_exceeding_threshold_is_a_cycle() {
        let worklist = Rc::new(Worklist::new("test", 20));
        let log = Rc::new(RefCell::new(Vec::new()));
        let a = Bouncer::new(&worklist, usize::MAX, &log);

        worklist.push(a.clone());
        let err = worklist.drain().unwrap_err();
        assert_eq!(err, Error::invalidation_cycle("bouncer", 20));
        assert_eq!(a.runs.get(), 20);
        assert!(worklist.is_empty());
        assert!(!worklist.is_draining());
    }

    #[test]
    fn test_run_counts_reset_between_passes() {
        let worklist = Rc::new(Worklist::new("test", 3));
        let log = Rc::new(RefCell::new(Vec::new()));
        let a = Bouncer::new(&worklist, 3, &log);

        worklist.push(a.clone());
        worklist.drain().unwrap();
        a.runs.set(0);
        worklist.push(a.clone());
        worklist.drain().unwrap();
        assert_eq!(a.runs.get(), 3);
    }
}
