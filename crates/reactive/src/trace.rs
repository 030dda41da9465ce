//! Structured event sink for diagnostics.
//!
//! When a sink is installed on the `Runtime`, every add / remove / set /
//! delete / notify / invalidate / evaluate operation is reported as a nested
//! call tree. Without a sink the instrumented paths cost one `Option` check.

use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::cell::RefCell;

/// Kind of traced operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TraceKind {
    /// An entity was added to a collection.
    Add,
    /// An entity was removed from a collection.
    Remove,
    /// A property was written.
    Set,
    /// A property was deleted.
    Delete,
    /// A publisher notified its subscribers.
    Notify,
    /// A cell was invalidated.
    Invalidate,
    /// A cell evaluated its computation.
    Evaluate,
}

/// One traced operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceEvent {
    pub kind: TraceKind,
    pub label: String,
}

/// Receiver of trace events.
///
/// `enter` and `exit` calls are always balanced; events entered while another
/// event is open are its children.
pub trait EventSink {
    fn enter(&mut self, event: TraceEvent);
    fn exit(&mut self);
}

/// A node of the recorded call tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceNode {
    pub event: TraceEvent,
    pub children: Vec<TraceNode>,
}

impl TraceNode {
    /// Returns the kinds of this node and its descendants, depth first.
    pub fn kinds(&self) -> Vec<TraceKind> {
        let mut out = Vec::new();
        self.collect_kinds(&mut out);
        out
    }

    fn collect_kinds(&self, out: &mut Vec<TraceKind>) {
        out.push(self.event.kind);
        for child in &self.children {
            child.collect_kinds(out);
        }
    }
}

#[derive(Default)]
struct RecorderState {
    roots: Vec<TraceNode>,
    open: Vec<TraceNode>,
}

/// An `EventSink` that records a call tree.
///
/// Clones share the same recording, so a caller can keep one handle and
/// install another on the runtime.
#[derive(Clone, Default)]
pub struct TraceRecorder {
    state: Rc<RefCell<RecorderState>>,
}

impl TraceRecorder {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the completed top-level nodes.
    pub fn roots(&self) -> Vec<TraceNode> {
        self.state.borrow().roots.clone()
    }

    /// Returns the kinds of every completed node, depth first.
    pub fn kinds(&self) -> Vec<TraceKind> {
        self.state
            .borrow()
            .roots
            .iter()
            .flat_map(|root| root.kinds())
            .collect()
    }

    /// Discards everything recorded so far.
    pub fn clear(&self) {
        let mut state = self.state.borrow_mut();
        state.roots.clear();
        state.open.clear();
    }
}

impl EventSink for TraceRecorder {
    fn enter(&mut self, event: TraceEvent) {
        self.state.borrow_mut().open.push(TraceNode {
            event,
            children: Vec::new(),
        });
    }

    fn exit(&mut self) {
        let mut state = self.state.borrow_mut();
        if let Some(node) = state.open.pop() {
            match state.open.last_mut() {
                Some(parent) => parent.children.push(node),
                None => state.roots.push(node),
            }
        }
    }
}
