//! Lumen Reactive - Dependency-tracked computation cache for Lumen.
//!
//! This crate implements the publisher/subscriber fabric the rest of the store
//! is built on, and the memoized cells that consume it.
//!
//! # Core Concepts
//!
//! - `Publisher`: One observable cell (a property, a key set, or a whole object)
//! - `Subscriber`: Anything that depends on publishers; its dependency set is
//!   rebuilt from scratch on every evaluation
//! - `ObjectPublishers`: The lazily-created publishers owned by one mutable object
//! - `Runtime`: Active-subscriber stack, transaction depth and the two
//!   notification worklists
//! - `Query`: A named, memoized computation; a reaction is a query that
//!   re-runs itself whenever it is invalidated
//!
//! # Example
//!
//! ```rust
//! use lumen_reactive::{ObjectPublishers, Runtime};
//! use std::cell::Cell;
//! use std::rc::Rc;
//!
//! let runtime = Runtime::new();
//! let counter = Rc::new(Cell::new(1i64));
//! let publishers: Rc<ObjectPublishers<String>> =
//!     Rc::new(ObjectPublishers::new(runtime.clone(), "counter"));
//!
//! let doubled = {
//!     let counter = counter.clone();
//!     let publishers = publishers.clone();
//!     runtime.create_query("doubled", move || {
//!         publishers.track_property(&"value".to_string());
//!         Ok(counter.get() * 2)
//!     })
//! };
//!
//! assert_eq!(doubled.value().unwrap(), 2);
//! assert!(doubled.has_cached_value());
//!
//! counter.set(5);
//! publishers.notify_property(&"value".to_string());
//! assert!(!doubled.has_cached_value());
//! assert_eq!(doubled.value().unwrap(), 10);
//! ```

#![no_std]

extern crate alloc;

pub mod config;
pub mod object;
pub mod publisher;
pub mod query;
pub mod runtime;
pub mod trace;
pub mod worklist;

pub use config::RuntimeConfig;
pub use object::ObjectPublishers;
pub use publisher::{Dependencies, Publisher, PublisherId, Subscriber, SubscriberId};
pub use query::{CacheCell, CellState, InvalidateCallback, Query, QueryBuilder, Trackable};
pub use runtime::Runtime;
pub use trace::{EventSink, TraceEvent, TraceKind, TraceNode, TraceRecorder};
pub use worklist::{NotifyAt, Worklist};
