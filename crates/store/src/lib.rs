//! Lumen Store - In-memory reactive entity store.
//!
//! This crate ties the Lumen pieces together:
//!
//! - `EntityState`: an entity's property bag behind the tracking accessor
//!   layer; reads register dependencies, writes notify publishers and feed
//!   indexes
//! - `Collection`: a named entity set with its indexes and observers
//! - `Journal` / `ChangeSet`: per-transaction change recording
//! - `Store`: the facade owning the runtime, collections and change
//!   subscriptions
//!
//! Every write must happen inside `Store::transaction`. Queries and reactions
//! created through the store re-run only when something they read changed.
//!
//! # Example
//!
//! ```rust
//! use lumen_core::{props, Value};
//! use lumen_store::Store;
//!
//! let store = Store::new();
//! let people = store.collection("people");
//! let sam = store
//!     .transaction(|| people.add("e1", props([("name", "sam"), ("age", "41")])))
//!     .unwrap();
//!
//! let name = {
//!     let sam = sam.clone();
//!     store.create_query("name", move || Ok(sam.get("name")))
//! };
//! assert_eq!(name.value().unwrap(), Some(Value::from("sam")));
//!
//! store.transaction(|| sam.set("age", 42i64)).unwrap();
//! assert!(name.has_cached_value());
//! ```

#![no_std]

extern crate alloc;

pub mod change_set;
pub mod collection;
pub mod entity;
pub mod journal;
pub mod store;
pub mod subscription;

pub use change_set::ChangeSet;
pub use collection::{Collection, IdsSnapshot};
pub use entity::{Entity, EntityState, EntityView};
pub use journal::{ChangeKind, CollectionDiff, Journal, JournalEntry};
pub use store::Store;
pub use subscription::{ChangeCallback, SubscriptionId, SubscriptionManager};
