//! Lumen Index - Incrementally maintained secondary indexes for Lumen.
//!
//! An index is built from a declarative `IndexSchema` and kept consistent
//! with the live entity set through the `EntityObserver` event contract,
//! without rescans:
//!
//! - `UniqueHash`: key to a single entity; a second entity under a taken key
//!   is an error
//! - `ManyHash`: key to a nested bucket shaped by the next schema level;
//!   buckets are pruned when they empty
//! - `Sort`: an ordered list under per-level `asc`/`desc` directives with the
//!   entity id as the final ascending tiebreaker
//!
//! Every level is also an observable object. `Index::proxy` returns an
//! `IndexView` whose reads register fine-grained dependencies, so a cell
//! asking "does key X exist" does not re-run when unrelated keys change.
//!
//! # Example
//!
//! ```rust
//! use lumen_index::{IndexKind, IndexSchema};
//!
//! let schema = IndexSchema::parse(&["=owner", "+name", "-age"], false).unwrap();
//! assert_eq!(schema.kind(), IndexKind::ManyHash);
//! assert_eq!(schema.to_string(), "=owner +name -age");
//! ```

#![no_std]

extern crate alloc;

pub mod comparator;
pub mod entries;
pub mod index;
pub mod many;
pub mod schema;
pub mod sort;
pub mod stats;
pub mod traits;
pub mod unique;
pub mod view;

pub use comparator::{Comparator, Order, SortComparator};
pub use entries::IndexEntries;
pub use index::Index;
pub use many::ManyEntries;
pub use schema::{IndexKind, IndexSchema, SortDirective, ID_PROPERTY};
pub use sort::SortEntries;
pub use stats::IndexStats;
pub use traits::{EntityObserver, IndexedEntity};
pub use unique::UniqueEntries;
pub use view::{IndexSnapshot, IndexView};
