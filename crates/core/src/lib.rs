//! Lumen Core - Core types for the Lumen reactive data store.
//!
//! This crate provides the foundational types shared by every other Lumen crate:
//!
//! - `Value`: A property value stored on an entity (or used as an index key)
//! - `PropertyBag`: The canonical, ordered property map of one entity
//! - `EntityId`: The stable identity of an entity
//! - `Error`: Error types for store, index and cache-cell operations
//!
//! # Example
//!
//! ```rust
//! use lumen_core::{PropertyBag, Value};
//!
//! let mut bag = PropertyBag::new();
//! bag.insert("name".into(), Value::from("sam"));
//! bag.insert("age".into(), Value::from(41i64));
//!
//! assert_eq!(bag.get("name"), Some(&Value::String("sam".into())));
//! assert!(Value::from(16i64) < Value::from(41i64));
//! ```

#![no_std]

extern crate alloc;

mod entity;
mod error;
mod value;

pub use entity::{props, EntityId, PropertyBag};
pub use error::{Error, Result};
pub use value::Value;
