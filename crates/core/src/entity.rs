//! Entity identity and property bag definitions.

use crate::value::Value;
use alloc::collections::BTreeMap;
use alloc::string::String;

/// Stable identity of an entity within its collection.
pub type EntityId = String;

/// The canonical property map of an entity.
///
/// A `BTreeMap` keeps key enumeration deterministic, which matters for
/// consumers that observe the key set.
pub type PropertyBag = BTreeMap<String, Value>;

/// Builds a `PropertyBag` from `(name, value)` pairs.
///
/// ```rust
/// use lumen_core::{props, Value};
///
/// let bag = props([("name", Value::from("kim")), ("age", Value::from(30i64))]);
/// assert_eq!(bag.len(), 2);
/// ```
pub fn props<I, K, V>(pairs: I) -> PropertyBag
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<Value>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
